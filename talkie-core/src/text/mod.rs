//! Text post-processing (§4.5): voice-command substitution, number-word
//! conversion, sentence capitalization, and leading-space bookkeeping,
//! applied in that fixed order to every accepted Final result before it
//! reaches the Keystroke Sink.

mod numbers;
mod voice_commands;

pub use numbers::NumberConverter;
pub use voice_commands::substitute_voice_commands;

/// Capitalize the first alphabetic character of the text and the first
/// alphabetic character following any of `. ! ?` (§4.5 item 3).
pub fn capitalize_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut capitalize_next = true;
    for c in text.chars() {
        if capitalize_next && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
            if matches!(c, '.' | '!' | '?') {
                capitalize_next = true;
            }
        }
    }
    out
}

/// Prepend a single space when this utterance follows a just-completed one
/// (§4.5 item 4), so typed words don't run into the previous utterance.
pub fn with_leading_space(text: &str, follows_prior_utterance: bool) -> String {
    if follows_prior_utterance && !text.is_empty() {
        format!(" {text}")
    } else {
        text.to_string()
    }
}

/// Run the full post-processing pipeline in spec order: voice commands,
/// then number conversion, then sentence capitalization, then the leading
/// space. `follows_prior_utterance` is the Result Dispatcher's running
/// "did a prior utterance already type something" flag.
pub fn process(raw_text: &str, follows_prior_utterance: bool) -> String {
    let substituted = substitute_voice_commands(raw_text);
    let numbered = NumberConverter::new().convert(&substituted);
    let capitalized = capitalize_sentences(&numbered);
    with_leading_space(&capitalized, follows_prior_utterance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_command_scenario() {
        // §8 scenario 3.
        let out = process("hello period new line world", false);
        assert_eq!(out, "Hello.\nWorld");
    }

    #[test]
    fn number_conversion_scenario() {
        // §8 scenario 4.
        assert_eq!(process("twenty five", false), "25");
        assert_eq!(process("point five", false), ".5");
        assert_eq!(process("three", false), "Three");
    }

    #[test]
    fn leading_space_applied_after_first_utterance() {
        assert_eq!(process("world", true), " World");
    }

    #[test]
    fn voice_command_substitution_is_idempotent() {
        let once = substitute_voice_commands("say hello period");
        let twice = substitute_voice_commands(&once);
        assert_eq!(once, twice);
    }
}
