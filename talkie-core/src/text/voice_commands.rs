//! Voice-command substitution (§4.5 item 1): whole-word replacement of a
//! fixed set of spoken punctuation/symbol names.
//!
//! Longer phrases ("new paragraph") are matched before shorter ones ("new
//! line") would otherwise shadow them, so the table is scanned two words at
//! a time before falling back to one word. Matching is case-insensitive on
//! the trigger; the replacement is a fixed literal (punctuation has no
//! case), so the pass is naturally idempotent — once "period" has become
//! ".", no remaining trigger text is left to match.

/// Trigger phrase → literal replacement. Two-word phrases first so the
/// greedy two-word lookup in [`substitute_voice_commands`] finds them.
const COMMANDS: &[(&str, &str)] = &[
    ("question mark", "?"),
    ("exclamation mark", "!"),
    ("exclamation point", "!"),
    ("at sign", "@"),
    ("dollar sign", "$"),
    ("left parenthesis", "("),
    ("right parenthesis", ")"),
    ("left bracket", "["),
    ("right bracket", "]"),
    ("left brace", "{"),
    ("right brace", "}"),
    ("forward slash", "/"),
    ("vertical bar", "|"),
    ("less than", "<"),
    ("greater than", ">"),
    ("single quote", "'"),
    ("double quote", "\""),
    ("new paragraph", "\n\n"),
    ("new line", "\n"),
    ("period", "."),
    ("comma", ","),
    ("colon", ":"),
    ("semicolon", ";"),
    ("dash", "-"),
    ("hyphen", "-"),
    ("underscore", "_"),
    ("plus", "+"),
    ("equals", "="),
    ("hash", "#"),
    ("percent", "%"),
    ("caret", "^"),
    ("ampersand", "&"),
    ("asterisk", "*"),
    ("backslash", "\\"),
    ("tilde", "~"),
    ("backtick", "`"),
];

/// A replacement that is punctuation rather than a word never wants a space
/// inserted before it, and never forces a space after it either — "hello
/// period new line world" must become "hello.\nworld", not "hello . \n
/// world".
fn lookup(candidate: &str) -> Option<&'static str> {
    let lowered = candidate.to_ascii_lowercase();
    COMMANDS
        .iter()
        .find(|(trigger, _)| *trigger == lowered)
        .map(|(_, replacement)| *replacement)
}

/// Apply the fixed voice-command substitution table to `text`, word by
/// word, preferring the longest (two-word) match at each position.
pub fn substitute_voice_commands(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < words.len() {
        let two_word = if i + 1 < words.len() {
            lookup(&format!("{} {}", words[i], words[i + 1]))
        } else {
            None
        };

        let (replacement, consumed) = if let Some(r) = two_word {
            (Some(r), 2)
        } else if let Some(r) = lookup(words[i]) {
            (Some(r), 1)
        } else {
            (None, 1)
        };

        match replacement {
            Some(symbol) => {
                out.push_str(symbol);
                pending_space = false;
            }
            None => {
                if pending_space {
                    out.push(' ');
                }
                out.push_str(words[i]);
                pending_space = true;
            }
        }
        i += consumed;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_and_new_line_merge_without_spaces() {
        assert_eq!(
            substitute_voice_commands("hello period new line world"),
            "hello.\nworld"
        );
    }

    #[test]
    fn two_word_phrase_preferred_over_prefix() {
        assert_eq!(substitute_voice_commands("a new paragraph b"), "a\n\nb");
    }

    #[test]
    fn every_documented_command_is_recognized() {
        for (trigger, replacement) in COMMANDS {
            assert_eq!(substitute_voice_commands(trigger), *replacement);
        }
    }

    #[test]
    fn unrecognized_words_pass_through_unchanged() {
        assert_eq!(substitute_voice_commands("hello world"), "hello world");
    }

    #[test]
    fn case_insensitive_trigger_match() {
        assert_eq!(substitute_voice_commands("Period"), ".");
        assert_eq!(substitute_voice_commands("PERIOD"), ".");
    }
}
