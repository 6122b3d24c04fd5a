//! Number-word conversion (§4.5 item 2): a small state machine with modes
//! `Normal` and `Number`.
//!
//! Each call to [`NumberConverter::convert`] processes one already
//! voice-command-substituted text (one engine Final) start to finish: the
//! buffer is unconditionally flushed at the end of the text rather than
//! carried into the next call, since a Final is a complete, self-contained
//! utterance by the time it reaches post-processing — there is no
//! meaningful "~2s of silence" to wait out mid-string. A bare number word
//! with no continuation (no leading "point", no following number word) is
//! therefore flushed as failed conversion rather than as a single digit,
//! which is the reading of §4.5 item 2 and §8 scenario 4 that makes both
//! halves of that scenario ("twenty five" → "25", lone "three" → "Three")
//! consistent; see `DESIGN.md`.

const ONES: &[(&str, u64)] = &[
    ("zero", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
];

const TENS: &[(&str, u64)] = &[
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
];

const MAGNITUDES: &[(&str, u64)] = &[
    ("hundred", 100),
    ("thousand", 1_000),
    ("million", 1_000_000),
    ("billion", 1_000_000_000),
];

fn word_value(word: &str) -> Option<u64> {
    ONES
        .iter()
        .chain(TENS)
        .chain(MAGNITUDES)
        .find(|(w, _)| *w == word)
        .map(|(_, v)| *v)
}

fn is_number_word(word: &str) -> bool {
    word_value(word).is_some()
}

/// Buffer capacity cap (§4.5: "Buffer size is capped (≈20 words)").
const MAX_BUFFER: usize = 20;

/// Best-effort conversion of an integer phrase like "twenty five" or "one
/// hundred and two" to its decimal value. `and` is a pure connector.
fn parse_integer_words(tokens: &[&str]) -> Option<u64> {
    let mut total: u64 = 0;
    let mut current: u64 = 0;
    let mut saw_any = false;
    for &tok in tokens {
        if tok.eq_ignore_ascii_case("and") {
            continue;
        }
        let value = word_value(&tok.to_ascii_lowercase())?;
        saw_any = true;
        if value == 100 {
            current = if current == 0 { 100 } else { current * 100 };
        } else if value >= 1_000 {
            current = if current == 0 { 1 } else { current };
            total += current * value;
            current = 0;
        } else {
            current += value;
        }
    }
    saw_any.then_some(total + current)
}

/// Each token after "point" converts to exactly one decimal digit.
fn parse_decimal_words(tokens: &[&str]) -> Option<String> {
    if tokens.is_empty() {
        return None;
    }
    let mut digits = String::new();
    for &tok in tokens {
        let value = word_value(&tok.to_ascii_lowercase())?;
        if value > 9 {
            return None;
        }
        digits.push_str(&value.to_string());
    }
    Some(digits)
}

/// Convert a buffered run of number/connector words to a numeric string,
/// or `None` if conversion isn't possible (caller emits the words verbatim).
fn words_to_number(tokens: &[String]) -> Option<String> {
    // A lone number word carries no disambiguating context; treat it as a
    // failed conversion rather than guessing it should become a digit.
    if tokens.len() < 2 {
        return None;
    }
    let lower: Vec<String> = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
    if let Some(point_idx) = lower.iter().position(|t| t == "point") {
        let int_tokens: Vec<&str> = tokens[..point_idx].iter().map(String::as_str).collect();
        let dec_tokens: Vec<&str> = tokens[point_idx + 1..]
            .iter()
            .map(String::as_str)
            .collect();
        let decimal = parse_decimal_words(&dec_tokens)?;
        if int_tokens.is_empty() {
            Some(format!(".{decimal}"))
        } else {
            let integer = parse_integer_words(&int_tokens)?;
            Some(format!("{integer}.{decimal}"))
        }
    } else {
        let all: Vec<&str> = tokens.iter().map(String::as_str).collect();
        parse_integer_words(&all).map(|n| n.to_string())
    }
}

fn strip_punct(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Split `text` into maximal alternating runs of whitespace and
/// non-whitespace, covering it exactly (concatenating the runs back in
/// order reproduces `text` byte for byte). Unlike `split_whitespace`, this
/// preserves the separators themselves — including the bare `\n`/`\n\n`
/// that voice-command substitution (text/mod.rs) already wrote in for
/// "new line"/"new paragraph" before this pass ever sees the text.
fn whitespace_runs(text: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut run_start = 0;
    let mut run_is_ws: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let is_ws = c.is_whitespace();
        match run_is_ws {
            None => run_is_ws = Some(is_ws),
            Some(prev) if prev != is_ws => {
                runs.push((prev, &text[run_start..i]));
                run_start = i;
                run_is_ws = Some(is_ws);
            }
            _ => {}
        }
    }
    if let Some(prev) = run_is_ws {
        runs.push((prev, &text[run_start..]));
    }
    runs
}

/// The number-word conversion state machine (§4.5 item 2).
pub struct NumberConverter;

impl NumberConverter {
    pub fn new() -> Self {
        Self
    }

    /// Process one complete text, converting number-word runs to digits
    /// where possible and leaving every other character — including
    /// whitespace, which may be a punctuation-substituted `\n` — untouched.
    pub fn convert(&self, text: &str) -> String {
        let runs = whitespace_runs(text);
        let mut output = String::with_capacity(text.len());
        // Exact source spans (words and their internal separators) for the
        // number run currently being buffered, so a failed conversion can
        // be emitted back out byte-for-byte instead of via `join(" ")`.
        let mut buffer_runs: Vec<&str> = Vec::new();
        let mut buffer_words: Vec<String> = Vec::new();
        let mut pending_ws: Option<&str> = None;
        let mut in_number = false;

        fn flush(buffer_runs: &mut Vec<&str>, buffer_words: &mut Vec<String>, output: &mut String) {
            if buffer_words.is_empty() {
                buffer_runs.clear();
                return;
            }
            match words_to_number(buffer_words) {
                Some(numeric) => output.push_str(&numeric),
                None => {
                    for span in buffer_runs.iter() {
                        output.push_str(span);
                    }
                }
            }
            buffer_runs.clear();
            buffer_words.clear();
        }

        // Runs strictly alternate whitespace/non-whitespace, so the word
        // run following the one at `i` (if any) is always at `i + 2`.
        for i in 0..runs.len() {
            let (is_ws, span) = runs[i];
            if is_ws {
                pending_ws = Some(span);
                continue;
            }

            let bare = strip_punct(span).to_ascii_lowercase();
            let next_is_number = runs
                .get(i + 2)
                .map(|&(_, next)| is_number_word(&strip_punct(next).to_ascii_lowercase()))
                .unwrap_or(false);

            let joins_number = is_number_word(&bare)
                || (bare == "point" && (in_number || next_is_number))
                || (bare == "and" && in_number);

            if joins_number {
                if buffer_words.is_empty() {
                    // Starting a new number run: any pending separator
                    // belongs before it, not inside it.
                    if let Some(ws) = pending_ws.take() {
                        output.push_str(ws);
                    }
                } else if let Some(ws) = pending_ws.take() {
                    buffer_runs.push(ws);
                }
                buffer_runs.push(span);
                buffer_words.push(span.to_string());
                in_number = true;
                if buffer_words.len() >= MAX_BUFFER {
                    flush(&mut buffer_runs, &mut buffer_words, &mut output);
                    in_number = false;
                }
            } else {
                flush(&mut buffer_runs, &mut buffer_words, &mut output);
                in_number = false;
                if let Some(ws) = pending_ws.take() {
                    output.push_str(ws);
                }
                output.push_str(span);
            }
        }
        flush(&mut buffer_runs, &mut buffer_words, &mut output);
        if let Some(ws) = pending_ws.take() {
            output.push_str(ws);
        }
        output
    }
}

impl Default for NumberConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_two_word_number() {
        assert_eq!(NumberConverter::new().convert("twenty five"), "25");
    }

    #[test]
    fn point_prefix_with_no_integer_part() {
        assert_eq!(NumberConverter::new().convert("point five"), ".5");
    }

    #[test]
    fn lone_number_word_fails_conversion() {
        assert_eq!(NumberConverter::new().convert("three"), "three");
    }

    #[test]
    fn hundred_magnitude() {
        assert_eq!(NumberConverter::new().convert("one hundred"), "100");
    }

    #[test]
    fn surrounding_words_are_preserved() {
        assert_eq!(
            NumberConverter::new().convert("i have twenty five cats"),
            "i have 25 cats"
        );
    }

    #[test]
    fn and_connector_inside_number_mode() {
        assert_eq!(
            NumberConverter::new().convert("one hundred and two"),
            "102"
        );
    }

    #[test]
    fn non_number_and_is_left_alone() {
        assert_eq!(NumberConverter::new().convert("you and me"), "you and me");
    }

    #[test]
    fn embedded_newline_separator_is_preserved() {
        // §8 scenario 3, once voice-command substitution has already turned
        // "period"/"new line" into "."/"\n" — this pass must not collapse
        // that "\n" into a plain space.
        assert_eq!(NumberConverter::new().convert("hello.\nworld"), "hello.\nworld");
    }
}
