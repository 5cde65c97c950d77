//! Component A — splits a raw input line into tokens.
//!
//! Tokens are maximal runs of non-whitespace. `|` and `&` are only
//! recognised as *entire* tokens; an embedded occurrence like `a|b` stays
//! one word. No quoting, no escaping, no variable or glob expansion — those
//! are out of scope for this shell.

/// Split a line into whitespace-delimited tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
