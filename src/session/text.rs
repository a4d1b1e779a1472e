//! Cleaning captured failure output for display in the report viewer
//!
//! The viewer does not understand ANSI colour codes and collapses runs of
//! spaces, so failure output is rewritten before it is stored.

use regex::Regex;
use std::sync::OnceLock;

const NBSP: &str = "\u{a0}";

/// Characters of failure output kept in `reportText`, counted from the end
pub const MAX_REPORT_TEXT: usize = 4950;

static ANSI: OnceLock<Regex> = OnceLock::new();
static SPACE_RUN: OnceLock<Regex> = OnceLock::new();
static SEPARATOR: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("static pattern compiles"))
}

/// Replace ANSI SGR sequences (`ESC[31m`, `ESC[1;31m`, ...) with `replacement`
pub fn strip_ansi(text: &str, replacement: &str) -> String {
    pattern(&ANSI, r"\x1B\[\d+(;\d+){0,2}m")
        .replace_all(text, replacement)
        .into_owned()
}

/// Turn every run of two or more spaces into non-breaking spaces
pub fn preserve_spaces(text: &str) -> String {
    pattern(&SPACE_RUN, r"  +")
        .replace_all(text, |caps: &regex::Captures<'_>| NBSP.repeat(caps[0].len()))
        .into_owned()
}

/// Replace terminal-wide `_ _ _` separators with a fixed-width one
pub fn shorten_separators(text: &str) -> String {
    let fixed = "- ".repeat(30);
    pattern(&SEPARATOR, r"(_ )+_*")
        .replace_all(text, fixed.as_str())
        .into_owned()
}

/// Keep the last `max` characters
fn tail(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    let skip = count - max;
    match text.char_indices().nth(skip) {
        Some((index, _)) => &text[index..],
        None => "",
    }
}

/// Failure output as stored in a test's `reportText`
pub fn failure_report_text(raw: &str) -> String {
    let cleaned = preserve_spaces(&strip_ansi(raw, NBSP));
    shorten_separators(&format!("<pre>{}</pre>", tail(&cleaned, MAX_REPORT_TEXT)))
}

/// Failure message as stored in a test's `errorMessage`
pub fn failure_message(raw: &str) -> String {
    strip_ansi(raw, "").trim().to_string()
}
