//! Post-processing: deterministic cleanup of raw model text before parsing.
//!
//! Models asked for plain `label: value` lines still sometimes wrap the
//! answer in a code fence, render it as a Markdown list, or bold the labels.
//! These rules strip that decoration so the parser only has to deal with
//! separators. None of them touch the text after a label.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the model's original layout; invisible characters go before line
//! decoration so a zero-width space cannot hide a bullet.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw model output.
///
/// 1. Strip an outer code fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, word joiner)
/// 4. Strip list bullets and numbering at line start
/// 5. Strip Markdown bold/italic markers around labels
pub fn clean_response(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = strip_list_markers(&s);
    strip_emphasis(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible characters ──────────────────────────────────────

const INVISIBLE: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

// ── Rule 4: Strip list markers ───────────────────────────────────────────────

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*+・•]|\d{1,2}[.)])[ \t]+").unwrap());

fn strip_list_markers(input: &str) -> String {
    RE_LIST_MARKER.replace_all(input, "").into_owned()
}

// ── Rule 5: Strip emphasis around labels ─────────────────────────────────────

static RE_EMPHASIS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\*\*|__)([^*_\n]+?)(\*\*|__)").unwrap());

fn strip_emphasis(input: &str) -> String {
    RE_EMPHASIS_LABEL.replace_all(input, "$2").into_owned()
}
