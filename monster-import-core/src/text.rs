//! String helpers shared by the field normalizers, markup passes and spell resolver.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LOWER_THEN_UPPER: Regex =
        Regex::new(r"(\p{Ll})(\p{Lu}[\p{Alphabetic}\p{M}\p{Nd}])").unwrap();
    static ref NON_WORD: Regex = Regex::new(r"[^\p{Alphabetic}\p{M}\p{Nd}]").unwrap();
    static ref HYPHEN_OR_SPACE_RUN: Regex = Regex::new(r"[-\s]+").unwrap();
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref DIGITS: Regex = Regex::new(r"[0-9]+").unwrap();
    static ref LETTERS: Regex = Regex::new(r"[A-Za-z]+").unwrap();
}

/// Normalize a display string into a lowercase, hyphen-separated slug.
///
/// `"Cold Iron"` → `"cold-iron"`, `"allDamage"` → `"all-damage"`,
/// `"Death Effects!"` → `"death-effects"`.
pub fn sluggify(text: &str) -> String {
    let split_camel = LOWER_THEN_UPPER.replace_all(text, "$1-$2");
    let lowered = split_camel.to_lowercase().replace(['\'', '’'], "");
    let spaced = NON_WORD.replace_all(&lowered, " ");
    HYPHEN_OR_SPACE_RUN
        .replace_all(spaced.trim(), "-")
        .into_owned()
}

/// Capitalize every space-separated word, lowercasing the rest of it.
pub fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let lowered = word.to_lowercase();
            let mut chars = lowered.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Uppercase only the first character of `text`.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    OutsideParen,
    InsideParen,
}

/// Split a comma-separated list without breaking parenthesized groups.
///
/// A segment ends at every comma outside parentheses and at the closing
/// parenthesis of a group (which stays attached to its segment). Commas
/// inside a group are ordinary characters. Blank segments are skipped.
///
/// `"fire 5, physical 5 (except silver, cold iron)"` →
/// `["fire 5", " physical 5 (except silver, cold iron)"]`
pub fn split_outside_parens(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::OutsideParen;

    for ch in text.chars() {
        match (state, ch) {
            (ScanState::OutsideParen, ',') => {
                if current.trim().is_empty() {
                    current.clear();
                } else {
                    segments.push(std::mem::take(&mut current));
                }
            }
            (ScanState::OutsideParen, '(') => {
                state = ScanState::InsideParen;
                current.push(ch);
            }
            (ScanState::OutsideParen, _) => current.push(ch),
            (ScanState::InsideParen, ')') => {
                current.push(ch);
                segments.push(std::mem::take(&mut current));
                state = ScanState::OutsideParen;
            }
            (ScanState::InsideParen, _) => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        segments.push(current);
    }

    segments
}

/// Remove every `<...>` tag from `text`.
pub fn strip_tags(text: &str) -> String {
    HTML_TAG.replace_all(text, "").into_owned()
}

/// The first run of ASCII digits in `text`.
pub fn first_number(text: &str) -> Option<&str> {
    DIGITS.find(text).map(|m| m.as_str())
}

/// The first run of ASCII letters in `text`.
pub fn first_word(text: &str) -> Option<&str> {
    LETTERS.find(text).map(|m| m.as_str())
}

/// Every run of ASCII letters in `text`, in order.
pub fn words(text: &str) -> Vec<&str> {
    LETTERS.find_iter(text).map(|m| m.as_str()).collect()
}
