//! Name conventions shared by the strategies.
//!
//! Words are whitespace-separated tokens compared case-insensitively after
//! trimming surrounding punctuation, so `"Kitchen (status)"` contains the
//! word `status` but `"Statusbar"` does not.

use std::sync::LazyLock;

use regex::Regex;

static LA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^LA\d+").expect("LA pattern is a valid regex"));

static TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("trailing number pattern is a valid regex"));

/// Words marking an address as feedback rather than command.
pub const STATUS_WORDS: &[&str] = &["status", "state"];

/// Words naming a light function rather than the light itself.
pub const LIGHT_ROLE_WORDS: &[&str] = &[
    "status",
    "state",
    "on/off",
    "aan/uit",
    "on",
    "off",
    "aan",
    "uit",
    "schakelen",
    "switch",
    "dim",
    "dimmen",
    "dimming",
    "brightness",
    "helderheid",
    "value",
    "waarde",
];

/// Words naming a cover function rather than the cover itself.
pub const COVER_ROLE_WORDS: &[&str] = &[
    "lang", "long", "kort", "short", "step", "stop", "positie", "position", "lamel", "angle",
    "slat", "tilt", "status", "state", "invert", "up/down", "op/neer",
];

/// Cover words that mean the slat angle rather than the height.
pub const ANGLE_WORDS: &[&str] = &["lamel", "angle", "slat", "tilt"];

/// Whether `name` starts with `LA<digits>` (any case).
#[must_use]
pub fn is_la_name(name: &str) -> bool {
    LA_PATTERN.is_match(name.trim())
}

fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '/')
        .to_lowercase()
}

/// Whether `name` contains `word` as a whole word.
#[must_use]
pub fn has_word(name: &str, word: &str) -> bool {
    name.split_whitespace()
        .any(|token| normalize_token(token) == word)
}

/// Whether `name` contains any of `words` as a whole word.
#[must_use]
pub fn has_any_word(name: &str, words: &[&str]) -> bool {
    name.split_whitespace()
        .map(normalize_token)
        .any(|token| words.contains(&token.as_str()))
}

/// `name` with every whole word in `words` removed, whitespace collapsed
/// and dangling separators trimmed.
#[must_use]
pub fn strip_words(name: &str, words: &[&str]) -> String {
    let kept: Vec<&str> = name
        .split_whitespace()
        .filter(|token| !words.contains(&normalize_token(token).as_str()))
        .collect();
    kept.join(" ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | ':' | ','))
        .to_string()
}

/// Case-insensitive grouping key for a base name.
#[must_use]
pub fn group_key(base: &str) -> String {
    base.to_lowercase()
}

/// Lowercase alphanumeric tokens of `name`.
#[must_use]
pub fn tokens(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Scene number from a trailing number in the name, clamped to 1..=64.
#[must_use]
pub fn scene_number(name: &str) -> u8 {
    TRAILING_NUMBER
        .captures(name.trim())
        .and_then(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .map_or(1, |n| u8::try_from(n.clamp(1, 64)).unwrap_or(1))
}
