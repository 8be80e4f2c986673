//! Name normalization for fuzzy matching.
//! Vault titles and catalog names go through the same pipeline before scoring.
//!
//! CRITICAL: Any changes here shift fuzzy match decisions. Run tests after changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Trademark-style marks that NFKD would otherwise expand into letters ("™" → "TM")
pub static TRADEMARK_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{2122}\u{00AE}\u{00A9}]").unwrap());

/// Any run of characters that is not a lowercase ASCII letter or digit
pub static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
/// Used to filter out accents during normalization.
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Pokémon" → "pokemon", "Ōkami" → "okami"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Transliterate any remaining non-ASCII (Cyrillic, Greek, CJK, etc.)
    any_ascii(&stripped).to_lowercase()
}

/// Normalize punctuation: curly quotes to straight quotes, " & " to " and ".
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(" & ", " and ")
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a display name into a kebab-case token sequence.
///
/// Case-folded, diacritics and non-Latin scripts folded to ASCII, apostrophes
/// dropped inside words, every other punctuation/whitespace run collapsed to `-`.
/// e.g., "The Game: Part Two" → "the-game-part-two"
pub fn normalize_name(name: &str) -> String {
    let without_marks = TRADEMARK_MARKS.replace_all(name, "");
    let punct = normalize_punctuation(&without_marks);
    let folded = fold_to_ascii(&punct).replace('\'', "");
    SEPARATOR_RUN
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string()
}

// ============================================================================
// TESTS
// ============================================================================
