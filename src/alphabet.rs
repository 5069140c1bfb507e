//! Gesture-category to Arabic-letter mapping
//!
//! The recognition model emits transliterated category names ("bb", "seen",
//! "toot", ...); this table turns them into the characters shown to the user
//! and accumulated into candidate words.

use std::collections::HashMap;

/// Category/token pairs for the Arabic sign alphabet.
///
/// `toot` is the spacer gesture and maps to a space; `al` maps to a
/// multi-character token. Both are appended like any other letter.
const ARABIC_TABLE: &[(&str, &str)] = &[
    ("ain", "ع"),
    ("al", "go"),
    ("aleff", "ا"),
    ("bb", "ب"),
    ("dal", "د"),
    ("dha", "ذ"),
    ("dhad", "ض"),
    ("fa", "ف"),
    ("gaaf", "ق"),
    ("ghain", "غ"),
    ("ha", "ح"),
    ("haa", "ه"),
    ("jeem", "ج"),
    ("kaaf", "ك"),
    ("khaa", "خ"),
    ("la", "ل"),
    ("laam", "ل"),
    ("meem", "م"),
    ("nun", "ن"),
    ("ra", "ر"),
    ("saad", "ص"),
    ("seen", "س"),
    ("sheen", "ش"),
    ("ta", "ت"),
    ("taa", "ط"),
    ("thaa", "ث"),
    ("thal", "ظ"),
    ("toot", " "),
    ("waw", "و"),
    ("ya", "ي"),
    ("yaa", "ي"),
    ("zay", "ز"),
];

/// Immutable lookup table from gesture category names to display tokens.
///
/// Built once at startup and shared with the state machine. Categories the
/// table does not know are displayed as-is, so a model update that adds a
/// category degrades to showing its raw name instead of dropping it.
pub struct LetterMap {
    entries: HashMap<&'static str, &'static str>,
}

impl LetterMap {
    /// Build the Arabic sign alphabet table.
    pub fn arabic() -> Self {
        Self {
            entries: ARABIC_TABLE.iter().copied().collect(),
        }
    }

    /// Map a category name to its display token, falling back to the
    /// category name itself.
    pub fn letter<'a>(&self, category: &'a str) -> &'a str {
        self.entries.get(category).copied().unwrap_or(category)
    }

    /// Number of known categories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
