//! The 2048-word mnemonic dictionary
//!
//! Words are lowercase ASCII in strictly ascending order, so an index lookup
//! is a binary search. The English list is validated once per process.
//! A replacement list may be installed once at startup; mnemonic words are
//! resolved against [`Dictionary::active`].

use std::sync::OnceLock;

use crate::error::{CryptoError, CryptoResult};

/// Number of words; each word carries 11 bits
pub const WORD_COUNT: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    words: Vec<String>,
}

static ENGLISH: OnceLock<Dictionary> = OnceLock::new();
static ACTIVE: OnceLock<Dictionary> = OnceLock::new();

impl Dictionary {
    /// The BIP-0039 English list.
    pub fn english() -> &'static Dictionary {
        ENGLISH.get_or_init(|| {
            let words = bip39::Language::English.word_list().iter().copied();
            // a broken embedded list is unrecoverable
            Self::from_words(words).expect("embedded English word list is valid")
        })
    }

    /// The list mnemonics are read and written with: the installed one, or
    /// English if nothing was installed before first use.
    pub fn active() -> &'static Dictionary {
        ACTIVE.get_or_init(|| Self::english().clone())
    }

    /// Make `dict` the process-wide list. Fails if a different list is
    /// already active.
    pub fn install(dict: Dictionary) -> CryptoResult<&'static Dictionary> {
        match ACTIVE.set(dict) {
            Ok(()) => Ok(Self::active()),
            Err(rejected) if *Self::active() == rejected => Ok(Self::active()),
            Err(_) => Err(CryptoError::Dictionary(
                "a different dictionary is already in use".into(),
            )),
        }
    }

    /// Load a dictionary file: one word per line.
    pub fn from_lines(text: &str) -> CryptoResult<Self> {
        let mut lines: Vec<&str> = text.lines().collect();
        // tolerate one trailing empty line from a final newline
        if lines.last() == Some(&"") {
            lines.pop();
        }
        Self::from_words(lines)
    }

    pub fn from_words<'a>(words: impl IntoIterator<Item = &'a str>) -> CryptoResult<Self> {
        let words: Vec<String> = words.into_iter().map(str::to_owned).collect();

        if words.len() != WORD_COUNT {
            return Err(CryptoError::Dictionary(format!(
                "expected {WORD_COUNT} words, found {}",
                words.len()
            )));
        }
        for (i, word) in words.iter().enumerate() {
            if word.is_empty() || !word.bytes().all(|b| b.is_ascii_lowercase()) {
                return Err(CryptoError::Dictionary(format!(
                    "line {}: {word:?} is not [a-z]+",
                    i + 1
                )));
            }
        }
        if let Some(i) = words.windows(2).position(|w| w[0] >= w[1]) {
            return Err(CryptoError::Dictionary(format!(
                "invalid word order at line {}: {:?} >= {:?}",
                i + 2,
                words[i],
                words[i + 1]
            )));
        }

        Ok(Self { words })
    }

    pub fn index_of(&self, word: &str) -> Option<u16> {
        self.words
            .binary_search_by(|w| w.as_str().cmp(word))
            .ok()
            .map(|i| i as u16)
    }

    /// Panics if `index >= 2048`.
    pub fn word(&self, index: u16) -> &str {
        &self.words[usize::from(index)]
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn english_text() -> String {
        let mut text = Dictionary::english().words().collect::<Vec<_>>().join("\n");
        text.push('\n');
        text
    }

    #[test]
    fn test_english_has_expected_bounds() {
        let dict = Dictionary::english();
        assert_eq!(dict.word(0), "abandon");
        assert_eq!(dict.word(2047), "zoo");
        assert_eq!(dict.index_of("abandon"), Some(0));
        assert_eq!(dict.index_of("zoo"), Some(2047));
        assert_eq!(dict.index_of("zzz"), None);
        assert_eq!(dict.index_of("Abandon"), None);
    }

    #[test]
    fn test_every_word_maps_back_to_its_index() {
        let dict = Dictionary::english();
        for i in 0..WORD_COUNT as u16 {
            assert_eq!(dict.index_of(dict.word(i)), Some(i));
        }
    }

    #[test]
    fn test_from_lines_accepts_english_file() {
        let dict = Dictionary::from_lines(&english_text()).unwrap();
        assert_eq!(&dict, Dictionary::english());
    }

    #[test]
    fn test_install_same_list_is_idempotent() {
        let dict = Dictionary::from_lines(&english_text()).unwrap();
        let active = Dictionary::install(dict.clone()).unwrap();
        assert_eq!(active, Dictionary::english());
        assert!(Dictionary::install(dict).is_ok());
    }

    #[test]
    fn test_rejects_wrong_count() {
        let text = english_text();
        let short: Vec<&str> = text.lines().take(2047).collect();
        assert!(matches!(
            Dictionary::from_words(short),
            Err(CryptoError::Dictionary(_))
        ));
    }

    #[test]
    fn test_rejects_unsorted() {
        let text = english_text();
        let mut words: Vec<&str> = text.lines().collect();
        words.swap(10, 11);
        let err = Dictionary::from_words(words).unwrap_err();
        assert!(err.to_string().contains("invalid word order"));
    }

    #[test]
    fn test_rejects_non_lowercase() {
        let text = english_text();
        let mut words: Vec<&str> = text.lines().collect();
        words[0] = "Abandon";
        assert!(Dictionary::from_words(words).is_err());
    }

    #[test]
    fn test_rejects_duplicates() {
        let text = english_text();
        let mut words: Vec<&str> = text.lines().collect();
        words[1] = words[0];
        assert!(Dictionary::from_words(words).is_err());
    }
}
