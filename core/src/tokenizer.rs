use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{N}_']*").expect("valid regex");
}

/// Portuguese connectives dropped from document names.
pub const DEFAULT_STOPWORDS: &[&str] = &["de", "da", "dos", "das", "e"];

/// Turns raw text into index terms.
pub trait Normalizer {
    /// Case-fold, strip diacritics and drop stop words. Terms in the output are space separated.
    fn normalize(&self, text: &str) -> String;

    fn tokenize(&self, normalized: &str) -> Vec<String> {
        normalized.split_whitespace().map(str::to_string).collect()
    }

    fn terms(&self, text: &str) -> Vec<String> {
        self.tokenize(&self.normalize(text))
    }
}

/// Lower-case, remove accents: "Antônio" -> "antonio".
pub fn fold_diacritics(text: &str) -> String {
    text.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)).collect()
}

#[derive(Debug, Clone)]
pub struct FoldingNormalizer {
    stopwords: HashSet<String>,
}

impl FoldingNormalizer {
    pub fn with_stopwords<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stopwords = stopwords.into_iter().map(|w| fold_diacritics(w.as_ref())).collect();
        Self { stopwords }
    }

    fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }
}

impl Default for FoldingNormalizer {
    fn default() -> Self {
        Self::with_stopwords(DEFAULT_STOPWORDS.iter().copied())
    }
}

impl Normalizer for FoldingNormalizer {
    fn normalize(&self, text: &str) -> String {
        let folded = fold_diacritics(text);
        let words: Vec<&str> = RE
            .find_iter(&folded)
            .map(|m| m.as_str())
            .filter(|w| !self.is_stopword(w))
            .collect();
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents_and_case() {
        assert_eq!(fold_diacritics("José ANTÔNIO"), "jose antonio");
    }

    #[test]
    fn basic_terms() {
        let n = FoldingNormalizer::default();
        assert_eq!(n.terms("Marcos Antônio de Oliveira"), vec!["marcos", "antonio", "oliveira"]);
        assert_eq!(n.terms("José Carlos de Paula"), vec!["jose", "carlos", "paula"]);
    }

    #[test]
    fn stopwords_only_at_word_boundaries() {
        let n = FoldingNormalizer::default();
        assert_eq!(n.normalize("Daniel e Dantas"), "daniel dantas");
        assert_eq!(n.normalize("  De  "), "");
    }
}
