//! Tokenization and character normalization shared by phrases and patterns.

use std::sync::LazyLock;

use regex::Regex;

/// Word-or-punctuation tokens: a run of word characters, or one symbol.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|[^\s\w]").expect("token regex is valid"));

/// Split text into word and punctuation tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Replace characters that publishers use in place of plain spaces and minus
/// signs: newlines, no-break space (U+00A0) and thin space (U+2009) become a
/// space, the minus sign (U+2212) becomes `-`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\u{00A0}' | '\u{2009}' => ' ',
            '\u{2212}' => '-',
            other => other,
        })
        .collect()
}

/// Characters that may directly follow a unit for it to count as one.
///
/// Keeps a bare `K` inside a word or formula from being read as kelvin.
pub fn is_delimited_unit(text: &str, end: usize) -> bool {
    match text.get(end..).and_then(|rest| rest.chars().next()) {
        None => true,
        Some(c) => matches!(c, ',' | '.' | ')' | ' ' | '\t' | ';'),
    }
}

/// True when the first character of `s` is a regex word character.
pub fn starts_with_word_char(s: &str) -> bool {
    s.chars().next().is_some_and(is_word_char)
}

/// True when the last character of `s` is a regex word character.
pub fn ends_with_word_char(s: &str) -> bool {
    s.chars().next_back().is_some_and(is_word_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_words_and_punctuation() {
        let tokens = tokenize("ferromagnetic (TC = 116 K).");
        assert_eq!(tokens, vec!["ferromagnetic", "(", "TC", "=", "116", "K", ")", "."]);
    }

    #[test]
    fn tokenize_empty_text() {
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn normalize_replaces_troublesome_characters() {
        let s = "T\u{2009}=\u{00A0}\u{2212}5\nK";
        assert_eq!(normalize(s), "T = -5 K");
    }

    #[test]
    fn normalize_preserves_char_count() {
        let s = "a\u{2212}b\u{00A0}c";
        assert_eq!(normalize(s).chars().count(), s.chars().count());
    }

    #[test]
    fn unit_delimiters() {
        let s = "116 K. and 5 Ka";
        assert!(is_delimited_unit(s, 5));
        assert!(!is_delimited_unit(s, 14));
        assert!(is_delimited_unit(s, s.len()));
    }

    #[test]
    fn word_char_edges() {
        assert!(starts_with_word_char("CoS2"));
        assert!(!starts_with_word_char("(x"));
        assert!(ends_with_word_char("Fe3O4"));
        assert!(!ends_with_word_char("Fe(II)"));
        assert!(!starts_with_word_char(""));
    }
}
