//! Text normalization and compound-term expansion.
//!
//! [`tokenize`] turns free text into the deduplicated, lowercase term set the
//! index stores and queries against. Beyond plain word splitting it emits
//! sub-tokens for hyphenated and camelCase compounds, which is why a query
//! for `store` matches a document that only says `FeatureStore`.

use std::collections::HashSet;

/// Tokenize free text into a set of lowercase index terms.
///
/// Splits on any character that is not alphanumeric, `-`, or `'`. Each raw
/// token is emitted lowercased; hyphenated tokens additionally emit their
/// parts, and camelCase/PascalCase tokens additionally emit their words
/// (acronym runs like `HTTP` in `getHTTPResponse` count as one word). A token
/// with no internal boundary yields itself only.
pub fn tokenize(text: &str) -> HashSet<String> {
    let mut terms = HashSet::new();
    for raw in text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '\'')) {
        if raw.is_empty() {
            continue;
        }
        terms.insert(raw.to_lowercase());
        for part in raw.split('-').filter(|p| !p.is_empty()) {
            terms.insert(part.to_lowercase());
            for word in camel_words(part) {
                terms.insert(word);
            }
        }
    }
    terms
}

/// Whitespace-separated query terms, lowercased, for coordination scoring.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Split a single token at camelCase boundaries, lowercasing each word.
///
/// Boundaries are lowercase→uppercase (`featureStore`) and acronym→word
/// (`HTTPResponse` splits before the `R`). Returns the whole token (lowercased)
/// when no boundary exists.
fn camel_words(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let mut boundaries = Vec::new();
    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];
        let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
        let lower_to_upper = !prev.is_uppercase() && prev.is_alphabetic() && cur.is_uppercase();
        let acronym_to_word = prev.is_uppercase() && cur.is_uppercase() && next_is_lower;
        if lower_to_upper || acronym_to_word {
            boundaries.push(i);
        }
    }
    if boundaries.is_empty() {
        return vec![token.to_lowercase()];
    }
    let mut words = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for b in boundaries {
        words.push(chars[start..b].iter().collect::<String>().to_lowercase());
        start = b;
    }
    words.push(chars[start..].iter().collect::<String>().to_lowercase());
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(terms: &HashSet<String>, t: &str) -> bool {
        terms.contains(t)
    }

    #[test]
    fn splits_on_punctuation_and_lowercases() {
        let terms = tokenize("Fix the API: retry, then log!");
        for t in ["fix", "the", "api", "retry", "then", "log"] {
            assert!(has(&terms, t), "missing {t}");
        }
        assert!(!has(&terms, "api:"));
    }

    #[test]
    fn hyphen_compounds_emit_parts_and_whole() {
        let terms = tokenize("keyboard-first design");
        assert!(has(&terms, "keyboard-first"));
        assert!(has(&terms, "keyboard"));
        assert!(has(&terms, "first"));
    }

    #[test]
    fn camel_case_emits_words_and_whole() {
        let terms = tokenize("FeatureStore rollout");
        assert!(has(&terms, "featurestore"));
        assert!(has(&terms, "feature"));
        assert!(has(&terms, "store"));
    }

    #[test]
    fn acronym_boundary_splits_before_word() {
        let terms = tokenize("getHTTPResponse");
        assert!(has(&terms, "get"));
        assert!(has(&terms, "http"));
        assert!(has(&terms, "response"));
        assert!(has(&terms, "gethttpresponse"));
    }

    #[test]
    fn plain_token_yields_itself_only() {
        let terms = tokenize("dashboard");
        assert_eq!(terms.len(), 1);
        assert!(has(&terms, "dashboard"));
    }

    #[test]
    fn output_is_deduplicated() {
        let terms = tokenize("store Store STORE FeatureStore");
        // "store" appears once no matter how many sources produced it
        assert!(has(&terms, "store"));
        assert!(has(&terms, "featurestore"));
        assert!(has(&terms, "feature"));
        assert_eq!(terms.len(), 3);
    }

    #[test]
    fn apostrophes_stay_inside_tokens() {
        let terms = tokenize("don't panic");
        assert!(has(&terms, "don't"));
        assert!(has(&terms, "panic"));
    }

    #[test]
    fn empty_and_symbol_only_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  ---  !!! ").len() <= 1); // bare hyphens have no parts
    }

    #[test]
    fn query_terms_are_whitespace_split() {
        assert_eq!(query_terms("Feature store"), vec!["feature", "store"]);
        assert!(query_terms("   ").is_empty());
    }
}
