//! Recall pipeline (C4): pure scoring and fusion helpers consumed by
//! [`crate::engine::Engine::recall`].
//!
//! Kept separate from the orchestration in `engine.rs` the way the teacher
//! keeps `search::hybrid`'s fusion math separate from `Storage::search` —
//! these functions take plain values, not a `Store`, so they're trivial to
//! unit test in isolation.

use std::collections::HashSet;

/// Token-level Jaccard similarity, the fallback semantic score used when a
/// candidate has no embedding (or the caller supplied no query embedding).
pub fn token_jaccard(query: &str, content: &str) -> f64 {
    let query_tokens: HashSet<String> = tokenize(query);
    let content_tokens: HashSet<String> = tokenize(content);
    if query_tokens.is_empty() || content_tokens.is_empty() {
        return 0.0;
    }
    let intersection = query_tokens.intersection(&content_tokens).count();
    let union = query_tokens.union(&content_tokens).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|tok| tok.chars().filter(|c| c.is_alphanumeric()).collect::<String>().to_lowercase())
        .filter(|tok| !tok.is_empty())
        .collect()
}

/// Final recall score for a directly-matched candidate:
/// `context_weight * semantic_similarity + a(t)`.
pub fn score(context_weight: f64, semantic_similarity: f64, activation: f64) -> f64 {
    context_weight * semantic_similarity + activation
}

/// Damped score for a neighbor surfaced via single-hop graph expansion:
/// `0.7 * strength * score_source + a(t_neighbor)`.
pub fn expansion_score(link_strength: f64, source_score: f64, neighbor_activation: f64) -> f64 {
    0.7 * link_strength * source_score + neighbor_activation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_identical_strings_is_one() {
        assert!((token_jaccard("cat dog", "cat dog") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jaccard_disjoint_strings_is_zero() {
        assert_eq!(token_jaccard("cat", "dog"), 0.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        let sim = token_jaccard("cat Whiskers", "cat Mittens");
        assert!(sim > 0.0 && sim < 1.0);
    }

    #[test]
    fn score_combines_similarity_and_activation() {
        assert_eq!(score(1.0, 0.5, -1.0), -0.5);
        assert_eq!(score(2.0, 0.5, 0.0), 1.0);
    }

    #[test]
    fn expansion_score_is_damped() {
        let s = expansion_score(1.0, 2.0, 0.0);
        assert!((s - 1.4).abs() < 1e-9);
    }
}
