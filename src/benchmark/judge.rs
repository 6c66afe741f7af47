//! Lexical correctness scoring
//!
//! A deliberately crude keyword heuristic, not natural-language judgment:
//! cheap, deterministic, and reproducible across runs. Its quirks (substring
//! matching, punctuation kept inside tokens, the zero-concept boundary) are
//! part of the measurement and must not be "improved" without invalidating
//! previously collected numbers.

/// Score a response against a reference answer
///
/// Tokenizes the lowercased reference on whitespace, keeps tokens longer
/// than 3 characters as key concepts, and accepts the response iff at least
/// half of them occur as substrings of the lowercased response. A reference
/// with no key concepts (all tokens of 3 chars or fewer) accepts any response,
/// including the empty string: the threshold is half of zero.
pub fn judge_response(response: &str, expected: &str) -> bool {
    let response_lower = response.to_lowercase();
    let expected_lower = expected.to_lowercase();

    let key_concepts: Vec<&str> = expected_lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .collect();

    let matches = key_concepts
        .iter()
        .filter(|w| response_lower.contains(**w))
        .count();

    matches as f64 >= key_concepts.len() as f64 * 0.5
}
