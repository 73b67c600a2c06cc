//! String similarity kernel for entity name matching
//!
//! Combines three signals — normalized edit distance, substring containment,
//! and token overlap — and takes the strongest. All comparisons are
//! case-insensitive.

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(s1: &str, s2: &str) -> usize {
    let len1 = s1.chars().count();
    let len2 = s2.chars().count();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let chars2: Vec<char> = s2.chars().collect();
    let mut prev: Vec<usize> = (0..=len2).collect();
    let mut curr = vec![0usize; len2 + 1];

    for (i, c1) in s1.chars().enumerate() {
        curr[0] = i + 1;
        for (j, c2) in chars2.iter().enumerate() {
            let cost = if c1 == *c2 { 0 } else { 1 };
            curr[j + 1] = std::cmp::min(
                std::cmp::min(prev[j + 1] + 1, curr[j] + 1),
                prev[j] + cost,
            );
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[len2]
}

/// Normalized edit-distance ratio in [0, 1].
pub fn edit_ratio(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    let max_len = std::cmp::max(s1.chars().count(), s2.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(s1, s2) as f64 / max_len as f64)
}

/// Whitespace-token overlap ratio: `|A ∩ B| / max(|A|, |B|)`.
pub fn token_overlap(s1: &str, s2: &str) -> f64 {
    let words1: std::collections::BTreeSet<&str> = s1.split_whitespace().collect();
    let words2: std::collections::BTreeSet<&str> = s2.split_whitespace().collect();

    if words1.is_empty() || words2.is_empty() {
        return 0.0;
    }

    let shared = words1.intersection(&words2).count();
    shared as f64 / std::cmp::max(words1.len(), words2.len()) as f64
}

/// Similarity between two entity names in [0, 1].
///
/// The containment signal floors the score at 0.9 when one name contains the
/// other ("TSMC" vs "TSMC Foundry"), which edit distance alone would punish.
pub fn name_similarity(name1: &str, name2: &str) -> f64 {
    let n1 = name1.to_lowercase();
    let n2 = name2.to_lowercase();

    let mut score = edit_ratio(&n1, &n2);

    if n1.contains(n2.as_str()) || n2.contains(n1.as_str()) {
        score = score.max(0.9);
    }

    score.max(token_overlap(&n1, &n2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basic() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_levenshtein_unicode() {
        assert_eq!(levenshtein("삼성전자", "삼성"), 2);
    }

    #[test]
    fn test_edit_ratio_bounds() {
        assert_eq!(edit_ratio("", ""), 1.0);
        assert_eq!(edit_ratio("abc", "abc"), 1.0);
        assert_eq!(edit_ratio("abc", "xyz"), 0.0);
        let r = edit_ratio("nvidia", "nvida");
        assert!(r > 0.8 && r < 1.0);
    }

    #[test]
    fn test_token_overlap() {
        assert_eq!(token_overlap("taiwan semiconductor", "taiwan semiconductor"), 1.0);
        assert_eq!(
            token_overlap("taiwan semiconductor manufacturing", "taiwan semiconductor"),
            2.0 / 3.0
        );
        assert_eq!(token_overlap("", "anything"), 0.0);
    }

    #[test]
    fn test_containment_floor() {
        // Edit distance alone scores this low; containment floors it at 0.9.
        assert!(name_similarity("TSMC", "TSMC Foundry Division") >= 0.9);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(name_similarity("NVIDIA", "nvidia"), 1.0);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        assert!(name_similarity("Nvidia", "Samsung Electronics") < 0.5);
    }
}
