//! Reciprocal Rank Fusion (§4.9 hybrid mode): merges ranked lists without
//! requiring commensurable scores.

use std::collections::HashMap;

/// `rrf(u) = Σ_list 1/(k + rank_in_list(u))`, `rank_in_list` 1-based.
/// Items absent from a list simply don't contribute from it. Output is
/// sorted by `rrf` descending, ties broken by the item itself ascending
/// (matching §8's tie-break-by-URL example).
pub fn fuse(lists: &[Vec<String>], k: f64) -> Vec<(String, f64)> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    for list in lists {
        for (i, item) in list.iter().enumerate() {
            let rank = (i + 1) as f64;
            *scores.entry(item.as_str()).or_insert(0.0) += 1.0 / (k + rank);
        }
    }
    let mut fused: Vec<(String, f64)> = scores.into_iter().map(|(u, s)| (u.to_string(), s)).collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_present_in_both_lists_ranks_first() {
        let bm25 = vec!["d2".to_string(), "d1".to_string(), "d3".to_string()];
        let semantic = vec!["d3".to_string(), "d1".to_string(), "d2".to_string()];
        let fused = fuse(&[bm25, semantic], 60.0);
        assert_eq!(fused[0].0, "d1");
    }

    #[test]
    fn tie_is_broken_by_url_ascending() {
        let bm25 = vec!["d2".to_string(), "d1".to_string(), "d3".to_string()];
        let semantic = vec!["d3".to_string(), "d1".to_string(), "d2".to_string()];
        let fused = fuse(&[bm25, semantic], 60.0);
        // d2 and d3 tie for second place; d2 < d3 lexically.
        assert_eq!(fused[1].0, "d2");
        assert_eq!(fused[2].0, "d3");
    }

    #[test]
    fn item_in_only_one_list_still_scores() {
        let bm25 = vec!["only-here".to_string()];
        let fused = fuse(&[bm25, vec![]], 60.0);
        assert_eq!(fused[0].0, "only-here");
        assert!(fused[0].1 > 0.0);
    }
}
