//! Power Iteration PageRank (§4.8): page-level and domain-level, identical
//! algorithm over different edge sets. Pure graph math — persistence is
//! [`crate::store::RankStore`].

use std::collections::{HashMap, HashSet};

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 20;
const TOLERANCE: f64 = 1e-6;

/// Runs Power Iteration over a directed graph given as `(src, dst)` edges.
/// Nodes with zero out-degree redistribute their mass uniformly across
/// every node each iteration. Output is normalized so the top-scoring node
/// is exactly `1.0`.
pub fn power_iteration(edges: &[(String, String)]) -> HashMap<String, f64> {
    let mut nodes: HashSet<&str> = HashSet::new();
    for (src, dst) in edges {
        nodes.insert(src.as_str());
        nodes.insert(dst.as_str());
    }
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let mut out_degree: HashMap<&str, usize> = HashMap::new();
    let mut in_edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for (src, dst) in edges {
        *out_degree.entry(src.as_str()).or_insert(0) += 1;
        in_edges.entry(dst.as_str()).or_default().push(src.as_str());
    }

    let mut scores: HashMap<&str, f64> = nodes.iter().map(|&u| (u, 1.0 / n as f64)).collect();

    for _ in 0..MAX_ITERATIONS {
        let dangling_mass: f64 = nodes
            .iter()
            .filter(|u| !out_degree.contains_key(*u))
            .map(|u| scores[u])
            .sum();

        let mut next: HashMap<&str, f64> = HashMap::with_capacity(n);
        let mut delta = 0.0f64;
        for &u in &nodes {
            let inbound: f64 = in_edges
                .get(u)
                .map(|srcs| srcs.iter().map(|v| scores[v] / out_degree[v] as f64).sum())
                .unwrap_or(0.0);
            let r = (1.0 - DAMPING) / n as f64 + DAMPING * (inbound + dangling_mass / n as f64);
            delta += (r - scores[u]).abs();
            next.insert(u, r);
        }
        scores = next;
        if delta < TOLERANCE {
            break;
        }
    }

    let max = scores.values().cloned().fold(f64::MIN, f64::max);
    let max = if max > 0.0 { max } else { 1.0 };
    scores.into_iter().map(|(u, s)| (u.to_string(), s / max)).collect()
}

/// Collapses a page-level edge list to distinct cross-domain `(src_host,
/// dst_host)` pairs, dropping intra-domain edges and collapsing multi-edges
/// (§4.8 domain-level).
pub fn domain_edges(page_edges: &[(String, String)]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (src, dst) in page_edges {
        let (Ok(src_domain), Ok(dst_domain)) =
            (scour_types::domain_of(src), scour_types::domain_of(dst))
        else {
            continue;
        };
        if src_domain == dst_domain {
            continue;
        }
        if seen.insert((src_domain.clone(), dst_domain.clone())) {
            out.push((src_domain, dst_domain));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_page_normalizes_to_one() {
        let edges = vec![
            ("a".to_string(), "b".to_string()),
            ("c".to_string(), "b".to_string()),
            ("b".to_string(), "a".to_string()),
        ];
        let scores = power_iteration(&edges);
        let max = scores.values().cloned().fold(f64::MIN, f64::max);
        assert!((max - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dangling_nodes_receive_nonzero_mass() {
        // "c" has no outbound edges.
        let edges = vec![("a".to_string(), "b".to_string()), ("b".to_string(), "c".to_string())];
        let scores = power_iteration(&edges);
        assert!(scores["c"] > 0.0);
    }

    #[test]
    fn two_runs_agree_within_tolerance() {
        let edges = vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string()),
            ("c".to_string(), "a".to_string()),
            ("a".to_string(), "c".to_string()),
        ];
        let first = power_iteration(&edges);
        let second = power_iteration(&edges);
        for (node, score) in &first {
            assert!((score - second[node]).abs() < 1e-6);
        }
    }

    #[test]
    fn domain_edges_drop_intra_domain_and_collapse_duplicates() {
        let edges = vec![
            ("https://a.com/1".to_string(), "https://a.com/2".to_string()),
            ("https://a.com/1".to_string(), "https://b.com/1".to_string()),
            ("https://a.com/2".to_string(), "https://b.com/2".to_string()),
        ];
        let domains = domain_edges(&edges);
        assert_eq!(domains, vec![("a.com".to_string(), "b.com".to_string())]);
    }

    #[test]
    fn empty_graph_yields_no_scores() {
        assert!(power_iteration(&[]).is_empty());
    }
}
