//! The URL scoring function (§4.4): a pure, deterministic function of a
//! link's URL, its parent page's score, and the number of prior visits to
//! the destination's domain. Exposed standalone so the frontend's
//! `/score/predict` endpoint can call it with no side effects.

const LIST_LIKE: [&str; 3] = ["list", "index", "category"];
const LOW_VALUE: [&str; 4] = ["login", "signup", "archive", "tag"];

/// `score = parent_score·0.9 · domain_factor · depth_factor · path_factor`.
pub fn score_url(url: &str, parent_score: f64, domain_visits: u64) -> f64 {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| "/".to_string());

    let base = parent_score * 0.9;
    let domain_factor = 1.0 / (1.0 + ((domain_visits as f64) + 1.0).log10());
    let slash_count = path.matches('/').count();
    let depth_factor = 0.9f64.powi(slash_count.saturating_sub(1) as i32);
    let path_factor = path_factor(&path);

    base * domain_factor * depth_factor * path_factor
}

fn path_factor(path: &str) -> f64 {
    let lower = path.to_lowercase();
    if LIST_LIKE.iter().any(|kw| lower.contains(kw)) {
        1.2
    } else if LOW_VALUE.iter().any(|kw| lower.contains(kw)) {
        0.5
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §8.13's third oracle value reconciles exactly with the formula:
    /// a root path has one slash, so `depth_factor = 0.9^0 = 1`, and an
    /// unvisited domain makes `domain_factor = 1`.
    #[test]
    fn root_path_zero_visits_matches_oracle() {
        let got = score_url("https://a.com/", 100.0, 0);
        assert!((got - 90.0).abs() < 1e-9, "got {got}");
    }

    #[test]
    fn list_like_path_boosts_score() {
        let got = score_url("https://example.com/articles/list", 100.0, 1);
        // base=90, domain_factor=1/(1+log10(2))≈0.7686, depth_factor=0.9, path_factor=1.2
        let expected = 100.0 * 0.9 * (1.0 / (1.0 + 2f64.log10())) * 0.9 * 1.2;
        assert!((got - expected).abs() < 1e-9);
        assert!(got > 70.0 && got < 80.0, "got {got}");
    }

    #[test]
    fn low_value_path_penalizes_score() {
        let got = score_url("https://example.com/users/login", 100.0, 50);
        let expected = 100.0 * 0.9 * (1.0 / (1.0 + 51f64.log10())) * 0.9 * 0.5;
        assert!((got - expected).abs() < 1e-9);
        // Penalized relative to an otherwise-identical neutral path.
        let neutral = score_url("https://example.com/users/profile", 100.0, 50);
        assert!(got < neutral);
    }

    #[test]
    fn deeper_paths_score_lower_than_shallow_ones() {
        let shallow = score_url("https://a.com/one", 100.0, 0);
        let deep = score_url("https://a.com/one/two/three/four", 100.0, 0);
        assert!(deep < shallow);
    }

    #[test]
    fn more_visited_domains_score_lower() {
        let fresh = score_url("https://a.com/page", 100.0, 0);
        let visited = score_url("https://a.com/page", 100.0, 1000);
        assert!(visited < fresh);
    }

    #[test]
    fn malformed_url_does_not_panic() {
        let got = score_url("not a url", 50.0, 0);
        assert!(got.is_finite());
    }
}
