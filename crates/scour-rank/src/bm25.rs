//! The BM25 scoring formula (§4.9), kept as pure functions over plain
//! numbers so the math is testable without a database.

/// `1 − b + b · (wc / avg_doc_length)`. Guards against a zero
/// `avg_doc_length` (empty corpus) by returning `1.0` (no normalization).
pub fn length_norm(word_count: i64, avg_doc_length: f64, b: f64) -> f64 {
    if avg_doc_length <= 0.0 {
        return 1.0;
    }
    1.0 - b + b * (word_count as f64 / avg_doc_length)
}

/// `ln( (N − df + 0.5) / (df + 0.5) + 1 )`. Always positive for `df <= N`.
pub fn idf(total_docs: i64, doc_freq: i64) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// `(tf · (k1+1)) / (tf + k1 · length_norm) · field_boost`.
pub fn tf_term(tf: i64, k1: f64, length_norm: f64, field_boost: f64) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    let tf = tf as f64;
    (tf * (k1 + 1.0)) / (tf + k1 * length_norm) * field_boost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarer_tokens_have_higher_idf() {
        let common = idf(1000, 500);
        let rare = idf(1000, 2);
        assert!(rare > common);
    }

    #[test]
    fn tf_saturates_sublinearly() {
        let ln = 1.0;
        let single = tf_term(1, 1.2, ln, 1.0);
        let double = tf_term(2, 1.2, ln, 1.0);
        assert!(double < single * 2.0);
        assert!(double > single);
    }

    #[test]
    fn shorter_document_scores_higher_at_equal_tf() {
        let short_norm = length_norm(40, 200.0, 0.75);
        let long_norm = length_norm(400, 200.0, 0.75);
        let short_score = tf_term(3, 1.2, short_norm, 1.0);
        let long_score = tf_term(3, 1.2, long_norm, 1.0);
        assert!(short_score > long_score);
    }

    #[test]
    fn zero_avg_doc_length_does_not_divide_by_zero() {
        assert_eq!(length_norm(10, 0.0, 0.75), 1.0);
    }
}
