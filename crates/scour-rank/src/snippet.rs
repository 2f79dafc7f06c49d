//! KWIC ("Key Word In Context") snippet generation (§4.9.1).

/// Extracts a snippet of approximately `window_size` characters centered
/// on the first case-insensitive match of any `query_tokens` entry,
/// snapped outward to the nearest whitespace, HTML-escaped, with every
/// case-insensitive match of a query token wrapped in a highlight span.
/// An empty query or no match returns the first `window_size` characters
/// with a trailing ellipsis.
pub fn generate(text: &str, query_tokens: &[String], window_size: usize) -> String {
    if query_tokens.is_empty() {
        return truncate_with_ellipsis(text, window_size);
    }

    let lower = text.to_lowercase();
    let first_match = query_tokens
        .iter()
        .filter(|t| !t.is_empty())
        .filter_map(|t| lower.find(&t.to_lowercase()).map(|pos| pos))
        .min();

    let Some(match_pos) = first_match else {
        return truncate_with_ellipsis(text, window_size);
    };

    let half = window_size / 2;
    let raw_start = match_pos.saturating_sub(half);
    let raw_end = (match_pos + half).min(text.len());
    let start = snap_to_whitespace_start(text, raw_start);
    let end = snap_to_whitespace_end(text, raw_end);

    let window = &text[start..end];
    let mut snippet = escape_html(window);
    snippet = highlight(&snippet, query_tokens);

    let mut result = String::new();
    if start > 0 {
        result.push_str("… ");
    }
    result.push_str(&snippet);
    if end < text.len() {
        result.push_str(" …");
    }
    result
}

fn truncate_with_ellipsis(text: &str, window_size: usize) -> String {
    let end = snap_to_whitespace_end(text, window_size.min(text.len()));
    let mut out = escape_html(&text[..end]);
    if end < text.len() {
        out.push_str(" …");
    }
    out
}

fn snap_to_whitespace_start(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    while idx > 0 && !text.as_bytes()[idx - 1].is_ascii_whitespace() {
        idx -= 1;
    }
    idx
}

fn snap_to_whitespace_end(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    while idx < text.len() && !text.as_bytes()[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wraps every case-insensitive occurrence of a query token in `<mark>…
/// </mark>`. Operates on already-escaped text, so tokens containing HTML
/// metacharacters cannot reopen a tag.
fn highlight(escaped_text: &str, query_tokens: &[String]) -> String {
    let lower = escaped_text.to_lowercase();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for token in query_tokens {
        if token.is_empty() {
            continue;
        }
        let needle = token.to_lowercase();
        let mut search_from = 0;
        while let Some(pos) = lower[search_from..].find(&needle) {
            let start = search_from + pos;
            let end = start + needle.len();
            spans.push((start, end));
            search_from = end;
        }
    }
    if spans.is_empty() {
        return escaped_text.to_string();
    }
    spans.sort_unstable();
    let merged = merge_spans(spans);

    let mut out = String::with_capacity(escaped_text.len() + merged.len() * 13);
    let mut cursor = 0;
    for (start, end) in merged {
        out.push_str(&escaped_text[cursor..start]);
        out.push_str("<mark>");
        out.push_str(&escaped_text[start..end]);
        out.push_str("</mark>");
        cursor = end;
    }
    out.push_str(&escaped_text[cursor..]);
    out
}

fn merge_spans(spans: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_truncates_with_ellipsis() {
        let text = "a ".repeat(100);
        let snippet = generate(&text, &[], 20);
        assert!(snippet.ends_with('…'));
    }

    #[test]
    fn finds_first_match_and_highlights_it() {
        let text = "the quick brown fox jumps over the lazy dog";
        let snippet = generate(text, &["fox".to_string()], 20);
        assert!(snippet.contains("<mark>fox</mark>"));
    }

    #[test]
    fn escapes_html_metacharacters() {
        let text = "price < 5 & > 3 in <tag>fox</tag>";
        let snippet = generate(text, &["fox".to_string()], 40);
        assert!(!snippet.contains("<tag>"));
        assert!(snippet.contains("&lt;"));
    }

    #[test]
    fn no_match_falls_back_to_truncation() {
        let text = "completely unrelated content here that is long enough to truncate properly";
        let snippet = generate(text, &["zzz".to_string()], 20);
        assert!(snippet.ends_with('…'));
        assert!(!snippet.contains("<mark>"));
    }

    #[test]
    fn snaps_to_whitespace_boundaries() {
        let text = "alpha beta gamma delta epsilon zeta";
        let snippet = generate(text, &["delta".to_string()], 10);
        // Should not cut a word in half at the boundary.
        assert!(!snippet.contains("gamm<mark>") && !snippet.contains("</mark>a ep"));
    }
}
