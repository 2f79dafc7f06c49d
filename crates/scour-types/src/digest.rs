//! Stable digests used as primary keys and dedupe keys.

use sha2::{Digest, Sha256};

/// 16 hex character digest of arbitrary bytes, used as a compact stable
/// identifier (URL primary key, content hash, dedupe key).
pub fn digest16(bytes: &[u8]) -> String {
    let full = Sha256::digest(bytes);
    hex::encode(full)[..16].to_string()
}

/// Primary key for a URL record.
pub fn url_digest(url: &str) -> String {
    digest16(url.as_bytes())
}

/// Content hash used by the index job queue's dedupe key.
pub fn content_hash(content: &str) -> String {
    digest16(content.as_bytes())
}

/// `dedupe_key = digest(url ++ content_hash)`, per the index job queue spec.
pub fn dedupe_key(url: &str, content_hash: &str) -> String {
    let mut buf = String::with_capacity(url.len() + content_hash.len());
    buf.push_str(url);
    buf.push_str(content_hash);
    digest16(buf.as_bytes())
}

/// Extract the host part of a URL. Returns an error message on malformed input.
pub fn domain_of(url: &str) -> Result<String, url::ParseError> {
    let parsed = url::Url::parse(url)?;
    Ok(parsed.host_str().unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_16_hex_chars() {
        let d = url_digest("https://example.com/");
        assert_eq!(d.len(), 16);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(url_digest("https://a.com/"), url_digest("https://a.com/"));
        assert_ne!(url_digest("https://a.com/"), url_digest("https://b.com/"));
    }

    #[test]
    fn dedupe_key_changes_with_content() {
        let k1 = dedupe_key("https://a.com/", &content_hash("hello"));
        let k2 = dedupe_key("https://a.com/", &content_hash("world"));
        assert_ne!(k1, k2);
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://example.com/a/b").unwrap(), "example.com");
    }
}
