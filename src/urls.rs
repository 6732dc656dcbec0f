//! Page URL normalization. Never fails: anything unparsable is truncated
//! at the first `?`.
//!
//! Parsing only decides whether the URL has a host. The output is cut from
//! the raw text, so host case, ports and dot-segments come back as written;
//! only the scheme is lowercased.

use url::Url;

pub fn normalize_url(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    match Url::parse(raw) {
        Ok(u) if u.has_host() => match raw_head(raw).split_once(':') {
            Some((_, rest)) => format!("{}:{}", u.scheme(), rest),
            None => raw_head(raw).to_string(),
        },
        _ => strip_query(raw).to_string(),
    }
}

fn strip_query(raw: &str) -> &str {
    match raw.find('?') {
        Some(i) => &raw[..i],
        None => raw,
    }
}

/// Everything before the query or fragment.
fn raw_head(raw: &str) -> &str {
    raw.split(['?', '#']).next().unwrap_or(raw)
}
