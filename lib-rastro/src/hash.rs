//! The URL fingerprint that keys deduplication within a token.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use url::Url;

lazy_static! {
    static ref SLASH_RUNS: Regex = Regex::new("//+").expect("valid static regex");
}

/// Hashes the canonical form of an http(s) URL into a 32-hex fingerprint.
///
/// The canonical form is `scheme>netloc>path>query`. The netloc is the
/// lowercased host (with an explicit port, when there is one) minus a leading
/// `www.`. The path is lowercased, slash runs are collapsed and a trailing
/// slash is dropped, so `/A//b/` and `/a/b` agree. The query is refolded into
/// `key=v1#v2` pairs, keys and values lowercased, sorted, so parameter order
/// does not matter.
pub fn fingerprint(url: &Url) -> String {
    let mut netloc = url.host_str().unwrap_or_default().to_lowercase();
    if let Some(port) = url.port() {
        netloc = format!("{}:{}", netloc, port);
    }
    let netloc = netloc.strip_prefix("www.").unwrap_or(&netloc);

    let canonical = format!(
        "{}>{}>{}>{}",
        url.scheme(),
        netloc,
        canonical_path(url.path()),
        canonical_query(url),
    );

    format!("{:x}", md5::compute(canonical))
}

fn canonical_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_owned();
    }

    let collapsed = SLASH_RUNS
        .replace_all(&path.to_lowercase(), "/")
        .into_owned();

    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed[..collapsed.len() - 1].to_owned()
    } else {
        collapsed
    }
}

fn canonical_query(url: &Url) -> String {
    let mut by_key: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (key, value) in url.query_pairs() {
        // Valueless parameters do not survive canonicalisation.
        if value.is_empty() {
            continue;
        }

        by_key
            .entry(key.to_lowercase())
            .or_default()
            .push(value.to_lowercase());
    }

    by_key
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_unstable();
            format!("{}={}", key, values.join("#"))
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint_of(url: &str) -> String {
        fingerprint(&Url::parse(url).expect("test URL parses"))
    }

    #[test]
    fn equivalent_urls_share_a_fingerprint() {
        let reference = fingerprint_of("https://www.example.com/a/b?a=1&b=2");

        assert_eq!(
            fingerprint_of("https://Example.com/a//b/?b=2&a=1"),
            reference
        );
        assert_eq!(fingerprint_of("https://example.com/A/B?A=1&B=2"), reference);
        assert_eq!(fingerprint_of("https://example.com/a/b/?a=1&b=2"), reference);
    }

    #[test]
    fn distinct_urls_do_not_collide() {
        assert_ne!(
            fingerprint_of("https://example.com/a"),
            fingerprint_of("https://example.com/b")
        );
        assert_ne!(
            fingerprint_of("https://example.com/a?x=1"),
            fingerprint_of("https://example.com/a?x=2")
        );
        assert_ne!(
            fingerprint_of("http://example.com/a"),
            fingerprint_of("https://example.com/a")
        );
        assert_ne!(
            fingerprint_of("https://example.com:8080/a"),
            fingerprint_of("https://example.com/a")
        );
    }

    #[test]
    fn multi_valued_parameters_are_sorted() {
        assert_eq!(
            fingerprint_of("https://example.com/?q=b&q=a"),
            fingerprint_of("https://example.com/?q=a&q=b")
        );
    }

    #[test]
    fn fingerprint_is_32_hex_characters() {
        let hash = fingerprint_of("https://example.com/");
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
