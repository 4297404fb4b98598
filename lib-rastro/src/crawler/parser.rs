use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HREF: Regex = Regex::new(r#"(?i)href=["']+([^"']+)"#).expect("valid static regex");
}

/// Pulls every `href` attribute value out of a raw HTML body. No HTML
/// parsing happens here, the pattern runs over the text as served. Section
/// references (`#...`) are dropped on the spot.
pub fn extract_links(body: &str) -> Vec<&str> {
    HREF.captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .map(|matched| matched.as_str())
        .filter(|raw| !raw.starts_with('#'))
        .collect()
}
