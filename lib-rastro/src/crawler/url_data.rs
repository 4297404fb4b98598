use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use url::Url;

lazy_static! {
    /// `http(s)`, then a dotted domain, `localhost` or a dotted-quad host,
    /// then an optional port and an optional path-or-query tail.
    static ref ABSOLUTE: Regex = RegexBuilder::new(
        r"^https?://(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?]\S+)$",
    )
    .case_insensitive(true)
    .build()
    .expect("valid static regex");

    /// Anything that already names a scheme, http or not.
    static ref HAS_SCHEME: Regex =
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("valid static regex");
}

/// The parsed form of a raw link: its original text plus the canonical
/// absolute URL it resolves to. Construction fails for anything that is not
/// a well-formed http(s) URL, so a `UrlData` is always fetchable.
#[derive(Debug, Clone)]
pub struct UrlData {
    original: String,
    url: Url,
}

impl UrlData {
    /// Canonicalises an absolute URL.
    pub fn parse(raw: &str) -> Result<UrlData, crate::Error> {
        UrlData::resolve(raw, None)
    }

    /// Canonicalises a raw link, resolving it against `base` when relative.
    ///
    /// Fragments are stripped before and after resolution. A link that names
    /// a non-http scheme is rejected outright instead of being resolved.
    pub fn resolve(raw: &str, base: Option<&Url>) -> Result<UrlData, crate::Error> {
        let without_fragment = raw.split('#').next().unwrap_or_default();

        // Absolute and well-formed? Take it as-is.
        if ABSOLUTE.is_match(without_fragment) {
            return Ok(UrlData {
                original: raw.to_owned(),
                url: Url::parse(without_fragment)?,
            });
        }

        if HAS_SCHEME.is_match(without_fragment) {
            return Err(crate::Error::BadLink(raw.to_owned()));
        }

        let base = match base {
            Some(base) if ABSOLUTE.is_match(base.as_str()) => base,
            _ => return Err(crate::Error::BadLink(raw.to_owned())),
        };

        if without_fragment.is_empty() {
            return Err(crate::Error::BadLink(raw.to_owned()));
        }

        let mut url = base.join(without_fragment)?;
        url.set_fragment(None);

        if !ABSOLUTE.is_match(url.as_str()) {
            return Err(crate::Error::BadLink(raw.to_owned()));
        }

        Ok(UrlData {
            original: raw.to_owned(),
            url,
        })
    }

    /// The link text as it appeared on the page.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The canonical absolute URL, as stored in the frontier.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The deduplication key of this URL within a token.
    pub fn hash_id(&self) -> String {
        crate::hash::fingerprint(&self.url)
    }
}
