use regex::{Regex, RegexBuilder};
use std::rc::Rc;

use crate::cli::Profile;

use super::url_data::UrlData;
use super::CrawlingMode;

/// Extensions that plausibly serve HTML, plus "no extension at all".
const ALLOWED_EXTENSIONS: &[&str] = &[
    "htm", "html", "shtml", "asp", "aspx", "jsp", "jspx", "php", "php5", "php4", "txt", "",
];

/// The session's admission patterns, compiled once at configuration time so
/// that a bad pattern fails the run before any worker starts.
#[derive(Debug)]
pub struct Filters {
    forbidden_domains: Vec<Regex>,
    forbidden_keywords: Vec<Regex>,
    urls_limit: Option<usize>,
}

impl Filters {
    pub fn compile(profile: &Profile) -> Result<Filters, crate::Error> {
        // A domain pattern bans the domain itself and everything below it:
        let forbidden_domains = profile
            .forbidden_domains
            .iter()
            .map(|pattern| compile_pattern(&format!(r"^([a-z0-9-]+\.)*({})$", pattern), pattern))
            .collect::<Result<Vec<_>, _>>()?;

        // A keyword pattern may hit anywhere in the full URL:
        let forbidden_keywords = profile
            .forbidden_keywords
            .iter()
            .map(|pattern| compile_pattern(&format!("({})", pattern), pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Filters {
            forbidden_domains,
            forbidden_keywords,
            urls_limit: profile.urls_limit,
        })
    }

    pub fn urls_limit(&self) -> Option<usize> {
        self.urls_limit
    }
}

fn compile_pattern(expanded: &str, original: &str) -> Result<Regex, crate::Error> {
    RegexBuilder::new(expanded)
        .case_insensitive(true)
        .build()
        .map_err(|_| crate::Error::InvalidRegex(original.to_owned()))
}

/// Decides whether a discovered link may enter the frontier. Deduplication
/// and the URL cap are not decided here; those need the store.
pub struct Boundaries {
    mode: CrawlingMode,
    seed_host: String,
    filters: Rc<Filters>,
}

impl Boundaries {
    pub fn new(seed: &UrlData, mode: CrawlingMode, filters: Rc<Filters>) -> Boundaries {
        Boundaries {
            mode,
            seed_host: seed.host().to_owned(),
            filters,
        }
    }

    pub fn urls_limit(&self) -> Option<usize> {
        self.filters.urls_limit()
    }

    /// Scope, forbidden domains, forbidden keywords and the extension gate,
    /// in that order, short-circuiting on the first rejection.
    pub fn is_allowed(&self, candidate: &UrlData) -> bool {
        let in_scope = match self.mode {
            CrawlingMode::DomainOnly => candidate.host() == self.seed_host,
            CrawlingMode::DomainAndSubdomains => candidate.host().ends_with(&self.seed_host),
            CrawlingMode::All => true,
        };
        if !in_scope {
            return false;
        }

        if self
            .filters
            .forbidden_domains
            .iter()
            .any(|pattern| pattern.is_match(candidate.host()))
        {
            return false;
        }

        if self
            .filters
            .forbidden_keywords
            .iter()
            .any(|pattern| pattern.is_match(candidate.as_str()))
        {
            return false;
        }

        ALLOWED_EXTENSIONS.contains(&extension(candidate.path()).as_str())
    }
}

/// The lowercased tail after the last `.` of the path. A tail longer than
/// five characters is treated as no extension at all.
fn extension(path: &str) -> String {
    match path.rsplit_once('.') {
        Some((_, tail)) if tail.len() <= 5 => tail.to_lowercase(),
        _ => String::new(),
    }
}
