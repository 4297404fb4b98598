//! The crawl engine: canonicalisation, admission, fetching, extraction and
//! the cooperative worker pool that ties them together.

mod boundaries;
mod counter;
mod downloader;
mod master;
mod parser;
mod tasks_state;
mod url_data;
mod worker;

pub use self::boundaries::{Boundaries, Filters};
pub use self::counter::Counter;
pub use self::downloader::{Downloaded, Downloader, DummyDownloader, SimpleDownloader};
pub use self::master::CrawlMaster;
pub use self::parser::extract_links;
pub use self::tasks_state::TasksState;
pub use self::url_data::UrlData;

use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// Virtual status recorded when the server could not be reached at all.
pub const STATUS_NO_RESPONSE: i32 = 0;
/// Virtual status recorded when the response was not `text/html`.
pub const STATUS_NOT_HTML: i32 = 13;

/// How far from the seed's host a crawl may wander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlingMode {
    DomainOnly,
    DomainAndSubdomains,
    All,
}

impl CrawlingMode {
    /// The name under which the mode is persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlingMode::DomainOnly => "DOMAIN_ONLY",
            CrawlingMode::DomainAndSubdomains => "DOMAIN_AND_SUBDOMAINS",
            CrawlingMode::All => "ALL",
        }
    }

    pub fn from_db(name: &str) -> Option<CrawlingMode> {
        match name {
            "DOMAIN_ONLY" => Some(CrawlingMode::DomainOnly),
            "DOMAIN_AND_SUBDOMAINS" => Some(CrawlingMode::DomainAndSubdomains),
            "ALL" => Some(CrawlingMode::All),
            _ => None,
        }
    }
}

impl Default for CrawlingMode {
    fn default() -> CrawlingMode {
        CrawlingMode::DomainOnly
    }
}

impl FromStr for CrawlingMode {
    type Err = crate::Error;

    fn from_str(mode: &str) -> Result<CrawlingMode, crate::Error> {
        match mode {
            "domain-only" => Ok(CrawlingMode::DomainOnly),
            "domain-and-subdomains" => Ok(CrawlingMode::DomainAndSubdomains),
            "all" => Ok(CrawlingMode::All),
            _ => CrawlingMode::from_db(mode)
                .ok_or_else(|| crate::Error::Custom(format!("unknown crawling mode: {}", mode))),
        }
    }
}

/// The content hook: receives every successfully fetched HTML page, after
/// that page's links have been offered to the frontier. Implementations may
/// read and write the same store the crawl runs on.
#[async_trait(?Send)]
pub trait PageHandler: 'static {
    /// Extra DDL the backend runs once at initialisation, right after
    /// creating its own tables.
    fn schema(&self) -> Vec<String> {
        vec![]
    }

    /// Called exactly once per page with a 2xx status and a non-empty body.
    /// A failure here is logged; it does not fail the page or the crawl.
    async fn on_page(&self, page_url: &Url, body: &str) -> Result<(), crate::Error>;
}

/// The handler for crawls that only want the frontier filled.
pub struct NoopHandler;

#[async_trait(?Send)]
impl PageHandler for NoopHandler {
    async fn on_page(&self, _page_url: &Url, _body: &str) -> Result<(), crate::Error> {
        Ok(())
    }
}
