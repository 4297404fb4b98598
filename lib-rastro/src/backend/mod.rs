//! What a persistent store must provide for crawls to run against it.

mod memory;

pub use async_trait::async_trait;
pub use http::StatusCode;
pub use structopt::StructOpt;
pub use url::Url;

pub use self::memory::{MemoryBackend, MemoryConfig, MemoryStore};
pub use crate::crawler::CrawlingMode;

use chrono::{DateTime, Utc};
use serde_derive::Serialize;

/// One crawl session's persisted root configuration. Never mutated once
/// created.
#[derive(Debug, Clone)]
pub struct Token {
    pub id: i64,
    /// The seed's canonical absolute URL.
    pub url: String,
    pub mode: CrawlingMode,
    /// UTC instant of creation.
    pub created: DateTime<Utc>,
}

/// One row of the durable frontier.
#[derive(Debug, Clone)]
pub struct UrlRecord {
    pub id: i64,
    pub token_id: i64,
    /// The full canonical URL as stored.
    pub url: String,
    /// The 32-hex fingerprint; unique within the token.
    pub hash_id: String,
    /// `None` until the row is processed.
    pub status: Option<i32>,
    /// Set once a worker has claimed the row.
    pub fetched: bool,
    /// Set once the final status has been written.
    pub processed: bool,
}

/// One line of the `tokens` listing. Only tokens that still have work left
/// show up there.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSummary {
    pub id: i64,
    pub url: String,
    pub created: DateTime<Utc>,
    pub total_urls: i64,
    pub not_processed_urls: i64,
}

#[async_trait(?Send)]
pub trait Backend: Sized {
    type Error: Into<crate::Error>;
    type Config: StructOpt;
    type Store: FrontierStore<Error = Self::Error>;

    /// Opens the store, creating the core tables and running the content
    /// handler's extra DDL. Must be idempotent.
    async fn init(config: Self::Config, handler_schema: &[String]) -> Result<Self, Self::Error>;

    /// Inserts a token and its seed URL row in a single transaction and
    /// returns the new token id.
    async fn create_token(
        &self,
        seed_url: &str,
        hash_id: &str,
        mode: CrawlingMode,
    ) -> Result<i64, Self::Error>;

    async fn load_token(&self, token_id: i64) -> Result<Option<Token>, Self::Error>;

    async fn list_tokens(&self) -> Result<Vec<TokenSummary>, Self::Error>;

    async fn build_store(&self) -> Result<Self::Store, Self::Error>;
}

/// The durable URL frontier. Every write is committed before the call
/// returns; that is what makes a crawl resumable after a crash at any point.
#[async_trait(?Send)]
pub trait FrontierStore {
    type Error: Into<crate::Error>;

    /// Inserts a discovered URL. A `(token_id, hash_id)` collision is
    /// silently absorbed; duplicate discovery is expected.
    async fn add_url(&self, token_id: i64, url: &str, hash_id: &str) -> Result<(), Self::Error>;

    async fn has_hash(&self, token_id: i64, hash_id: &str) -> Result<bool, Self::Error>;

    /// The oldest URL that nobody has claimed yet.
    async fn next_url(&self, token_id: i64) -> Result<Option<UrlRecord>, Self::Error>;

    async fn mark_fetched(&self, id: i64) -> Result<(), Self::Error>;

    async fn mark_processed(&self, id: i64, status: i32) -> Result<(), Self::Error>;

    /// Total rows known for the token, whatever their state.
    async fn count(&self, token_id: i64) -> Result<usize, Self::Error>;

    /// Rows still waiting to be processed, claimed or not.
    async fn pending_count(&self, token_id: i64) -> Result<usize, Self::Error>;

    /// Makes claimed-but-unprocessed rows claimable again. Run exactly once
    /// at the start of a resume, before any worker exists.
    async fn reset_inflight(&self, token_id: i64) -> Result<(), Self::Error>;
}
