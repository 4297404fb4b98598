use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::rc::Rc;

use lib_rastro::backend::{async_trait, FrontierStore, UrlRecord};

const ADD_URL: &str = include_str!("sql/add_url.sql");
const HAS_HASH: &str = include_str!("sql/has_hash.sql");
const NEXT_URL: &str = include_str!("sql/next_url.sql");
const MARK_FETCHED: &str = include_str!("sql/mark_fetched.sql");
const MARK_PROCESSED: &str = include_str!("sql/mark_processed.sql");
const COUNT_URLS: &str = include_str!("sql/count_urls.sql");
const PENDING_COUNT: &str = include_str!("sql/pending_count.sql");
const RESET_INFLIGHT: &str = include_str!("sql/reset_inflight.sql");

/// The durable frontier over a shared SQLite handle.
///
/// None of these calls ever awaits, so a dequeue-then-claim pair cannot
/// interleave with another worker's on the cooperative scheduler; the lone
/// SQLite writer does the rest.
pub struct SqliteFrontierStore {
    connection: Rc<RefCell<Connection>>,
}

impl SqliteFrontierStore {
    pub(crate) fn new(connection: Rc<RefCell<Connection>>) -> SqliteFrontierStore {
        SqliteFrontierStore { connection }
    }
}

#[async_trait(?Send)]
impl FrontierStore for SqliteFrontierStore {
    type Error = crate::Error;

    async fn add_url(&self, token_id: i64, url: &str, hash_id: &str) -> Result<(), crate::Error> {
        self.connection
            .borrow()
            .execute(ADD_URL, params![token_id, url, hash_id])?;

        Ok(())
    }

    async fn has_hash(&self, token_id: i64, hash_id: &str) -> Result<bool, crate::Error> {
        let found = self
            .connection
            .borrow()
            .query_row(HAS_HASH, params![token_id, hash_id], |_row| Ok(()))
            .optional()?;

        Ok(found.is_some())
    }

    async fn next_url(&self, token_id: i64) -> Result<Option<UrlRecord>, crate::Error> {
        let record = self
            .connection
            .borrow()
            .query_row(NEXT_URL, params![token_id], |row| {
                Ok(UrlRecord {
                    id: row.get("id")?,
                    token_id: row.get("token_id")?,
                    url: row.get("url")?,
                    hash_id: row.get("hash_id")?,
                    status: row.get("status")?,
                    fetched: row.get("fetched")?,
                    processed: row.get("processed")?,
                })
            })
            .optional()?;

        Ok(record)
    }

    async fn mark_fetched(&self, id: i64) -> Result<(), crate::Error> {
        self.connection
            .borrow()
            .execute(MARK_FETCHED, params![id])?;

        Ok(())
    }

    async fn mark_processed(&self, id: i64, status: i32) -> Result<(), crate::Error> {
        self.connection
            .borrow()
            .execute(MARK_PROCESSED, params![id, status])?;

        Ok(())
    }

    async fn count(&self, token_id: i64) -> Result<usize, crate::Error> {
        let count: i64 =
            self.connection
                .borrow()
                .query_row(COUNT_URLS, params![token_id], |row| row.get(0))?;

        Ok(count as usize)
    }

    async fn pending_count(&self, token_id: i64) -> Result<usize, crate::Error> {
        let count: i64 =
            self.connection
                .borrow()
                .query_row(PENDING_COUNT, params![token_id], |row| row.get(0))?;

        Ok(count as usize)
    }

    async fn reset_inflight(&self, token_id: i64) -> Result<(), crate::Error> {
        let released = self
            .connection
            .borrow()
            .execute(RESET_INFLIGHT, params![token_id])?;

        if released > 0 {
            log::info!("released {} in-flight URLs back to the frontier", released);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use lib_rastro::backend::{Backend, CrawlingMode, FrontierStore};

    use crate::{DbConfig, SqliteBackend};

    async fn seeded_backend() -> (SqliteBackend, i64) {
        let config = DbConfig {
            db_path: ":memory:".into(),
        };
        let backend = SqliteBackend::init(config, &[]).await.expect("init works");
        let token_id = backend
            .create_token("https://h.net/", "hash-seed", CrawlingMode::DomainOnly)
            .await
            .expect("token is created");

        (backend, token_id)
    }

    #[tokio::test]
    async fn duplicate_discoveries_are_absorbed() {
        let (backend, token_id) = seeded_backend().await;
        let store = backend.build_store().await.unwrap();

        store
            .add_url(token_id, "https://h.net/a", "hash-a")
            .await
            .unwrap();
        store
            .add_url(token_id, "https://h.net/a", "hash-a")
            .await
            .unwrap();

        assert_eq!(store.count(token_id).await.unwrap(), 2);
        assert!(store.has_hash(token_id, "hash-a").await.unwrap());
        assert!(!store.has_hash(token_id, "hash-b").await.unwrap());
    }

    #[tokio::test]
    async fn dequeue_is_fifo_and_skips_claimed_rows() {
        let (backend, token_id) = seeded_backend().await;
        let store = backend.build_store().await.unwrap();

        store
            .add_url(token_id, "https://h.net/a", "hash-a")
            .await
            .unwrap();
        store
            .add_url(token_id, "https://h.net/b", "hash-b")
            .await
            .unwrap();

        let first = store.next_url(token_id).await.unwrap().unwrap();
        assert_eq!(first.url, "https://h.net/");
        store.mark_fetched(first.id).await.unwrap();

        let second = store.next_url(token_id).await.unwrap().unwrap();
        assert_eq!(second.url, "https://h.net/a");
        store.mark_fetched(second.id).await.unwrap();
        store.mark_processed(second.id, 200).await.unwrap();

        let third = store.next_url(token_id).await.unwrap().unwrap();
        assert_eq!(third.url, "https://h.net/b");
        store.mark_fetched(third.id).await.unwrap();

        assert!(store.next_url(token_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn marking_processed_writes_the_status() {
        let (backend, token_id) = seeded_backend().await;
        let store = backend.build_store().await.unwrap();

        let record = store.next_url(token_id).await.unwrap().unwrap();
        assert_eq!(record.status, None);
        assert!(!record.fetched && !record.processed);

        store.mark_fetched(record.id).await.unwrap();
        store.mark_processed(record.id, 404).await.unwrap();

        assert_eq!(store.pending_count(token_id).await.unwrap(), 0);
        assert_eq!(store.count(token_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reset_inflight_releases_claims_but_not_finished_work() {
        let (backend, token_id) = seeded_backend().await;
        let store = backend.build_store().await.unwrap();

        store
            .add_url(token_id, "https://h.net/a", "hash-a")
            .await
            .unwrap();

        // One row finished, one claimed by a run that died:
        let first = store.next_url(token_id).await.unwrap().unwrap();
        store.mark_fetched(first.id).await.unwrap();
        store.mark_processed(first.id, 200).await.unwrap();

        let second = store.next_url(token_id).await.unwrap().unwrap();
        store.mark_fetched(second.id).await.unwrap();
        assert!(store.next_url(token_id).await.unwrap().is_none());

        store.reset_inflight(token_id).await.unwrap();

        let reclaimed = store.next_url(token_id).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, second.id);
        assert_eq!(store.pending_count(token_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn tokens_do_not_share_hashes() {
        let (backend, token_id) = seeded_backend().await;
        let other_token = backend
            .create_token("https://other.net/", "hash-other", CrawlingMode::All)
            .await
            .unwrap();
        let store = backend.build_store().await.unwrap();

        store
            .add_url(token_id, "https://h.net/a", "hash-a")
            .await
            .unwrap();

        assert!(store.has_hash(token_id, "hash-a").await.unwrap());
        assert!(!store.has_hash(other_token, "hash-a").await.unwrap());
        assert_eq!(store.count(other_token).await.unwrap(), 1);
    }
}
