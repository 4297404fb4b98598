//! A complete backend that forgets everything on drop. Useful for tests and
//! for trying out content handlers without a database file.

use chrono::Utc;
use std::cell::RefCell;
use std::rc::Rc;
use structopt::StructOpt;

use super::{async_trait, Backend, CrawlingMode, FrontierStore, Token, TokenSummary, UrlRecord};

#[derive(Debug, StructOpt)]
pub struct MemoryConfig {}

#[derive(Debug, Default)]
struct MemoryState {
    tokens: Vec<Token>,
    urls: Vec<UrlRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Rc<RefCell<MemoryState>>,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryBackend {
    /// A snapshot of every URL row, for inspection after a run.
    pub fn urls(&self) -> Vec<UrlRecord> {
        self.state.borrow().urls.clone()
    }
}

#[async_trait(?Send)]
impl Backend for MemoryBackend {
    type Error = crate::Error;
    type Config = MemoryConfig;
    type Store = MemoryStore;

    async fn init(
        _config: MemoryConfig,
        _handler_schema: &[String],
    ) -> Result<MemoryBackend, crate::Error> {
        Ok(MemoryBackend::default())
    }

    async fn create_token(
        &self,
        seed_url: &str,
        hash_id: &str,
        mode: CrawlingMode,
    ) -> Result<i64, crate::Error> {
        let mut state = self.state.borrow_mut();

        let token_id = state.tokens.len() as i64 + 1;
        state.tokens.push(Token {
            id: token_id,
            url: seed_url.to_owned(),
            mode,
            created: Utc::now(),
        });

        let url_id = state.urls.len() as i64 + 1;
        state.urls.push(UrlRecord {
            id: url_id,
            token_id,
            url: seed_url.to_owned(),
            hash_id: hash_id.to_owned(),
            status: None,
            fetched: false,
            processed: false,
        });

        Ok(token_id)
    }

    async fn load_token(&self, token_id: i64) -> Result<Option<Token>, crate::Error> {
        Ok(self
            .state
            .borrow()
            .tokens
            .iter()
            .find(|token| token.id == token_id)
            .cloned())
    }

    async fn list_tokens(&self) -> Result<Vec<TokenSummary>, crate::Error> {
        let state = self.state.borrow();

        Ok(state
            .tokens
            .iter()
            .filter_map(|token| {
                let total = state
                    .urls
                    .iter()
                    .filter(|record| record.token_id == token.id)
                    .count() as i64;
                let pending = state
                    .urls
                    .iter()
                    .filter(|record| record.token_id == token.id && !record.processed)
                    .count() as i64;

                (pending > 0).then(|| TokenSummary {
                    id: token.id,
                    url: token.url.clone(),
                    created: token.created,
                    total_urls: total,
                    not_processed_urls: pending,
                })
            })
            .collect())
    }

    async fn build_store(&self) -> Result<MemoryStore, crate::Error> {
        Ok(MemoryStore {
            state: self.state.clone(),
        })
    }
}

#[async_trait(?Send)]
impl FrontierStore for MemoryStore {
    type Error = crate::Error;

    async fn add_url(&self, token_id: i64, url: &str, hash_id: &str) -> Result<(), crate::Error> {
        let mut state = self.state.borrow_mut();

        let duplicate = state
            .urls
            .iter()
            .any(|record| record.token_id == token_id && record.hash_id == hash_id);
        if !duplicate {
            let id = state.urls.len() as i64 + 1;
            state.urls.push(UrlRecord {
                id,
                token_id,
                url: url.to_owned(),
                hash_id: hash_id.to_owned(),
                status: None,
                fetched: false,
                processed: false,
            });
        }

        Ok(())
    }

    async fn has_hash(&self, token_id: i64, hash_id: &str) -> Result<bool, crate::Error> {
        Ok(self
            .state
            .borrow()
            .urls
            .iter()
            .any(|record| record.token_id == token_id && record.hash_id == hash_id))
    }

    async fn next_url(&self, token_id: i64) -> Result<Option<UrlRecord>, crate::Error> {
        Ok(self
            .state
            .borrow()
            .urls
            .iter()
            .find(|record| record.token_id == token_id && !record.processed && !record.fetched)
            .cloned())
    }

    async fn mark_fetched(&self, id: i64) -> Result<(), crate::Error> {
        if let Some(record) = self
            .state
            .borrow_mut()
            .urls
            .iter_mut()
            .find(|record| record.id == id)
        {
            record.fetched = true;
        }

        Ok(())
    }

    async fn mark_processed(&self, id: i64, status: i32) -> Result<(), crate::Error> {
        if let Some(record) = self
            .state
            .borrow_mut()
            .urls
            .iter_mut()
            .find(|record| record.id == id)
        {
            record.processed = true;
            record.status = Some(status);
        }

        Ok(())
    }

    async fn count(&self, token_id: i64) -> Result<usize, crate::Error> {
        Ok(self
            .state
            .borrow()
            .urls
            .iter()
            .filter(|record| record.token_id == token_id)
            .count())
    }

    async fn pending_count(&self, token_id: i64) -> Result<usize, crate::Error> {
        Ok(self
            .state
            .borrow()
            .urls
            .iter()
            .filter(|record| record.token_id == token_id && !record.processed)
            .count())
    }

    async fn reset_inflight(&self, token_id: i64) -> Result<(), crate::Error> {
        for record in self.state.borrow_mut().urls.iter_mut() {
            if record.token_id == token_id && !record.processed && record.fetched {
                record.fetched = false;
            }
        }

        Ok(())
    }
}
