//! The default Rastro store: one SQLite file holding the whole crawl state.

mod db;
mod error;
mod store;

pub use db::DbConfig;
pub use error::Error;
pub use store::SqliteFrontierStore;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::rc::Rc;

use lib_rastro::backend::{async_trait, Backend, CrawlingMode, Token, TokenSummary};

const CREATE_TOKEN: &str = include_str!("sql/create_token.sql");
const SEED_URL: &str = include_str!("sql/seed_url.sql");
const LOAD_TOKEN: &str = include_str!("sql/load_token.sql");
const LIST_TOKENS: &str = include_str!("sql/list_tokens.sql");

#[derive(Clone)]
pub struct SqliteBackend {
    connection: Rc<RefCell<Connection>>,
}

impl SqliteBackend {
    /// The underlying handle. Content handlers run on the crawl's thread and
    /// may use this to read and write their own tables in the same store.
    pub fn connection(&self) -> Rc<RefCell<Connection>> {
        self.connection.clone()
    }
}

#[async_trait(?Send)]
impl Backend for SqliteBackend {
    type Error = crate::Error;
    type Config = DbConfig;
    type Store = SqliteFrontierStore;

    async fn init(config: DbConfig, handler_schema: &[String]) -> Result<SqliteBackend, crate::Error> {
        let connection = config.open()?;
        db::sync_schema(&connection, handler_schema)?;

        Ok(SqliteBackend {
            connection: Rc::new(RefCell::new(connection)),
        })
    }

    async fn create_token(
        &self,
        seed_url: &str,
        hash_id: &str,
        mode: CrawlingMode,
    ) -> Result<i64, crate::Error> {
        let mut connection = self.connection.borrow_mut();
        let transaction = connection.transaction()?;

        transaction.execute(CREATE_TOKEN, params![seed_url, mode.as_str(), Utc::now()])?;
        let token_id = transaction.last_insert_rowid();
        transaction.execute(SEED_URL, params![token_id, seed_url, hash_id])?;

        transaction.commit()?;

        Ok(token_id)
    }

    async fn load_token(&self, token_id: i64) -> Result<Option<Token>, crate::Error> {
        let row = self
            .connection
            .borrow()
            .query_row(LOAD_TOKEN, params![token_id], |row| {
                Ok((
                    row.get::<_, i64>("id")?,
                    row.get::<_, String>("url")?,
                    row.get::<_, String>("mode")?,
                    row.get::<_, DateTime<Utc>>("created")?,
                ))
            })
            .optional()?;

        row.map(|(id, url, mode, created)| {
            let mode = CrawlingMode::from_db(&mode).ok_or(crate::Error::CorruptMode(mode))?;

            Ok(Token {
                id,
                url,
                mode,
                created,
            })
        })
        .transpose()
    }

    async fn list_tokens(&self) -> Result<Vec<TokenSummary>, crate::Error> {
        let connection = self.connection.borrow();
        let mut statement = connection.prepare(LIST_TOKENS)?;

        let summaries = statement
            .query_map([], |row| {
                Ok(TokenSummary {
                    id: row.get("id")?,
                    url: row.get("url")?,
                    created: row.get("created")?,
                    total_urls: row.get("total_urls")?,
                    not_processed_urls: row.get("not_processed_urls")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    async fn build_store(&self) -> Result<SqliteFrontierStore, crate::Error> {
        Ok(SqliteFrontierStore::new(self.connection.clone()))
    }
}
