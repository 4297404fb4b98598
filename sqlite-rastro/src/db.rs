use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

const SCHEMA: &str = include_str!("sql/schema.sql");

/// Where the crawl state lives.
#[derive(Debug, StructOpt)]
pub struct DbConfig {
    /// The SQLite database file holding all crawl state.
    #[structopt(long, env = "DB_PATH", default_value = "db.sqlite3")]
    pub db_path: PathBuf,
}

impl DbConfig {
    pub(crate) fn open(&self) -> Result<Connection, crate::Error> {
        log::debug!("opening database at {}", self.db_path.display());
        let connection = Connection::open(&self.db_path)?;

        // A lone writer, but it must never be starved by readers:
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.pragma_update(None, "journal_mode", "wal")?;
        connection.pragma_update(None, "foreign_keys", "on")?;

        Ok(connection)
    }
}

/// Applies the core schema, then whatever tables the content handler wants.
pub(crate) fn sync_schema(
    connection: &Connection,
    handler_schema: &[String],
) -> Result<(), crate::Error> {
    connection.execute_batch(SCHEMA)?;

    for ddl in handler_schema {
        connection.execute_batch(ddl)?;
    }

    Ok(())
}
