use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("token stores an unknown crawling mode: {0}")]
    CorruptMode(String),
}

impl From<Error> for lib_rastro::Error {
    fn from(this: Error) -> lib_rastro::Error {
        lib_rastro::Error::Custom(this.to_string())
    }
}
