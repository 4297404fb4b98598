use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),
    #[error("url parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("bad link: {0}")]
    BadLink(String),
    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
    #[error("valid initial URL required (got `{0}`)")]
    InvalidSeedUrl(String),
    #[error("requested token not found: {0}")]
    TokenNotFound(i64),
    #[error("no location header on redirect")]
    NoLocationOnRedirect,
    #[error("unknown Content-Encoding: {0}")]
    UnknownContentEncoding(String),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error("{0}")]
    Custom(String),
}

impl From<String> for Error {
    fn from(this: String) -> Error {
        Error::Custom(this)
    }
}
