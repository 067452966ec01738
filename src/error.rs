use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open history store at {path}: {source}")]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },
    #[error("history store at {0} is held open by another process")]
    StoreLocked(PathBuf),
    #[error("history store failure: {0}")]
    Store(#[from] sled::Error),
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("malformed value: {0}")]
    MalformedValue(String),
    #[error("cannot encode record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("could not parse {token:?} as a time range")]
    TimeParse { token: String },
    #[error("could not parse {value:?} as {expected}")]
    KeywordValueParse {
        value: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
