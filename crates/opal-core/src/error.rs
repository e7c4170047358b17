use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown type id {0}")]
    UnknownType(u32),
    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
