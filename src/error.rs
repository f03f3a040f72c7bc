//! Error types for imapd

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid sequence number: {0:?}")]
    InvalidSequenceNumber(String),

    #[error("invalid range string: {0:?}")]
    InvalidRange(String),

    #[error("invalid sequence set string: {0:?}")]
    InvalidSequenceSet(String),

    #[error("mail store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("server state error: {0}")]
    ServerState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
