//! PAC error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacError {
    #[error("PAC parse failure: {0}")]
    ParseFailure(String),

    #[error("PAC evaluation failure: {0}")]
    EvaluationFailure(String),

    #[error("Invalid proxy return value")]
    InvalidProxyResult,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid client address: {0}")]
    InvalidAddress(String),

    #[error("PAC dispatcher is not running")]
    Unavailable,
}
