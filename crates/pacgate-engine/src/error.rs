//! Engine error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Failed to initialize engine context: {0}")]
    Init(String),

    #[error("Engine context already acquired")]
    AlreadyAcquired,
}
