//! Common error types for the RUES resolver workspace

use thiserror::Error;

/// Common result type for configuration and record-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the resolver service and its tools
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure talking to the record store
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The record store answered with a JSON-RPC error member
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
