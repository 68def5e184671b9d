//! Error types for the RFB client bridge.

use std::io;
use thiserror::Error;

/// Result type for RFB client operations.
pub type Result<T> = std::result::Result<T, RfbError>;

/// Errors that can occur while bridging an RFB session.
#[derive(Debug, Error)]
pub enum RfbError {
    /// Transport failure: connect failure, short read/write, or peer close.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Malformed or unsupported data on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Security negotiation or authentication failure.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Bad parameter supplied to `set_param`/`connect`.
    #[error("configuration error: {0}")]
    Config(String),

    /// Downstream resize request could not be satisfied.
    ///
    /// Never surfaced to the host as a hard failure — the resize negotiator
    /// catches this internally and falls back to the server's geometry.
    #[error("resize error: {0}")]
    Resize(String),
}

impl RfbError {
    /// Shorthand for a `Protocol` error built from a `Display` message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        RfbError::Protocol(msg.into())
    }

    /// Shorthand for an `Auth` error built from a `Display` message.
    pub fn auth(msg: impl Into<String>) -> Self {
        RfbError::Auth(msg.into())
    }

    /// Shorthand for a `Config` error built from a `Display` message.
    pub fn config(msg: impl Into<String>) -> Self {
        RfbError::Config(msg.into())
    }

    /// Shorthand for a `Resize` error built from a `Display` message.
    pub fn resize(msg: impl Into<String>) -> Self {
        RfbError::Resize(msg.into())
    }
}
