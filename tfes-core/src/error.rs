//! TFES Error Types
//!
//! Unified error handling for subject validation, framing, routing, and
//! configuration failures.

use std::io;
use thiserror::Error;

/// Main error type for TFES core operations.
#[derive(Error, Debug)]
pub enum TfesError {
    /// IO error during socket operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Subject or pattern failed the token grammar.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// Frame failed to decode as JSON, or exceeded the size ceiling.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Configuration file missing, malformed, or structurally invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Channel send failed (receiver dropped).
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive failed (sender dropped).
    #[error("channel receive error")]
    ChannelRecv,

    /// Peer dial or handshake failed.
    #[error("peer error: {0}")]
    Peer(String),
}

/// Result type alias for TFES core operations.
pub type Result<T> = std::result::Result<T, TfesError>;

impl TfesError {
    /// Create an invalid-subject error with a message.
    pub fn invalid_subject(msg: impl Into<String>) -> Self {
        Self::InvalidSubject(msg.into())
    }

    /// Create an invalid-frame error with a message.
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a peer error with a message.
    pub fn peer(msg: impl Into<String>) -> Self {
        Self::Peer(msg.into())
    }
}
