//! Typed error hierarchy for the taskboard client.
//!
//! Three enums cover the three ways the client talks to the outside world:
//! - `ClientError`: REST requests and configuration
//! - `EventError`: event stream messages that cannot be decoded
//! - `ConnectionError`: event stream transport failures
//!
//! Store operations have no error type: every merge is total and a missing
//! target is a benign race, not a failure.

use taskboard_common::{CardId, ListId};
use thiserror::Error;

/// Errors from REST calls made by the command layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status. `message` is the
    /// server-provided text when it sent one.
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("No board is loaded")]
    NoResidentBoard,

    #[error("Card {id} is not on the current board")]
    CardNotFound { id: CardId },

    #[error("List {id} is not on the current board")]
    ListNotFound { id: ListId },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Text suitable for a status banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401))
    }
}

/// Errors decoding a single event stream message.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Malformed event envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("Malformed {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the event stream transport.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid stream endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Stream error: {0}")]
    Stream(String),
}
