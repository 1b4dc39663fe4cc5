//! Decode error primitives.

use serde_json::error::Category;
use thiserror::Error;

/// Error produced when a frame or payload cannot be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame was not valid JSON.
    #[error("frame is not valid JSON")]
    Malformed {
        /// Underlying parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The frame was JSON but not a `{"type": .., "data": ..}` envelope.
    #[error("frame does not match the message envelope")]
    Envelope {
        /// Underlying shape failure.
        #[source]
        source: serde_json::Error,
    },
    /// The envelope `data` did not match the payload type for its kind.
    #[error("message payload does not match the expected type")]
    Payload {
        /// Message kind whose payload failed to decode.
        kind: String,
        /// Underlying shape failure.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Classify a frame-level `serde_json` failure.
    #[must_use]
    pub fn from_frame(source: serde_json::Error) -> Self {
        match source.classify() {
            Category::Data => Self::Envelope { source },
            Category::Io | Category::Syntax | Category::Eof => Self::Malformed { source },
        }
    }

    /// Message kind associated with a payload failure, if any.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Payload { kind, .. } => Some(kind),
            Self::Malformed { .. } | Self::Envelope { .. } => None,
        }
    }
}

/// Result alias for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
