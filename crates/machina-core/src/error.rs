//! Unified error types for the Machina core.
//!
//! This module provides the error types shared by the payload model and by
//! the contracts of the external collaborators (transport, outbound client,
//! storage). Registration errors live in `machina-framework`.

use thiserror::Error;

// =============================================================================
// Decode Errors
// =============================================================================

/// A cross-field rule of an interactive payload that did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A block-actions payload carried neither a `view` nor a `message`.
    #[error("either `view` or `message` must be present")]
    MissingViewAndMessage,

    /// A block-actions payload carried a `message` but lacked a companion field.
    #[error("`{field}` must be present when `message` is present")]
    MessageWithout {
        /// The absent companion field (`channel`, `state` or `response_url`).
        field: &'static str,
    },

    /// A block-actions payload carried an empty `actions` list.
    #[error("`actions` must contain at least one action")]
    NoActions,
}

/// Errors produced while decoding an inbound payload.
///
/// Decoding never panics: every input outside the declared domain maps to
/// one of these variants.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input was not a JSON object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A discriminated union point carried no string `type` field.
    #[error("missing `type` discriminant at {location}")]
    MissingDiscriminant {
        /// JSON path of the union point.
        location: String,
    },

    /// The top-level `type` is not a known interactive payload type.
    #[error("unrecognized payload type '{0}'")]
    UnrecognizedPayloadType(String),

    /// An action or state value named an element type outside the closed set.
    #[error("unrecognized element type '{element_type}' at {location}")]
    UnrecognizedElementType {
        /// The offending `type` string.
        element_type: String,
        /// JSON path of the element.
        location: String,
    },

    /// The container `type` is not one of `message`, `message_attachment`, `view`.
    #[error("unrecognized container type '{0}'")]
    UnrecognizedContainerType(String),

    /// Field-level decoding failed.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// All fields decoded but a cross-field invariant failed.
    #[error("payload invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur while talking back to the socket transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// The acknowledgement could not be delivered.
    #[error("failed to send acknowledgement: {0}")]
    SendFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for outbound platform API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The client is not connected.
    #[error("client is not connected")]
    NotConnected,
    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,
    /// The platform answered with `ok: false`.
    #[error("platform error: {0}")]
    Platform(String),
    /// The call cannot be made from the current context.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored value could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for payload decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
