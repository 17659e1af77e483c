//! # Machina Core
//!
//! Core types of the Machina chat-bot runtime.
//!
//! This crate holds everything the dispatch engine needs to know about the
//! outside world, and nothing about how dispatch works:
//!
//! - **Payload model**: typed, validated interactive payloads ([`payload`])
//! - **Events**: the inbound envelope and the events it carries ([`event`])
//! - **Integration**: the contracts of the transport, the web API client and
//!   storage backends ([`integration`])
//! - **Errors**: the error types of all of the above ([`error`])
//!
//! ```text
//! ┌───────────┐  SocketModeRequest  ┌────────────┐  SlackClient   ┌──────────┐
//! │ Transport │ ──────────────────▶ │ Dispatcher │ ─────────────▶ │ Web API  │
//! └───────────┘ ◀────────────────── └────────────┘                └──────────┘
//!                 Acknowledgement
//! ```

pub mod error;
pub mod event;
pub mod integration;
pub mod payload;

pub use error::{
    ApiError, ApiResult, DecodeError, DecodeResult, InvariantViolation, StorageError,
    StorageResult, TransportError, TransportResult,
};
pub use event::{
    ChannelType, MESSAGE_CHANGED, MESSAGE_EVENT, MessageEvent, RequestType, SlashCommand,
    SocketModeRequest, event_type,
};
pub use integration::{
    AckPayload, Acknowledgement, InboundRequest, SendOptions, SlackClient, SocketConnection,
    StorageBackend,
};
pub use payload::{
    Action, ActionElement, BlockActionsPayload, ElementKind, InteractivePayload, PayloadType,
    StateValue, View, ViewClosedPayload, ViewSubmissionPayload, decode_interactive,
    decode_interactive_str,
};
