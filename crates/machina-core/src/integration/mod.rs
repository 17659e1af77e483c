//! Contracts of the external collaborators.
//!
//! The core never talks to the network or to a database directly. It goes
//! through these traits:
//!
//! - [`SocketConnection`]: acknowledges inbound envelopes
//! - [`SlackClient`]: outbound web API calls
//! - [`StorageBackend`]: persistent key-value storage

mod client;
mod connection;
mod storage;

pub use client::{SendOptions, SlackClient};
pub use connection::{AckPayload, Acknowledgement, InboundRequest, SocketConnection};
pub use storage::StorageBackend;
