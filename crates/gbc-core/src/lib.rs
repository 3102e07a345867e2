//! Core of the chat bot connector.
//!
//! This crate is intentionally transport-agnostic. The WebSocket connection
//! lives behind the `ports::Connector` trait, implemented in adapter crates.
//! What remains here is the outbound rate-limiting pipeline, the wire rules
//! of the chat protocol and the session state machine driving both.

pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod limiter;
pub mod logging;
pub mod modes;
pub mod pipeline;
pub mod ports;
pub mod protocol;
pub mod session;

pub use errors::{Error, Result};
