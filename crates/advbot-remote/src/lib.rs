//! Remote message-chain client for advbot
//!
//! Provides serialized, rate-limit aware access to the remote service:
//!
//! - **Seam**: `RemoteApi`, the raw session, and its `ApiError` classes
//! - **Operations**: descriptors run by the single retry wrapper
//! - **Client**: `RemoteClient`, with the single-flight gate, reply chains
//!   and the mention high-water mark
//! - **HTTP**: `HttpApi`, a bearer-token backend for a Twitter-v2-style API

mod api;
mod client;
mod http;
mod operation;

pub use api::{ApiError, FailureClass, RemoteApi};
pub use client::RemoteClient;
pub use http::{DEFAULT_BASE_URL, HttpApi, classify_status};
pub use operation::{ListMentions, Operation, PostMessage};
