//! Web Push delivery
//!
//! Sends encrypted notifications to browser push services.
//!
//! # Features
//!
//! - VAPID authentication (RFC 8292) with a per-audience JWT cache
//! - Web Push payload encryption (RFC 8291, `aes128gcm` from RFC 8188)
//! - Response classification: sent, subscription gone, or transient failure
//! - Bounded concurrent batches with cooperative cancellation
//!
//! The HTTP call goes through the [`transport::PushTransport`] trait so the
//! dispatcher can be driven without a network.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod ecdh;
pub mod ece;
pub mod send;
pub mod transport;
pub mod vapid;

mod prelude;

pub use send::{BatchResult, Dispatcher, DispatcherOpts, NotificationPayload, SendOutcome};
pub use transport::{HyperTransport, PushRequest, PushTransport};
pub use vapid::{audience_from_endpoint, build_authorization_header, generate_vapid_keys};

// vim: ts=4
