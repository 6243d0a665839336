//! Pushgate delivers Web Push notifications to browsers.
//!
//! # Features
//!
//! - VAPID authentication (RFC 8292)
//! - `aes128gcm` payload encryption (RFC 8188, 8291)
//! - Subscription lifecycle: subscribe, reactivate, unsubscribe, and
//!   automatic deactivation when the push service reports a subscription gone
//! - Fan-out per user, tenant or topic with bounded concurrency
//!
//! Storage is not part of Pushgate. Plug in a [`subscription_adapter::SubscriptionAdapter`]
//! and a [`config::ConfigProvider`] through [`PushServiceBuilder`].

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

// Re-export shared types and adapter traits from pushgate-types
pub use pushgate_types::config;
pub use pushgate_types::error;
pub use pushgate_types::subscription_adapter;
pub use pushgate_types::types;
pub use pushgate_types::utils;

// Delivery engine
pub use pushgate_push as push;

pub mod app;
pub mod prelude;

pub use app::{init_tracing, PushService, PushServiceBuilder, SubscribeRequest, VERSION};

// vim: ts=4
