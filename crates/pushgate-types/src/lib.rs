//! Shared types, adapter traits, and core utilities for Pushgate.
//!
//! This crate holds everything the delivery engine, the service facade and the
//! storage adapters agree on: the error type, subscription records, VAPID key
//! material and the collaborator traits they are reached through.

pub mod config;
pub mod error;
pub mod prelude;
pub mod subscription_adapter;
pub mod types;
pub mod utils;

// vim: ts=4
