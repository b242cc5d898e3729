// Rust guideline compliant 2026-10-15

//! Adapters (secondary ports) for the order SMS binary.
//!
//! Each sub-module implements one or more port traits from the `domain`
//! crate over HTTP.

pub mod firestore_store;
pub mod firestore_value;
pub mod hubtel_gateway;
