//! Core types and trait definitions for the Codeprac institution hierarchy.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! store, the identity gateway and the audit recorder are all expressed as
//! traits here; concrete backends live in their own crates.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod entity;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod store;

pub use error::{Error, Result};
