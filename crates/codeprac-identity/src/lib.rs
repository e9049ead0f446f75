//! HTTP client for the external identity directory.
//!
//! [`HttpGateway`] implements
//! [`IdentityGateway`](codeprac_core::identity::IdentityGateway) with JSON
//! over HTTP. Every request carries the shared service secret in the
//! `x-service-secret` header.

mod client;
pub mod error;

pub use client::{GatewayConfig, HttpGateway};
pub use error::{Error, Result};
