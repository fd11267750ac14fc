//! # Data Retrieval Module
//!
//! This module provides a centralized location for generic data retrieval
//! clients and utilities, primarily focused on HTTP-based interactions.
//!
//! ## Contained Modules:
//!
//! - **`backoff`**: stateless delay computation (exponential with jitter,
//!   `Retry-After` parsing).
//! - **`retry`**: `reqwest-middleware` layer applying per-attempt timeouts and
//!   retrying transient failures.
//! - **`ky_http`**: the `ApiClient` built on top of both, with optional relay
//!   URL rewriting.
//!
//! By using the components within this module, other parts of the system
//! can focus on data parsing and business logic, delegating the complexities
//! of network communication to this layer.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Exponential backoff with jitter and `Retry-After` parsing.
pub mod backoff;
/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;
/// Retry middleware for `reqwest-middleware`.
pub mod retry;

pub use backoff::BackoffPolicy;
pub use ky_http::{ApiClient, ApiClientOptions, ApiResponse, FetchError, Relay};
