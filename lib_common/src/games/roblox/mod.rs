//! # Roblox Games API Integration Module
//!
//! Clients for the three public multi-get endpoints the snapshot is built from:
//! game metadata and votes (`games.roblox.com`) and thumbnails
//! (`thumbnails.roblox.com`).
//!
//! ## Contained Modules:
//!
//! - **`adapters`**: request URL and response parsing per endpoint, behind the
//!   shared `EndpointAdapter` trait.
//! - **`apicall`**: `GamesApi`, which runs any adapter through the resilient
//!   `ApiClient`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Endpoint-specific URL building and response parsing.
pub mod adapters;
/// Shared fetch routine over the resilient client.
pub mod apicall;

pub use adapters::{EndpointAdapter, MetadataAdapter, ThumbnailsAdapter, VotesAdapter};
pub use apicall::GamesApi;
