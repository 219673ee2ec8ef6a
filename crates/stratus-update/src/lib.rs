//! Update distribution core for the Stratus desktop weather application.
//!
//! This crate discovers, fetches, authenticates, and stages application
//! releases from a GitHub-compatible release host. It is consumed as a
//! library by the host process, which only ever sees three operations:
//! check for an update, download (and verify) it into the staging directory,
//! and clean up. Everything else - conditional catalog caching, channel
//! policy, platform asset matching, streaming downloads with cancellation,
//! checksum and signature verification - happens behind that surface.

/// Persisted release-catalog cache with its identifying triple.
pub mod cache;
/// Release catalog client: paginated conditional fetch with cache fallback.
pub mod catalog;
/// Streaming artifact downloads with progress and cancellation.
pub mod download;
/// Error sum type for every failure mode in the subsystem.
pub mod error;
/// Configuration directory layout.
pub mod paths;
/// Progress reporting trait for UI decoupling.
pub mod progress;
/// Channel filtering, candidate selection, and platform asset matching.
pub mod select;
/// The orchestrating update service.
pub mod service;
/// Persisted update settings (channel, owner, repo).
pub mod settings;
/// Staging-path safety validation.
pub mod validate;
/// Checksum and signature verification.
pub mod verify;

mod fsutil;

pub use error::UpdateError;
pub use progress::{NullProgress, ProgressSink};
pub use select::Platform;
pub use service::{Diagnostics, UpdateService};
pub use settings::UpdateSettings;

/// User-Agent string sent with every request to the release host.
pub const USER_AGENT: &str = concat!("Stratus/", env!("CARGO_PKG_VERSION"));
