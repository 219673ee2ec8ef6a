//! Shared types and wire format for the Stratus update subsystem.
//!
//! This crate defines the canonical data structures used across the updater:
//! release and asset records as served by the release host, the update channel
//! policy, the lenient total-order version algebra used for release selection,
//! and typed wrappers for SHA-256 digests.

/// Update channel policy: which releases a user is willing to see.
pub mod channel;
/// Typed wrappers for cryptographic digests (SHA-256).
pub mod hash;
/// Release, asset, and update-candidate records.
pub mod release;
/// Lenient version parsing and total ordering.
pub mod version;

// Re-exports
pub use channel::Channel;
pub use hash::Sha256Digest;
pub use release::{Release, ReleaseAsset, UpdateInfo};
pub use version::ReleaseVersion;

/// Root of Trust: the Stratus release-signing OpenPGP public key
/// (ASCII-armored, Ed25519). Corresponds to the private key held in CI
/// credentials.
pub const RELEASE_SIGNING_KEY: &str = "\
-----BEGIN PGP PUBLIC KEY BLOCK-----

mDMEam28/xYJKwYBBAHaRw8BAQdAFDB6hSZ++C+0ROsCRE44MJV1ctvVn2d43dQe
qis6wly0J1N0cmF0dXMgUmVsZWFzZXMgPHJlbGVhc2VzQHN0cmF0dXMuYXBwPoiQ
BBMWCAA4FiEEVVe0YWHzWBShB6XaEflvvx4XyNQFAmptvP8CGwMFCwkIBwIGFQoJ
CAsCBBYCAwECHgECF4AACgkQEflvvx4XyNR9lwEAirTBAGk6zzxHZ8mcwQyRXF14
xjsZxCqBPzdj0bJsIZ0A/0NJMJfFU0uO68qQ4JMkwLBb2996n37GC5qqx8hwDvMK
=zsfL
-----END PGP PUBLIC KEY BLOCK-----
";
