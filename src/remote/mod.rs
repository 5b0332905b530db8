//! The opaque translation round trip and poll-mode deduplication.

#[cfg(feature = "remote")]
pub mod client;
pub mod fingerprint;

#[cfg(feature = "remote")]
pub use client::TranslationClient;
pub use fingerprint::Fingerprint;
