//! dr-core: shared types, errors, configuration, sandboxing and events.
//!
//! This crate is the foundational dependency for all other dr-* crates,
//! providing the error taxonomy, typed identifiers, the path sandbox that
//! guards every filesystem-facing boundary, media and manifest types, the
//! application configuration and a broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod manifest;
pub mod media;
pub mod sandbox;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use manifest::{Ladder, ManifestRef, Variant};
pub use media::{MediaKind, MediaSource};
