//! Core shared types for the PDE workspace: versions and match rules, Idvers, portable entry
//! paths and the target environment tuple.
//!
//! This crate is intentionally small; everything else builds on it.

pub mod fs;
mod id;
mod env;
mod path;
pub mod text;
pub mod version;

pub use env::TargetEnvironment;
pub use id::IdVersion;
pub use path::EntryPath;
pub use text::{TextRange, TextSize};
pub use version::{matches, MatchRule, Version, VersionParseError};

/// Id of the OSGi framework bundle; it never receives implicit dependencies.
pub const SYSTEM_BUNDLE_ID: &str = "org.eclipse.osgi";
