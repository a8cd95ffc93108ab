//! # warden-patterns
//!
//! Access pattern implementations for the WARDEN runtime.
//!
//! Every type here implements [`warden_core::traits::AccessPattern`] and is
//! attached to agents through `AgentDirectory::add_pattern`:
//!
//! - [`filesystem::FileSystemAccessPattern`]: fixed allow/deny over globs
//! - [`composite::CompositeAccessPattern`]: AND/OR over child patterns
//! - [`time::TimeBasedAccessPattern`]: hour/weekday window around a base pattern
//! - [`security::SecurityValidatedAccessPattern`]: file security checks first
//! - [`custom::CustomAccessPattern`]: host-supplied closures
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_patterns::filesystem::FileSystemAccessPattern;
//!
//! let src = FileSystemAccessPattern::new("src", "source tree", ["src/**"], true, 60)?;
//! directory.add_pattern(&AgentId::from("editor"), Arc::new(src))?;
//! ```

pub mod checks;
pub mod composite;
pub mod custom;
pub mod filesystem;
pub mod security;
pub mod time;

pub use composite::{CompositeAccessPattern, CompositeMode};
pub use custom::CustomAccessPattern;
pub use filesystem::FileSystemAccessPattern;
pub use security::SecurityValidatedAccessPattern;
pub use time::TimeBasedAccessPattern;
