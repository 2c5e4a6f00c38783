//! Quarry Core — shared error types and lifecycle primitives.
//!
//! This crate provides the foundational types used across all Quarry crates.
//! It has no internal Quarry dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`lifecycle`]: Observable lifecycle state shared by orchestrators

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod lifecycle;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use lifecycle::{LifecycleState, StateHandle};
