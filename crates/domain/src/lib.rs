//! Shared types for the WebForge tool-execution runtime.
//!
//! Everything the coordinator and its collaborators agree on lives here:
//! the canonical tool-call descriptor, tool outcomes, status machines,
//! coordinator configuration, and the shared error type.

pub mod config;
pub mod error;
pub mod tool;

pub use error::{Error, Result};
