//! Core types, ports, and the provider registry for the repository
//! documentation evaluation and remediation engine.
//!
//! This crate has no dependency on any other crate in the workspace: every
//! other layer depends on it, never the reverse.

pub mod entities;
pub mod error;
pub mod events;
pub mod macros;
pub mod ports;
pub mod registry;
pub mod value_objects;

pub use error::{Error, ErrorCategory, Result};
