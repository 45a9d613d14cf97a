//! Shared types for the geo-ads desktop supervisor
//!
//! Contains the component identity used to tag log output, the logging
//! helpers every crate in the workspace goes through, and common errors.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
