//! # MİDA Common
//!
//! Shared types, errors, and constants used across MİDA components.
//!
//! ## Modules
//! - `types` - Session documents, attempts, plans, and pagination
//! - `error` - Common error types
//! - `constants` - Timing rules, charsets, and store key layout

pub mod constants;
pub mod error;
pub mod types;

pub use error::MidaError;
pub use types::*;
