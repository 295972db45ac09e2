//! # Tally Common
//!
//! Event model, error types, logging setup and shared utilities for Tally.
//!
//! This crate provides the foundational types used across all other crates in
//! the Tally workspace. Events are read-only facts produced by an external
//! event store; nothing in this crate mutates them.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod logging;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use error::{Result, TallyError};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use types::*;
pub use utils::*;
