//! # Tally Config
//!
//! Type-safe configuration management for Tally.
//!
//! This crate provides configuration loading from YAML or TOML files,
//! environment variable overrides and validation of the engine settings.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validator;

pub use defaults::*;
pub use loader::*;
pub use schema::*;
pub use validator::*;
