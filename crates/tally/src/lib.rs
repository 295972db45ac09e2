//! # Tally
//!
//! Command line front end for the Tally metrics engine.
//!
//! Loads a JSON events file, runs a single-entity or comparison query through
//! the engine controllers and renders the settled snapshot as JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod cli;
pub mod error;

pub use app::*;
pub use cli::*;
pub use error::*;
