//! # Tally Metrics
//!
//! Windowed event aggregation and multi-entity comparison for Tally.
//!
//! This crate turns raw interaction events into per-entity metrics (totals,
//! a zero-filled daily series and the most recent events) and drives them
//! through two controllers: one for a single entity and one comparing a
//! bounded selection of entities on a shared date axis.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregator;
pub mod bucketing;
pub mod clock;
pub mod comparison;
pub mod manager;
pub mod merge;
pub mod repository;
pub mod selection;
pub mod single;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aggregator::*;
pub use bucketing::*;
pub use clock::*;
pub use comparison::*;
pub use manager::*;
pub use merge::*;
pub use repository::*;
pub use selection::*;
pub use single::*;
