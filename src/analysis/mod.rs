//! Analysis modules.
//!
//! Aggregation of evaluation records into dashboard statistics.

pub mod aggregator;

pub use aggregator::*;
