//! Benchmark utilities shared by the Docket benches.

#![warn(missing_docs)]

pub mod utils;
