//! # Docket Testkit
//!
//! Test utilities for Docket.
//!
//! This crate provides:
//! - Test fixtures: temporary databases on a manual clock
//! - Property-based test generators using proptest
//! - A model-based harness checking tables against an in-memory model
//!
//! ## Usage
//!
//! ```rust
//! use docket_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     let products = scenarios::products(db);
//!     assert!(products.is_empty());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
