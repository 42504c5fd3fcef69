//! Shared test utilities for the image server load test.
//!
//! This crate provides common testing infrastructure including:
//! - Temporary fixture corpora laid out as `<root>/<category>/<file>`
//! - An in-process stub of the image server with configurable responses
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{image_corpus, StubBehavior, StubTarget};
//! ```

pub mod fixtures;
pub mod stub;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use stub::*;
