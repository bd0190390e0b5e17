//! # Bunyan: a bean container for Rust
//!
//! Describe your components once, then let the container create them in
//! dependency order, inject their fields, run their lifecycle callbacks and
//! wrap them in proxies where asked.
//!
//! See [`bunyan_container::container`] for a walkthrough.

pub use bunyan_container::*;
pub use bunyan_support::*;
