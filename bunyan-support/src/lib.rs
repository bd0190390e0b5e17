//! # Bunyan Support
//!
//! Shared helpers for the Bunyan bean container:
//! - bean-name derivation
//! - rendering of creation chains and lookup hints in error messages

pub mod rendering;
