//! Core bean container for Bunyan.
//!
//! Classes are described with [`descriptor::ClassDescriptor`] and collected
//! in a [`scan::ClassCatalog`]; [`Container::builder`] turns them into
//! created, injected and initialized beans.

pub mod args;
pub mod bean;
pub mod container;
pub mod definition;
pub mod descriptor;
pub mod error;
pub mod key;
pub mod marker;
pub mod processor;
pub mod properties;
pub mod provider;
pub mod proxy;
pub mod reader;
pub mod registry;
pub mod scan;
pub mod slot;

mod factory;
mod graph;
mod inject;

pub use container::{Container, prelude};
pub use error::{BunyanError, Result};
pub use inventory;
pub use key::TypeKey;
