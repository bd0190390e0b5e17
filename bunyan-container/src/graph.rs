//! Creation-path tracking.
//!
//! Beans are created depth-first: creating a bean first creates the beans
//! its creation parameters depend on. [`CreationGuard`] records the path of
//! beans currently being created, so that a bean requested again before
//! its own creation finished is reported as a cycle instead of recursing
//! forever.

use std::collections::HashSet;

use bunyan_support::rendering::{ChainEntry, render_chain};
use tracing::{trace, warn};

use crate::error::{BunyanError, CircularDependencyError, Result};

#[derive(Debug, Default)]
pub(crate) struct CreationGuard {
    /// Names currently being created
    creating: HashSet<String>,
    /// Current creation path, for error reporting
    path: Vec<ChainEntry>,
}

impl CreationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `entry` as being created.
    ///
    /// # Errors
    /// [`BunyanError::CircularDependency`] if it is already being created;
    /// the chain runs from its first occurrence back to itself.
    pub fn enter(&mut self, entry: ChainEntry) -> Result<()> {
        if self.creating.contains(&entry.label) {
            let cycle_start = self
                .path
                .iter()
                .position(|e| e.label == entry.label)
                .unwrap_or(0);

            let mut chain = self.path[cycle_start..].to_vec();
            chain.push(entry);

            let names: Vec<&str> = chain.iter().map(|e| e.label.as_str()).collect();
            warn!(cycle = %render_chain(&names), "Circular dependency detected!");

            return Err(BunyanError::CircularDependency(CircularDependencyError { chain }));
        }

        trace!(bean = %entry.label, depth = self.path.len(), "Creating");
        self.creating.insert(entry.label.clone());
        self.path.push(entry);
        Ok(())
    }

    /// Marks `name` as created.
    pub fn exit(&mut self, name: &str) {
        self.creating.remove(name);
        if let Some(position) = self.path.iter().rposition(|e| e.label == name) {
            self.path.truncate(position);
        }
    }

    #[cfg(test)]
    pub fn is_creating(&self, name: &str) -> bool {
        self.creating.contains(name)
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}
