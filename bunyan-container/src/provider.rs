//! Provider trait: a module of related class descriptors.
//!
//! # Examples
//! ```
//! use bunyan_container::prelude::*;
//!
//! struct Repo;
//!
//! struct PersistenceProvider;
//!
//! impl Provider for PersistenceProvider {
//!     fn register(&self, registry: &mut dyn ProviderRegistry) {
//!         registry.register_class(
//!             ClassDescriptor::builder::<Repo>("shop::persistence::Repo")
//!                 .component()
//!                 .constructor(ConstructorDescriptor::new(|_| Ok(Repo)))
//!                 .build(),
//!         );
//!     }
//! }
//!
//! let mut catalog = ClassCatalog::new();
//! catalog.add_provider(&PersistenceProvider);
//! assert!(catalog.load_class("shop::persistence::Repo").is_some());
//! ```

use std::sync::Arc;

use crate::descriptor::ClassDescriptor;

/// A module that contributes class descriptors to a catalog.
///
/// Split descriptors by domain, one provider per module, instead of
/// describing every class in one place.
pub trait Provider: Send + Sync {
    /// Called once, when the provider is added to a catalog.
    fn register(&self, registry: &mut dyn ProviderRegistry);

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// What providers register into.
pub trait ProviderRegistry {
    fn register_class(&mut self, class: Arc<ClassDescriptor>);
}
