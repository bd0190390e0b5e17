//! # The Container
//!
//! Discovers component classes, builds their definitions, and creates,
//! injects and initializes every bean before handing out a finished,
//! immutable [`Container`].
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──discover──> class names ──DefinitionReader──> registry
//!                                                                      │
//!                                                      BeanFactory::refresh()
//!                                                                      │
//!                                                                      ▼
//!                                                                 Container
//! ```
//!
//! # Examples
//! ```rust
//! use bunyan_container::prelude::*;
//! use std::sync::Arc;
//!
//! struct Repo;
//! struct Service {
//!     repo: Arc<Repo>,
//!     greeting: String,
//! }
//!
//! let container = Container::builder()
//!     .register_class(
//!         ClassDescriptor::builder::<Repo>("app::Repo")
//!             .component()
//!             .constructor(ConstructorDescriptor::new(|_| Ok(Repo)))
//!             .build(),
//!     )
//!     .register_class(
//!         ClassDescriptor::builder::<Service>("app::Service")
//!             .component()
//!             .constructor(
//!                 ConstructorDescriptor::new(|args| {
//!                     Ok(Service { repo: args.bean(0)?, greeting: args.value(1)? })
//!                 })
//!                 .param(ParamDescriptor::autowired::<Repo>())
//!                 .param(ParamDescriptor::value::<String>("${greeting:hello}")),
//!             )
//!             .build(),
//!     )
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service: Arc<Service> = container.get_bean("service").expect("Failed to get bean");
//! assert_eq!(service.greeting, "hello");
//! assert!(Arc::ptr_eq(&service.repo, &container.get_bean_by_type::<Repo>().unwrap()));
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, trace};

use crate::bean::BeanRef;
use crate::definition::BeanDefinition;
use crate::descriptor::ClassDescriptor;
use crate::error::{BunyanError, Result};
use crate::factory::{BeanFactory, restore};
use crate::inject::invoke_callback;
use crate::key::TypeKey;
use crate::processor::BeanPostProcessor;
use crate::properties::PropertyResolver;
use crate::provider::Provider;
use crate::reader::DefinitionReader;
use crate::registry::DefinitionRegistry;
use crate::scan::{ClassCatalog, ComponentScanner, discover};

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Collects classes and properties, then builds a [`Container`].
///
/// Without a configuration class every class in the catalog is read. With
/// one, only the modules its ComponentScan marker names (its own module by
/// default) plus its imports are.
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    catalog: ClassCatalog,
    properties: Option<PropertyResolver>,
    configuration: Option<String>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Replaces the class catalog, e.g. with [`ClassCatalog::from_inventory`].
    pub fn catalog(mut self, catalog: ClassCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Add a [`Provider`] module.
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        self.catalog.add_provider(provider);
        self
    }

    pub fn register_class(mut self, class: Arc<ClassDescriptor>) -> Self {
        self.catalog.register(class);
        self
    }

    pub fn properties(mut self, properties: PropertyResolver) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Starts discovery from the configuration class `name`.
    pub fn configuration(mut self, name: impl Into<String>) -> Self {
        self.configuration = Some(name.into());
        self
    }

    /// Reads definitions and creates every bean.
    ///
    /// # Errors
    /// The first definition, resolution, marker, cycle, property or
    /// invocation error. No partially built container is returned.
    #[instrument(skip(self), name = "container_build", fields(classes = self.catalog.len()))]
    pub fn build(self) -> Result<Container> {
        info!(configuration = ?self.configuration, "Building container");

        let names = match &self.configuration {
            Some(configuration) => discover(configuration, &self.catalog, &self.catalog)?,
            None => self.catalog.scan(""),
        };
        debug!(classes = names.len(), "Discovered classes");

        let registry = DefinitionReader::new(&self.catalog).read(&names)?;
        info!(definitions = registry.len(), "Read bean definitions");

        let properties = self.properties.unwrap_or_default();
        let mut factory = BeanFactory::new(registry, properties);
        factory.refresh()?;
        let (registry, processors, properties) = factory.into_parts();

        info!(beans = registry.len(), "Container built successfully ✓");
        Ok(Container {
            registry,
            processors,
            properties,
        })
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// A fully built bean container.
///
/// Every bean exists, has been injected and initialized. Lookups never
/// create anything.
pub struct Container {
    registry: DefinitionRegistry,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
    properties: PropertyResolver,
}

impl Container {
    /// Create a new [`ContainerBuilder`].
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn contains_bean(&self, name: &str) -> bool {
        self.registry.find_definition(name).is_some()
    }

    pub fn find_definition(&self, name: &str) -> Option<&BeanDefinition> {
        self.registry.find_definition(name)
    }

    /// # Errors
    /// [`BunyanError::TypeMismatch`] if `name` exists but is not a `ty`.
    pub fn find_typed_definition(&self, name: &str, ty: &TypeKey) -> Result<Option<&BeanDefinition>> {
        self.registry.find_typed_definition(name, ty)
    }

    /// # Errors
    /// [`BunyanError::NoUniquePrimary`] if several beans match and primary
    /// markers do not settle it.
    pub fn find_definition_by_type(&self, ty: &TypeKey) -> Result<Option<&BeanDefinition>> {
        self.registry.find_definition_by_type(ty)
    }

    pub fn find_definitions(&self, ty: &TypeKey) -> Vec<&BeanDefinition> {
        self.registry.find_definitions(ty)
    }

    /// The bean named `name`, type-erased.
    pub fn bean_ref(&self, name: &str) -> Result<&BeanRef> {
        let definition = self
            .registry
            .find_definition(name)
            .ok_or_else(|| self.registry.not_found(name, format!("'{name}'"), None))?;
        definition.required_instance()
    }

    /// The bean named `name` as a `T`, which may be its own type, one of
    /// the traits it implements, or the class a substitute stands in for.
    ///
    /// # Errors
    /// [`BunyanError::NotFound`] for an unknown name;
    /// [`BunyanError::TypeMismatch`] if the bean is not a `T`.
    pub fn get_bean<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>> {
        trace!(bean = name, ty = type_name::<T>(), "Getting bean");
        let key = TypeKey::of::<T>();
        let definition = self
            .registry
            .find_typed_definition(name, &key)?
            .ok_or_else(|| {
                self.registry
                    .not_found(name, format!("'{name}' of type {}", key.short_name()), None)
            })?;
        cast(definition, &self.processors)
    }

    /// The single bean of type `T`, or the primary one among several.
    pub fn get_bean_by_type<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        trace!(ty = %key, "Getting bean by type");
        let definition = self
            .registry
            .find_definition_by_type(&key)?
            .ok_or_else(|| self.registry.not_found(&key.short_name(), key.type_name().to_string(), None))?;
        cast(definition, &self.processors)
    }

    /// Every bean of type `T`, sorted by order then name.
    pub fn get_beans<T: ?Sized + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.registry
            .find_definitions(&TypeKey::of::<T>())
            .into_iter()
            .map(|definition| cast::<T>(definition, &self.processors))
            .collect()
    }

    pub fn properties(&self) -> &PropertyResolver {
        &self.properties
    }

    /// Bean names in alphabetical order.
    pub fn bean_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Runs destroy callbacks, last bean first.
    ///
    /// # Errors
    /// The first failing callback; later ones do not run.
    #[instrument(skip(self), name = "container_close", fields(beans = self.registry.len()))]
    pub fn close(self) -> Result<()> {
        let mut names = self.registry.sorted_names(|d| d.destroy().is_some());
        names.reverse();

        for name in &names {
            let Some(definition) = self.registry.find_definition(name) else {
                continue;
            };
            let (Some(callback), Some(instance)) = (definition.destroy(), definition.instance())
            else {
                continue;
            };
            let target = restore(&self.processors, name, instance.clone());
            invoke_callback(name, &target, callback)?;
        }

        info!(destroyed = names.len(), "Container closed ✓");
        Ok(())
    }
}

/// Views the bean as `T`, falling back to the original behind a
/// substitute when `T` is a base class the substitute only extends.
fn cast<T: ?Sized + 'static>(
    definition: &BeanDefinition,
    processors: &[Arc<dyn BeanPostProcessor>],
) -> Result<Arc<T>> {
    let bean = definition.required_instance()?;
    let viewed = bean
        .cast::<T>()
        .or_else(|| restore(processors, definition.name(), bean.clone()).cast::<T>());
    viewed.ok_or_else(|| BunyanError::TypeMismatch {
        name: definition.name().to_string(),
        expected: type_name::<T>().to_string(),
        actual: bean.class().name().to_string(),
    })
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("beans", &self.registry.len())
            .field("processors", &self.processors.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::args::Args;
    pub use crate::bean::{BeanRef, Instance};
    pub use crate::definition::{BeanDefinition, Callback, Origin};
    pub use crate::descriptor::{
        ClassBuilder, ClassDescriptor, ClassKind, ConstructorDescriptor, FieldDescriptor, MethodDescriptor,
        Modifiers, ParamDescriptor, ReturnType, Visibility,
    };
    pub use crate::error::{BunyanError, ErrorKind, Result};
    pub use crate::key::TypeKey;
    pub use crate::marker::{
        Annotation, AutowiredMarker, BeanMarker, ComponentMarker, ConfigurationMarker, Stereotype,
        ValueMarker,
    };
    pub use crate::processor::{BeanPostProcessor, BeanResolver};
    pub use crate::properties::PropertyResolver;
    pub use crate::provider::{Provider, ProviderRegistry};
    pub use crate::proxy::{AroundProxyPostProcessor, Interceptor, Proxy, ProxyFactory, ProxyRegistry};
    pub use crate::scan::{ClassCatalog, ClassLoader, ComponentRegistration, ComponentScanner};
    pub use crate::slot::{Configured, Wired};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ConstructorDescriptor, ParamDescriptor};

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed;
    impl Clock for Fixed {
        fn now(&self) -> u64 {
            42
        }
    }

    struct Stamp {
        at: u64,
    }

    fn fixed() -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<Fixed>("app::Fixed")
            .component()
            .implements::<dyn Clock>(|c| c as Arc<dyn Clock>)
            .constructor(ConstructorDescriptor::new(|_| Ok(Fixed)))
            .build()
    }

    fn stamp() -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<Stamp>("app::Stamp")
            .component()
            .constructor(
                ConstructorDescriptor::new(|args| {
                    let clock = args.bean::<dyn Clock>(0)?;
                    Ok(Stamp { at: clock.now() })
                })
                .param(ParamDescriptor::autowired::<dyn Clock>()),
            )
            .build()
    }

    #[test]
    fn empty_container() {
        let container = Container::builder().build().unwrap();
        assert!(container.is_empty());
        assert!(!container.contains_bean("anything"));
    }

    #[test]
    fn get_by_name_and_trait() {
        let container = Container::builder()
            .register_class(fixed())
            .register_class(stamp())
            .build()
            .unwrap();

        assert_eq!(container.bean_names(), ["fixed", "stamp"]);
        assert_eq!(container.get_bean::<Stamp>("stamp").unwrap().at, 42);
        assert_eq!(container.get_bean::<dyn Clock>("fixed").unwrap().now(), 42);
        assert_eq!(container.get_bean_by_type::<dyn Clock>().unwrap().now(), 42);
        assert_eq!(container.get_beans::<dyn Clock>().unwrap().len(), 1);
    }

    #[test]
    fn get_bean_with_wrong_type() {
        let container = Container::builder().register_class(fixed()).build().unwrap();
        match container.get_bean::<Stamp>("fixed") {
            Err(BunyanError::TypeMismatch { name, .. }) => assert_eq!(name, "fixed"),
            other => panic!("Expected TypeMismatch, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn get_unknown_bean_suggests() {
        let container = Container::builder().register_class(fixed()).build().unwrap();
        match container.get_bean::<Fixed>("fixd") {
            Err(BunyanError::NotFound(err)) => assert!(err.suggestions.contains(&"fixed".to_string())),
            other => panic!("Expected NotFound, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_dependency_names_dependent() {
        let result = Container::builder().register_class(stamp()).build();
        match result {
            Err(BunyanError::NotFound(err)) => {
                assert_eq!(err.required_by.as_deref(), Some("stamp"));
            }
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn debug_display() {
        let container = Container::builder().register_class(fixed()).build().unwrap();
        let debug = format!("{container:?}");
        assert!(debug.contains("Container"));
        assert!(debug.contains("beans: 1"));
    }
}
