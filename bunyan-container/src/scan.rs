//! Class discovery.
//!
//! [`ComponentScanner`] lists class names under a module path and
//! [`ClassLoader`] turns a name into its descriptor. [`ClassCatalog`]
//! implements both over descriptors registered explicitly, through
//! [`Provider`]s, or collected from [`ComponentRegistration`]s submitted
//! anywhere in the program with `inventory::submit!`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::descriptor::ClassDescriptor;
use crate::error::{BunyanError, Result};
use crate::provider::{Provider, ProviderRegistry};

/// Lists the fully qualified class names under a module path.
pub trait ComponentScanner {
    /// `package` is a `::`-separated path; classes in nested modules are
    /// included. The empty path matches every class.
    fn scan(&self, package: &str) -> BTreeSet<String>;
}

/// Loads a class descriptor by fully qualified name.
pub trait ClassLoader {
    fn load_class(&self, name: &str) -> Option<Arc<ClassDescriptor>>;
}

/// A descriptor submitted with `inventory::submit!`.
///
/// ```
/// use std::sync::Arc;
/// use bunyan_container::prelude::*;
///
/// struct Clock;
///
/// fn clock_class() -> Arc<ClassDescriptor> {
///     ClassDescriptor::builder::<Clock>("time::Clock")
///         .component()
///         .constructor(ConstructorDescriptor::new(|_| Ok(Clock)))
///         .build()
/// }
///
/// bunyan_container::inventory::submit! {
///     ComponentRegistration::new(clock_class)
/// }
///
/// fn main() {
///     let catalog = ClassCatalog::from_inventory();
///     assert!(catalog.load_class("time::Clock").is_some());
/// }
/// ```
pub struct ComponentRegistration {
    describe: fn() -> Arc<ClassDescriptor>,
}

impl ComponentRegistration {
    pub const fn new(describe: fn() -> Arc<ClassDescriptor>) -> Self {
        Self { describe }
    }

    pub fn describe(&self) -> Arc<ClassDescriptor> {
        (self.describe)()
    }
}

inventory::collect!(ComponentRegistration);

/// An in-memory set of class descriptors, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ClassCatalog {
    classes: BTreeMap<String, Arc<ClassDescriptor>>,
}

impl ClassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every [`ComponentRegistration`] linked into the program.
    pub fn from_inventory() -> Self {
        let mut catalog = Self::new();
        for registration in inventory::iter::<ComponentRegistration> {
            catalog.register(registration.describe());
        }
        debug!(classes = catalog.len(), "Collected submitted class descriptors");
        catalog
    }

    /// Adds a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, class: Arc<ClassDescriptor>) {
        let name = class.name().to_string();
        if self.classes.insert(name.clone(), class).is_some() {
            warn!(class = %name, "Class descriptor replaced");
        } else {
            trace!(class = %name, "Class descriptor added");
        }
    }

    pub fn with(mut self, class: Arc<ClassDescriptor>) -> Self {
        self.register(class);
        self
    }

    pub fn add_provider(&mut self, provider: &dyn Provider) {
        debug!(provider = provider.name(), "Adding provider");
        provider.register(self);
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ProviderRegistry for ClassCatalog {
    fn register_class(&mut self, class: Arc<ClassDescriptor>) {
        self.register(class);
    }
}

impl ClassLoader for ClassCatalog {
    fn load_class(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(name).cloned()
    }
}

impl ComponentScanner for ClassCatalog {
    fn scan(&self, package: &str) -> BTreeSet<String> {
        if package.is_empty() {
            return self.classes.keys().cloned().collect();
        }
        let prefix = format!("{package}::");
        self.classes
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

/// Determines the class names to read, starting from a configuration class.
///
/// The ComponentScan marker lists the module paths to scan; without it, or
/// with an empty list, the configuration class's own module is scanned.
/// Classes named by the Import marker are added as well.
///
/// # Errors
/// [`BunyanError::ClassNotFound`] if the configuration class is unknown.
pub fn discover(
    configuration: &str,
    scanner: &dyn ComponentScanner,
    loader: &dyn ClassLoader,
) -> Result<BTreeSet<String>> {
    let config = loader
        .load_class(configuration)
        .ok_or_else(|| BunyanError::ClassNotFound {
            name: configuration.to_string(),
        })?;

    let packages: Vec<String> = match config.annotations().component_scan() {
        Some(packages) if !packages.is_empty() => packages.to_vec(),
        _ => vec![config.package().to_string()],
    };

    let mut names = BTreeSet::new();
    for package in &packages {
        let found = scanner.scan(package);
        debug!(package = %package, classes = found.len(), "Scanned package");
        names.extend(found);
    }

    for import in config.annotations().imports() {
        if names.insert(import.clone()) {
            debug!(class = %import, "Imported class");
        } else {
            warn!(class = %import, "Ignored import: class is already scanned");
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AppConfig;
    struct Repo;
    struct Clock;
    struct Elsewhere;

    fn catalog(config: Arc<ClassDescriptor>) -> ClassCatalog {
        ClassCatalog::new()
            .with(config)
            .with(ClassDescriptor::builder::<Repo>("shop::persistence::Repo").build())
            .with(ClassDescriptor::builder::<Clock>("time::Clock").build())
            .with(ClassDescriptor::builder::<Elsewhere>("shopping::Elsewhere").build())
    }

    #[test]
    fn scan_matches_nested_modules_only() {
        let catalog = catalog(ClassDescriptor::builder::<AppConfig>("shop::AppConfig").build());
        let names: Vec<_> = catalog.scan("shop").into_iter().collect();
        assert_eq!(names, ["shop::AppConfig", "shop::persistence::Repo"]);
        assert_eq!(catalog.scan("").len(), 4);
        assert!(catalog.scan("nothing").is_empty());
    }

    #[test]
    fn discover_defaults_to_configuration_module() {
        let catalog = catalog(
            ClassDescriptor::builder::<AppConfig>("shop::AppConfig")
                .configuration()
                .build(),
        );
        let names = discover("shop::AppConfig", &catalog, &catalog).unwrap();
        assert!(names.contains("shop::persistence::Repo"));
        assert!(!names.contains("time::Clock"));
    }

    #[test]
    fn discover_uses_component_scan_and_import() {
        let catalog = catalog(
            ClassDescriptor::builder::<AppConfig>("shop::AppConfig")
                .configuration()
                .component_scan(["shop", "shopping"])
                .import(["time::Clock", "shop::persistence::Repo"])
                .build(),
        );
        let names = discover("shop::AppConfig", &catalog, &catalog).unwrap();
        assert_eq!(names.len(), 4);
        assert!(names.contains("time::Clock"));
        assert!(names.contains("shopping::Elsewhere"));
    }

    #[test]
    fn discover_unknown_configuration() {
        let catalog = ClassCatalog::new();
        let err = discover("shop::Missing", &catalog, &catalog).unwrap_err();
        assert!(matches!(err, BunyanError::ClassNotFound { .. }));
    }

    #[test]
    fn register_replaces_same_name() {
        let mut catalog = ClassCatalog::new();
        catalog.register(ClassDescriptor::builder::<Repo>("shop::Repo").build());
        catalog.register(ClassDescriptor::builder::<Clock>("shop::Repo").build());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.load_class("shop::Repo").unwrap().key().is::<Clock>());
    }
}
