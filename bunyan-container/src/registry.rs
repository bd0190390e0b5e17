//! Definition registry: all bean definitions, keyed by name.
//!
//! Lookups come in four flavours:
//! - by name ([`DefinitionRegistry::find_definition`]);
//! - by name, checked against a type ([`DefinitionRegistry::find_typed_definition`]);
//! - every definition assignable to a type ([`DefinitionRegistry::find_definitions`]);
//! - the single definition for a type, settled by the primary marker when
//!   several match ([`DefinitionRegistry::find_definition_by_type`]).

use std::collections::HashMap;

use bunyan_support::rendering::suggest_similar;
use tracing::{debug, trace};

use crate::definition::BeanDefinition;
use crate::error::{
    BunyanError, DuplicateBeanError, NoUniquePrimaryError, NotFoundError, Result,
};
use crate::key::TypeKey;

/// Stores all bean definitions of one container.
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: HashMap<String, BeanDefinition>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition.
    ///
    /// # Errors
    /// [`BunyanError::DuplicateBeanName`] if the name is already taken.
    pub fn register(&mut self, definition: BeanDefinition) -> Result<()> {
        if let Some(existing) = self.definitions.get(definition.name()) {
            return Err(BunyanError::DuplicateBeanName(DuplicateBeanError {
                name: definition.name().to_string(),
                existing: existing.source(),
                incoming: definition.source(),
            }));
        }

        debug!(
            bean = definition.name(),
            class = definition.class().name(),
            order = definition.order(),
            primary = definition.is_primary(),
            "Registered bean definition"
        );
        self.definitions.insert(definition.name().to_string(), definition);
        Ok(())
    }

    pub fn find_definition(&self, name: &str) -> Option<&BeanDefinition> {
        self.definitions.get(name)
    }

    pub(crate) fn find_definition_mut(&mut self, name: &str) -> Option<&mut BeanDefinition> {
        self.definitions.get_mut(name)
    }

    /// Finds a definition by name and checks its declared class against `ty`.
    ///
    /// # Errors
    /// [`BunyanError::TypeMismatch`] if the bean exists but is not
    /// assignable to `ty`.
    pub fn find_typed_definition(&self, name: &str, ty: &TypeKey) -> Result<Option<&BeanDefinition>> {
        let Some(definition) = self.definitions.get(name) else {
            return Ok(None);
        };
        if !definition.class().is_assignable_to(ty) {
            return Err(BunyanError::TypeMismatch {
                name: name.to_string(),
                expected: ty.type_name().to_string(),
                actual: definition.class().name().to_string(),
            });
        }
        Ok(Some(definition))
    }

    /// Every definition whose declared class is assignable to `ty`, sorted
    /// by order then name.
    pub fn find_definitions(&self, ty: &TypeKey) -> Vec<&BeanDefinition> {
        let mut found: Vec<_> = self
            .definitions
            .values()
            .filter(|definition| definition.class().is_assignable_to(ty))
            .collect();
        found.sort_by(|a, b| a.cmp_order(b));
        found
    }

    /// The one definition for `ty`.
    ///
    /// With several candidates, the single primary one wins.
    ///
    /// # Errors
    /// [`BunyanError::NoUniquePrimary`] if several candidates match and
    /// not exactly one of them is primary.
    pub fn find_definition_by_type(&self, ty: &TypeKey) -> Result<Option<&BeanDefinition>> {
        let candidates = self.find_definitions(ty);
        match candidates.len() {
            0 => return Ok(None),
            1 => return Ok(candidates.into_iter().next()),
            _ => {}
        }

        let primaries: Vec<_> = candidates.iter().filter(|d| d.is_primary()).collect();
        if let [primary] = primaries.as_slice() {
            trace!(ty = %ty, bean = primary.name(), "Primary bean chosen");
            return Ok(Some(**primary));
        }

        Err(BunyanError::NoUniquePrimary(NoUniquePrimaryError {
            requested: ty.type_name().to_string(),
            primaries: primaries.len(),
            candidates: candidates.iter().map(|d| d.name().to_string()).collect(),
        }))
    }

    /// Builds a not-found error with "did you mean" suggestions.
    pub fn not_found(&self, name: &str, requested: String, required_by: Option<&str>) -> BunyanError {
        let names = self.names();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        BunyanError::NotFound(NotFoundError {
            requested,
            required_by: required_by.map(str::to_string),
            suggestions: suggest_similar(name, &names, 3),
        })
    }

    /// Names of the definitions selected by `filter`, sorted by order then
    /// name.
    pub fn sorted_names(&self, filter: impl Fn(&BeanDefinition) -> bool) -> Vec<String> {
        let mut selected: Vec<_> = self.definitions.values().filter(|d| filter(d)).collect();
        selected.sort_by(|a, b| a.cmp_order(b));
        selected.into_iter().map(|d| d.name().to_string()).collect()
    }

    /// All bean names, alphabetically.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.definitions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn definitions(&self) -> impl Iterator<Item = &BeanDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::definition::Origin;
    use crate::descriptor::{ClassDescriptor, ConstructorDescriptor};

    trait Clock: Send + Sync {}

    struct SystemClock;
    impl Clock for SystemClock {}

    struct FixedClock;
    impl Clock for FixedClock {}

    struct Repo;

    fn clock_definition<T: Clock + 'static>(name: &str, class: &str, build: fn() -> T) -> BeanDefinition {
        let class = ClassDescriptor::builder::<T>(class)
            .implements::<dyn Clock>(|c| c as Arc<dyn Clock>)
            .constructor(ConstructorDescriptor::new(move |_| Ok(build())))
            .build();
        let constructor = class.constructors()[0].clone();
        BeanDefinition::new(name, class, Origin::Constructor(constructor))
    }

    fn repo_definition() -> BeanDefinition {
        let class = ClassDescriptor::builder::<Repo>("shop::Repo")
            .constructor(ConstructorDescriptor::new(|_| Ok(Repo)))
            .build();
        let constructor = class.constructors()[0].clone();
        BeanDefinition::new("repo", class, Origin::Constructor(constructor))
    }

    fn two_clocks(primary_fixed: bool) -> DefinitionRegistry {
        let mut registry = DefinitionRegistry::new();
        registry
            .register(clock_definition("systemClock", "time::SystemClock", || SystemClock))
            .unwrap();
        registry
            .register(
                clock_definition("fixedClock", "time::FixedClock", || FixedClock)
                    .with_primary(primary_fixed),
            )
            .unwrap();
        registry
    }

    #[test]
    fn register_and_find() {
        let mut registry = DefinitionRegistry::new();
        registry.register(repo_definition()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.find_definition("repo").is_some());
        assert!(registry.find_definition("nope").is_none());
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = DefinitionRegistry::new();
        registry.register(repo_definition()).unwrap();
        match registry.register(repo_definition()) {
            Err(BunyanError::DuplicateBeanName(e)) => assert_eq!(e.name, "repo"),
            other => panic!("Expected DuplicateBeanName, got {other:?}"),
        }
    }

    #[test]
    fn typed_lookup_checks_class() {
        let mut registry = DefinitionRegistry::new();
        registry.register(repo_definition()).unwrap();

        assert!(registry.find_typed_definition("repo", &TypeKey::of::<Repo>()).unwrap().is_some());
        assert!(registry.find_typed_definition("nope", &TypeKey::of::<Repo>()).unwrap().is_none());
        let err = registry
            .find_typed_definition("repo", &TypeKey::of::<dyn Clock>())
            .unwrap_err();
        assert!(matches!(err, BunyanError::TypeMismatch { .. }));
    }

    #[test]
    fn single_candidate_by_type() {
        let mut registry = DefinitionRegistry::new();
        registry
            .register(clock_definition("systemClock", "time::SystemClock", || SystemClock))
            .unwrap();
        let found = registry.find_definition_by_type(&TypeKey::of::<dyn Clock>()).unwrap();
        assert_eq!(found.unwrap().name(), "systemClock");
    }

    #[test]
    fn primary_settles_ambiguity() {
        let registry = two_clocks(true);
        let found = registry.find_definition_by_type(&TypeKey::of::<dyn Clock>()).unwrap();
        assert_eq!(found.unwrap().name(), "fixedClock");
    }

    #[test]
    fn no_primary_is_an_error() {
        let registry = two_clocks(false);
        match registry.find_definition_by_type(&TypeKey::of::<dyn Clock>()) {
            Err(BunyanError::NoUniquePrimary(e)) => {
                assert_eq!(e.primaries, 0);
                assert_eq!(e.candidates, ["fixedClock", "systemClock"]);
            }
            other => panic!("Expected NoUniquePrimary, got {other:?}"),
        }
    }

    #[test]
    fn find_definitions_sorted() {
        let mut registry = two_clocks(false);
        registry.register(repo_definition()).unwrap();
        let names: Vec<_> = registry
            .find_definitions(&TypeKey::of::<dyn Clock>())
            .iter()
            .map(|d| d.name())
            .collect();
        assert_eq!(names, ["fixedClock", "systemClock"]);
        assert!(registry.find_definition_by_type(&TypeKey::of::<String>()).unwrap().is_none());
    }

    #[test]
    fn not_found_suggests_names() {
        let registry = two_clocks(false);
        match registry.not_found("systemClok", "systemClok".into(), Some("service")) {
            BunyanError::NotFound(e) => {
                assert_eq!(e.required_by.as_deref(), Some("service"));
                assert!(e.suggestions.contains(&"systemClock".to_string()));
            }
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }
}
