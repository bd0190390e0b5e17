//! Creation engine.
//!
//! [`BeanFactory`] owns the registry while a container is being built and
//! turns every definition into an instance:
//!
//! 1. configuration beans, sorted by order then name;
//! 2. post-processor beans, which form the processor list;
//! 3. every remaining bean without an instance.
//!
//! Creating a bean first creates the beans its creation parameters
//! autowire, depth-first. The [`CreationGuard`] turns a repeated request on
//! that path into a cycle error. Injection and init callbacks run once all
//! instances exist (see the `inject` module).

use std::sync::Arc;

use tracing::{debug, info, instrument, trace};

use crate::args::{Arg, Args};
use crate::bean::BeanRef;
use crate::definition::{BeanDefinition, Origin};
use crate::descriptor::ClassDescriptor;
use crate::error::{BunyanError, RestrictedBean, Result};
use crate::graph::CreationGuard;
use crate::key::TypeKey;
use crate::marker::{AutowiredMarker, Injection, InjectionMarkers};
use crate::processor::{BeanPostProcessor, BeanResolver, as_post_processor};
use crate::properties::PropertyResolver;
use crate::registry::DefinitionRegistry;

/// When an injection site is resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Phase {
    /// Creation parameters; dependencies without an instance are created.
    /// Restricted beans may not autowire.
    Creation(Option<RestrictedBean>),
    /// Fields and setters; every instance already exists.
    Injection,
}

pub(crate) struct BeanFactory {
    pub(crate) registry: DefinitionRegistry,
    pub(crate) properties: PropertyResolver,
    pub(crate) processors: Vec<Arc<dyn BeanPostProcessor>>,
    guard: CreationGuard,
}

impl BeanFactory {
    pub fn new(registry: DefinitionRegistry, properties: PropertyResolver) -> Self {
        Self {
            registry,
            properties,
            processors: Vec::new(),
            guard: CreationGuard::new(),
        }
    }

    pub fn into_parts(
        self,
    ) -> (DefinitionRegistry, Vec<Arc<dyn BeanPostProcessor>>, PropertyResolver) {
        (self.registry, self.processors, self.properties)
    }

    /// Creates, injects and initializes every bean.
    #[instrument(skip(self), name = "bean_refresh", fields(definitions = self.registry.len()))]
    pub fn refresh(&mut self) -> Result<()> {
        for name in self.registry.sorted_names(BeanDefinition::is_configuration) {
            self.create_early_singleton(&name)?;
        }

        for name in self
            .registry
            .sorted_names(|d| d.is_post_processor() && !d.is_configuration())
        {
            let bean = self.create_early_singleton(&name)?;
            let processor = as_post_processor(&bean).ok_or_else(|| BunyanError::TypeMismatch {
                name: name.clone(),
                expected: "dyn BeanPostProcessor".to_string(),
                actual: bean.class().name().to_string(),
            })?;
            info!(processor = %name, "Registered post-processor");
            self.processors.push(processor);
        }

        for name in self.registry.sorted_names(|d| d.instance().is_none()) {
            self.create_early_singleton(&name)?;
        }
        debug!(beans = self.registry.len(), "All beans created");

        let all = self.registry.sorted_names(|_| true);
        for name in &all {
            self.inject_bean(name)?;
        }
        for name in &all {
            self.init_bean(name)?;
        }

        Ok(())
    }

    /// Returns the bean's instance, creating it first if needed.
    ///
    /// # Errors
    /// [`BunyanError::CircularDependency`] if the bean is already being
    /// created further up the current path.
    pub fn create_early_singleton(&mut self, name: &str) -> Result<BeanRef> {
        let definition = self.definition(name)?;
        if let Some(instance) = definition.instance() {
            trace!(bean = name, "Instance already created");
            return Ok(instance.clone());
        }

        let entry = definition.chain_entry();
        let class = definition.class().clone();
        let origin = definition.origin().clone();
        let restriction = if definition.is_configuration() {
            Some(RestrictedBean::Configuration)
        } else if definition.is_post_processor() {
            Some(RestrictedBean::PostProcessor)
        } else {
            None
        };

        self.guard.enter(entry)?;
        let created = self.instantiate(name, &class, &origin, restriction);
        self.guard.exit(name);
        created
    }

    fn instantiate(
        &mut self,
        name: &str,
        class: &Arc<ClassDescriptor>,
        origin: &Origin,
        restriction: Option<RestrictedBean>,
    ) -> Result<BeanRef> {
        let mut resolved = Vec::with_capacity(origin.params().len());
        for (index, param) in origin.params().iter().enumerate() {
            let site = format!("parameter {index} ({})", param.ty.short_name());
            resolved.push(self.resolve_argument(
                name,
                &site,
                param.ty,
                &param.markers,
                Phase::Creation(restriction),
            )?);
        }
        let mut args = Args::new(resolved);

        let instance = match origin {
            Origin::Constructor(constructor) => constructor
                .construct(&mut args)
                .map_err(|err| with_bean_context(name, err))?,
            Origin::FactoryMethod {
                factory_bean,
                method,
            } => {
                let factory = self.create_early_singleton(factory_bean)?;
                let target = restore(&self.processors, factory_bean, factory);
                method
                    .invoke(target.object(), &mut args)
                    .map_err(|err| with_bean_context(name, err))?
                    .ok_or_else(|| {
                        BunyanError::construction(name, "factory method produced no value")
                    })?
            }
        };

        let instance = BeanRef::new(instance, class.clone());
        self.definition_mut(name)?.set_instance(instance.clone())?;
        debug!(bean = name, class = class.name(), "Created bean");

        self.apply_before_initialization(name, instance)
    }

    fn apply_before_initialization(&mut self, name: &str, mut current: BeanRef) -> Result<BeanRef> {
        let processors = self.processors.clone();
        for processor in processors {
            let processed =
                processor.post_process_before_initialization(current.clone(), name, &mut *self)?;
            if !processed.same(&current) {
                debug!(
                    bean = name,
                    replacement = processed.class().name(),
                    "Bean replaced before initialization"
                );
                self.definition_mut(name)?.set_instance(processed.clone())?;
                current = processed;
            }
        }
        Ok(current)
    }

    /// Resolves one injection site to an argument.
    pub(crate) fn resolve_argument(
        &mut self,
        bean: &str,
        site: &str,
        ty: TypeKey,
        markers: &InjectionMarkers,
        phase: Phase,
    ) -> Result<Arg> {
        match markers.injection() {
            Injection::Conflict => Err(BunyanError::MarkerConflict {
                bean: bean.to_string(),
                site: site.to_string(),
            }),
            Injection::Unmarked => Err(BunyanError::MissingMarker {
                bean: bean.to_string(),
                site: site.to_string(),
            }),
            Injection::Value(marker) => {
                let value = self.properties.get_required_typed(&marker.expression, &ty)?;
                trace!(bean, site, expression = %marker.expression, "Resolved value");
                Ok(Arg::Value(value))
            }
            Injection::Autowired(marker) => {
                if let Phase::Creation(Some(restriction)) = phase {
                    return Err(BunyanError::ForbiddenAutowired {
                        bean: bean.to_string(),
                        site: site.to_string(),
                        restriction,
                    });
                }
                self.resolve_dependency(bean, ty, marker, phase)
            }
        }
    }

    fn resolve_dependency(
        &mut self,
        bean: &str,
        ty: TypeKey,
        marker: &AutowiredMarker,
        phase: Phase,
    ) -> Result<Arg> {
        let found = match &marker.name {
            Some(name) => self.registry.find_typed_definition(name, &ty)?,
            None => self.registry.find_definition_by_type(&ty)?,
        }
        .map(|d| (d.name().to_string(), d.instance().cloned()));

        let Some((dependency, instance)) = found else {
            if !marker.required {
                trace!(bean, ty = %ty, "Optional dependency not defined");
                return Ok(Arg::Absent);
            }
            let (hint, requested) = match &marker.name {
                Some(name) => (name.clone(), format!("'{name}' of type {}", ty.short_name())),
                None => (ty.short_name(), ty.type_name().to_string()),
            };
            return Err(self.registry.not_found(&hint, requested, Some(bean)));
        };

        let instance = match (instance, phase) {
            (Some(instance), _) => instance,
            (None, Phase::Creation(None)) => self.create_early_singleton(&dependency)?,
            (None, _) => return Err(BunyanError::BeanNotInitialized { name: dependency }),
        };
        // a substitute viewable only as its base class hands out the original
        let instance = if instance.can_cast(&ty) {
            instance
        } else {
            restore(&self.processors, &dependency, instance)
        };

        trace!(bean, dependency = %dependency, "Resolved dependency");
        Ok(Arg::Bean(instance))
    }

    pub(crate) fn definition(&self, name: &str) -> Result<&BeanDefinition> {
        self.registry
            .find_definition(name)
            .ok_or_else(|| self.registry.not_found(name, format!("'{name}'"), None))
    }

    pub(crate) fn definition_mut(&mut self, name: &str) -> Result<&mut BeanDefinition> {
        if self.registry.find_definition(name).is_none() {
            return Err(self.registry.not_found(name, format!("'{name}'"), None));
        }
        self.registry
            .find_definition_mut(name)
            .ok_or_else(|| BunyanError::BeanNotInitialized {
                name: name.to_string(),
            })
    }
}

impl BeanResolver for BeanFactory {
    fn resolve_bean(&mut self, name: &str) -> Result<BeanRef> {
        self.create_early_singleton(name)
    }
}

/// The object injection and callbacks must target: processors in reverse
/// order may hand back the original behind a substitute.
pub(crate) fn restore(
    processors: &[Arc<dyn BeanPostProcessor>],
    name: &str,
    bean: BeanRef,
) -> BeanRef {
    processors.iter().rev().fold(bean, |current, processor| {
        let restored = processor.post_process_on_set_property(current.clone(), name);
        if !restored.same(&current) {
            trace!(bean = name, original = restored.class().name(), "Restored original instance");
        }
        restored
    })
}

/// Names the bean in errors raised while invoking its members.
pub(crate) fn with_bean_context(bean: &str, err: BunyanError) -> BunyanError {
    match err {
        BunyanError::ArgumentMismatch { .. } | BunyanError::TargetMismatch { .. } => {
            BunyanError::construction(bean, err)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::descriptor::{ConstructorDescriptor, ParamDescriptor};
    use crate::reader::DefinitionReader;
    use crate::scan::{ClassCatalog, ComponentScanner};

    struct Repo;

    struct Service {
        repo: Arc<Repo>,
    }

    fn factory() -> BeanFactory {
        let catalog = ClassCatalog::new()
            .with(
                ClassDescriptor::builder::<Repo>("app::Repo")
                    .component()
                    .constructor(ConstructorDescriptor::new(|_| Ok(Repo)))
                    .build(),
            )
            .with(
                ClassDescriptor::builder::<Service>("app::Service")
                    .component()
                    .constructor(
                        ConstructorDescriptor::new(|args| Ok(Service { repo: args.bean(0)? }))
                            .param(ParamDescriptor::autowired::<Repo>()),
                    )
                    .build(),
            );
        let names: BTreeSet<String> = catalog.scan("");
        let registry = DefinitionReader::new(&catalog).read(&names).unwrap();
        BeanFactory::new(registry, PropertyResolver::new())
    }

    #[test]
    fn dependencies_are_created_first() {
        let mut factory = factory();
        let service = factory.create_early_singleton("service").unwrap();

        let repo = factory.definition("repo").unwrap().instance().cloned().unwrap();
        let service = service.cast::<Service>().unwrap();
        assert!(Arc::ptr_eq(&service.repo, &repo.cast::<Repo>().unwrap()));
        assert_eq!(factory.guard.depth(), 0);
    }

    #[test]
    fn second_request_returns_same_instance() {
        let mut factory = factory();
        let first = factory.create_early_singleton("repo").unwrap();
        let second = factory.create_early_singleton("repo").unwrap();
        assert!(first.same(&second));
    }

    #[test]
    fn injection_phase_does_not_create() {
        let mut factory = factory();
        let param = ParamDescriptor::autowired::<Repo>();

        match factory.resolve_argument("service", "field repo", param.ty, &param.markers, Phase::Injection) {
            Err(BunyanError::BeanNotInitialized { name }) => assert_eq!(name, "repo"),
            Err(other) => panic!("Expected BeanNotInitialized, got: {other:?}"),
            Ok(_) => panic!("Expected BeanNotInitialized, got a resolved argument"),
        }
    }

    #[test]
    fn restricted_bean_cannot_autowire() {
        let mut factory = factory();
        let param = ParamDescriptor::autowired::<Repo>();
        let phase = Phase::Creation(Some(RestrictedBean::Configuration));

        match factory.resolve_argument("config", "parameter 0", param.ty, &param.markers, phase) {
            Err(BunyanError::ForbiddenAutowired { bean, .. }) => assert_eq!(bean, "config"),
            Err(other) => panic!("Expected ForbiddenAutowired, got: {other:?}"),
            Ok(_) => panic!("Expected ForbiddenAutowired, got a resolved argument"),
        }
    }

    #[test]
    fn unknown_bean() {
        let mut factory = factory();
        match factory.create_early_singleton("missing") {
            Err(BunyanError::NotFound(err)) => assert_eq!(err.requested, "'missing'"),
            other => panic!("Expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn restore_without_processors_is_identity() {
        let mut factory = factory();
        let repo = factory.create_early_singleton("repo").unwrap();
        assert!(restore(&[], "repo", repo.clone()).same(&repo));
    }
}
