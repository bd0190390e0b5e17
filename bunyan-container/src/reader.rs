//! Turns class names into bean definitions.
//!
//! Every loaded class that carries a component marker, directly or through a
//! stereotype, becomes one definition. A configuration class additionally
//! contributes one factory-method definition per method with a Bean marker.

use std::collections::BTreeSet;
use std::sync::Arc;

use bunyan_support::rendering::decapitalize;
use tracing::{debug, instrument, trace};

use crate::definition::{BeanDefinition, Callback, DEFAULT_ORDER, Origin};
use crate::descriptor::{
    ClassDescriptor, ClassKind, ConstructorDescriptor, MethodDescriptor, ReturnType, Visibility,
};
use crate::error::{BunyanError, ComponentViolation, FactoryMethodViolation, Result};
use crate::processor::is_post_processor;
use crate::registry::DefinitionRegistry;
use crate::scan::ClassLoader;

/// Reads class descriptors into a [`DefinitionRegistry`].
pub struct DefinitionReader<'a> {
    loader: &'a dyn ClassLoader,
}

impl<'a> DefinitionReader<'a> {
    pub fn new(loader: &'a dyn ClassLoader) -> Self {
        Self { loader }
    }

    /// # Errors
    /// The first definition error found, e.g. [`BunyanError::ClassNotFound`]
    /// or [`BunyanError::DuplicateBeanName`].
    #[instrument(skip_all, name = "read_definitions", fields(classes = names.len()))]
    pub fn read(&self, names: &BTreeSet<String>) -> Result<DefinitionRegistry> {
        let mut registry = DefinitionRegistry::new();

        for name in names {
            let class = self
                .loader
                .load_class(name)
                .ok_or_else(|| BunyanError::ClassNotFound { name: name.clone() })?;

            if class.kind() != ClassKind::Class {
                trace!(class = %name, kind = ?class.kind(), "Skipped non-class type");
                continue;
            }
            let Some(component) = class.annotations().find_component(class.name())? else {
                trace!(class = %name, "Skipped class without component marker");
                continue;
            };

            check_component(&class)?;
            let bean_name = component
                .name
                .filter(|explicit| !explicit.is_empty())
                .unwrap_or_else(|| decapitalize(&class.simple_name()));

            let definition = BeanDefinition::new(
                bean_name.clone(),
                class.clone(),
                Origin::Constructor(select_constructor(&class)?),
            )
            .with_order(class.annotations().order().unwrap_or(DEFAULT_ORDER))
            .with_primary(class.annotations().is_primary())
            .with_init(find_callback(&class, "PostConstruct", |m| m.markers().post_construct)?)
            .with_destroy(find_callback(&class, "PreDestroy", |m| m.markers().pre_destroy)?);

            debug!(bean = %bean_name, class = class.name(), "Defined bean");
            registry.register(definition)?;

            if class.annotations().is_configuration() {
                if is_post_processor(&class) {
                    return Err(BunyanError::ConfigurationPostProcessor {
                        class: class.name().to_string(),
                    });
                }
                for definition in factory_definitions(&class, &bean_name)? {
                    debug!(
                        bean = definition.name(),
                        source = %definition.source(),
                        "Defined bean from factory method"
                    );
                    registry.register(definition)?;
                }
            }
        }

        Ok(registry)
    }
}

fn check_component(class: &ClassDescriptor) -> Result<()> {
    let violation = if class.modifiers().is_abstract {
        ComponentViolation::Abstract
    } else if class.modifiers().visibility == Visibility::Private {
        ComponentViolation::Private
    } else {
        return Ok(());
    };
    Err(BunyanError::InvalidComponentClass {
        class: class.name().to_string(),
        violation,
    })
}

/// The only public constructor, or the only constructor when none is public.
fn select_constructor(class: &ClassDescriptor) -> Result<ConstructorDescriptor> {
    let constructors = class.constructors();
    let public: Vec<_> = constructors.iter().filter(|c| c.is_public()).collect();

    match (public.as_slice(), constructors) {
        ([only], _) => Ok((*only).clone()),
        ([], [only]) => Ok(only.clone()),
        _ => Err(BunyanError::AmbiguousConstructor {
            class: class.name().to_string(),
            public: public.len(),
            declared: constructors.len(),
        }),
    }
}

fn find_callback(
    class: &ClassDescriptor,
    marker: &str,
    marked: impl Fn(&MethodDescriptor) -> bool,
) -> Result<Option<Callback>> {
    let mut found = class.methods().iter().filter(|m| marked(m));
    let Some(method) = found.next() else {
        return Ok(None);
    };

    if let Some(other) = found.next() {
        return Err(BunyanError::InvalidCallbackMethod {
            class: class.name().to_string(),
            method: other.name().to_string(),
            reason: format!("{marker} is already on {}()", method.name()),
        });
    }
    if !method.params().is_empty() {
        return Err(BunyanError::InvalidCallbackMethod {
            class: class.name().to_string(),
            method: method.name().to_string(),
            reason: format!("{marker} method takes {} parameters, expected none", method.params().len()),
        });
    }

    Ok(Some(Callback::Method(method.clone())))
}

fn factory_definitions(config: &ClassDescriptor, factory_bean: &str) -> Result<Vec<BeanDefinition>> {
    let mut definitions = Vec::new();

    for method in config.methods() {
        let Some(marker) = &method.markers().bean else {
            continue;
        };
        let returns = check_factory_method(config, method)?;

        let name = marker
            .name
            .clone()
            .filter(|explicit| !explicit.is_empty())
            .unwrap_or_else(|| method.name().to_string());

        definitions.push(
            BeanDefinition::new(
                name,
                returns,
                Origin::FactoryMethod {
                    factory_bean: factory_bean.to_string(),
                    method: method.clone(),
                },
            )
            .with_order(method.markers().order.unwrap_or(DEFAULT_ORDER))
            .with_primary(method.markers().primary)
            .with_init(marker.init_method.clone().map(Callback::Named))
            .with_destroy(marker.destroy_method.clone().map(Callback::Named)),
        );
    }

    Ok(definitions)
}

/// Returns the class the factory method produces.
fn check_factory_method(
    config: &ClassDescriptor,
    method: &Arc<MethodDescriptor>,
) -> Result<Arc<ClassDescriptor>> {
    let modifiers = method.modifiers();
    let violation = if modifiers.is_abstract {
        FactoryMethodViolation::Abstract
    } else if modifiers.is_final {
        FactoryMethodViolation::Final
    } else if modifiers.visibility == Visibility::Private {
        FactoryMethodViolation::Private
    } else {
        match method.returns() {
            ReturnType::Class(class) => return Ok(class.clone()),
            ReturnType::Void => FactoryMethodViolation::ReturnsVoid,
            ReturnType::Primitive(_) => FactoryMethodViolation::ReturnsPrimitive,
        }
    };

    Err(BunyanError::InvalidFactoryMethod {
        class: config.name().to_string(),
        method: method.name().to_string(),
        violation,
    })
}
