//! Injection engine and init callbacks.
//!
//! Runs after every definition has an instance. Members are set on the
//! restored instance, i.e. the original object behind any substitute a
//! post-processor put in place, walking the declared class and then each
//! base class through its projection.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::args::{Arg, Args};
use crate::bean::BeanRef;
use crate::definition::Callback;
use crate::descriptor::{ClassDescriptor, Modifiers};
use crate::error::{BunyanError, Result};
use crate::factory::{BeanFactory, Phase, restore, with_bean_context};
use crate::key::TypeKey;
use crate::marker::{Injection, InjectionMarkers};

impl BeanFactory {
    pub(crate) fn inject_bean(&mut self, name: &str) -> Result<()> {
        let (declared, instance) = {
            let definition = self.definition(name)?;
            (
                definition.class().clone(),
                definition.required_instance()?.clone(),
            )
        };
        let target = restore(&self.processors, name, instance);

        let (class, object) = view_as(target.class(), target.object(), &declared.key())
            .unwrap_or((declared, target.object()));
        self.inject_members(name, &class, object)
    }

    fn inject_members(
        &mut self,
        bean: &str,
        class: &Arc<ClassDescriptor>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<()> {
        for field in class.fields() {
            let member = format!("{}.{}", class.simple_name(), field.name());
            let Some(arg) = self.resolve_member(
                bean,
                &format!("field {member}"),
                &member,
                field.ty(),
                field.markers(),
                field.modifiers(),
            )?
            else {
                continue;
            };
            field
                .assign(object, &mut Args::new(vec![arg]))
                .map_err(|err| with_bean_context(bean, err))?;
            trace!(bean, field = %member, "Injected field");
        }

        for method in class.methods() {
            let markers = &method.markers().injection;
            if matches!(markers.injection(), Injection::Unmarked) {
                continue;
            }
            let member = format!("{}.{}()", class.simple_name(), method.name());
            let [param] = method.params() else {
                return Err(BunyanError::NotASetter {
                    bean: bean.to_string(),
                    method: member,
                    params: method.params().len(),
                });
            };
            let Some(arg) = self.resolve_member(
                bean,
                &format!("method {member}"),
                &member,
                param.ty,
                markers,
                method.modifiers(),
            )?
            else {
                continue;
            };
            method
                .invoke(object, &mut Args::new(vec![arg]))
                .map_err(|err| with_bean_context(bean, err))?;
            trace!(bean, method = %member, "Injected through setter");
        }

        if let Some(base) = class.superclass() {
            let base_object = base.project(object).ok_or_else(|| BunyanError::TargetMismatch {
                member: base.class().name().to_string(),
                expected: class.name().to_string(),
            })?;
            self.inject_members(bean, base.class(), base_object)?;
        }

        Ok(())
    }

    /// `None` for an unmarked member or a missing optional dependency.
    fn resolve_member(
        &mut self,
        bean: &str,
        site: &str,
        member: &str,
        ty: TypeKey,
        markers: &InjectionMarkers,
        modifiers: Modifiers,
    ) -> Result<Option<Arg>> {
        if matches!(markers.injection(), Injection::Unmarked) {
            return Ok(None);
        }
        if matches!(markers.injection(), Injection::Conflict) {
            return Err(BunyanError::MarkerConflict {
                bean: bean.to_string(),
                site: site.to_string(),
            });
        }
        for (flag, modifier) in [(modifiers.is_static, "static"), (modifiers.is_final, "final")] {
            if flag {
                return Err(BunyanError::ImmutableInjectionTarget {
                    bean: bean.to_string(),
                    member: member.to_string(),
                    modifier,
                });
            }
        }

        match self.resolve_argument(bean, site, ty, markers, Phase::Injection)? {
            Arg::Absent => {
                trace!(bean, member, "Optional dependency absent, member left unset");
                Ok(None)
            }
            arg => Ok(Some(arg)),
        }
    }

    /// Runs the init callback, then the after-initialization processors.
    pub(crate) fn init_bean(&mut self, name: &str) -> Result<()> {
        let (init, instance) = {
            let definition = self.definition(name)?;
            (definition.init().cloned(), definition.required_instance()?.clone())
        };

        if let Some(callback) = init {
            let target = restore(&self.processors, name, instance);
            invoke_callback(name, &target, &callback)?;
        }

        let processors = self.processors.clone();
        for processor in processors {
            let current = self.definition(name)?.required_instance()?.clone();
            let processed = processor.post_process_after_initialization(current.clone(), name)?;
            if !processed.same(&current) {
                debug!(
                    bean = name,
                    replacement = processed.class().name(),
                    "Bean replaced after initialization"
                );
                self.definition_mut(name)?.set_instance(processed)?;
            }
        }

        Ok(())
    }
}

/// Walks from a runtime class down its bases to the one keyed `key`,
/// projecting the object along the way.
fn view_as<'a>(
    class: &Arc<ClassDescriptor>,
    object: &'a (dyn Any + Send + Sync),
    key: &TypeKey,
) -> Option<(Arc<ClassDescriptor>, &'a (dyn Any + Send + Sync))> {
    if class.key() == *key {
        return Some((class.clone(), object));
    }
    let base = class.superclass()?;
    view_as(base.class(), base.project(object)?, key)
}

/// Invokes an init or destroy callback on `target`.
pub(crate) fn invoke_callback(bean: &str, target: &BeanRef, callback: &Callback) -> Result<()> {
    let class = target.class();
    let located = match callback {
        Callback::Method(method) if method.owner() == class.key() => {
            Some((method.clone(), target.object()))
        }
        _ => class.locate_method(target.object(), callback.method_name()),
    };

    let Some((method, object)) = located else {
        return Err(BunyanError::InvalidCallbackMethod {
            class: class.name().to_string(),
            method: callback.method_name().to_string(),
            reason: "no such method".to_string(),
        });
    };
    if !method.params().is_empty() {
        return Err(BunyanError::InvalidCallbackMethod {
            class: class.name().to_string(),
            method: method.name().to_string(),
            reason: format!("takes {} parameters, expected none", method.params().len()),
        });
    }

    method
        .invoke(object, &mut Args::empty())
        .map_err(|err| with_bean_context(bean, err))?;
    debug!(bean, method = method.name(), "Invoked lifecycle callback");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::descriptor::MethodDescriptor;

    #[derive(Default)]
    struct Base {
        closed: AtomicUsize,
    }

    #[derive(Default)]
    struct Derived {
        base: Base,
    }

    fn base_class() -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<Base>("app::Base")
            .method(MethodDescriptor::callback::<Base, _>("close", |b| {
                b.closed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .build()
    }

    fn derived_class() -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<Derived>("app::Derived")
            .extends(base_class(), |d: &Derived| &d.base)
            .build()
    }

    #[test]
    fn view_as_walks_to_base() {
        let object = Derived::default();
        let (class, view) = view_as(&derived_class(), &object, &TypeKey::of::<Base>()).unwrap();
        assert_eq!(class.name(), "app::Base");
        assert!(view.downcast_ref::<Base>().is_some());

        assert!(view_as(&derived_class(), &object, &TypeKey::of::<String>()).is_none());
    }

    #[test]
    fn named_callback_found_on_base() {
        let bean = BeanRef::from_arc(Arc::new(Derived::default()), derived_class());
        invoke_callback("derived", &bean, &Callback::Named("close".to_string())).unwrap();

        let derived = bean.cast::<Derived>().unwrap();
        assert_eq!(derived.base.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_callback_method() {
        let bean = BeanRef::from_arc(Arc::new(Derived::default()), derived_class());
        match invoke_callback("derived", &bean, &Callback::Named("shutdown".to_string())) {
            Err(BunyanError::InvalidCallbackMethod { class, method, .. }) => {
                assert_eq!(class, "app::Derived");
                assert_eq!(method, "shutdown");
            }
            other => panic!("Expected InvalidCallbackMethod, got: {other:?}"),
        }
    }
}
