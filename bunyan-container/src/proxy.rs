//! Proxies and the Around post-processor.
//!
//! Rust cannot generate subclasses at runtime, so a proxy is an ordinary
//! wrapper type that embeds a [`Proxy<T>`] and implements the target's
//! traits by delegating through [`Proxy::invoke`]. A [`ProxyRegistry`]
//! knows, per target type, how to build the wrapper and which class
//! descriptor describes it. The wrapper's class must `extends` the target
//! class so the proxy stays assignable to the bean's declared class.
//!
//! [`AroundProxyPostProcessor`] substitutes every bean whose class carries
//! the Around marker with such a proxy, and hands the original back for
//! injection and callbacks.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::bean::BeanRef;
use crate::descriptor::{ClassDescriptor, ConstructorDescriptor};
use crate::error::{BunyanError, Result};
use crate::key::TypeKey;
use crate::processor::{BeanPostProcessor, BeanResolver};

/// Code run around every proxied call.
pub trait Interceptor: Send + Sync {
    /// Runs before the call; an error prevents it.
    fn before(&self, _bean: &str, _method: &str) -> Result<()> {
        Ok(())
    }

    /// Runs after the call returned.
    fn after(&self, _bean: &str, _method: &str) {}
}

/// Delegating core of a proxy: the target plus its interceptor.
pub struct Proxy<T: ?Sized> {
    bean: String,
    target: Arc<T>,
    interceptor: Arc<dyn Interceptor>,
}

impl<T: ?Sized> Proxy<T> {
    pub fn new(bean: impl Into<String>, target: Arc<T>, interceptor: Arc<dyn Interceptor>) -> Self {
        Self {
            bean: bean.into(),
            target,
            interceptor,
        }
    }

    pub fn bean(&self) -> &str {
        &self.bean
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_arc(&self) -> &Arc<T> {
        &self.target
    }

    /// Calls `method` on the target with the interceptor around it.
    ///
    /// # Errors
    /// Whatever [`Interceptor::before`] returns; the call is then skipped.
    pub fn invoke<R>(&self, method: &str, call: impl FnOnce(&T) -> R) -> Result<R> {
        self.interceptor.before(&self.bean, method)?;
        let result = call(&self.target);
        self.interceptor.after(&self.bean, method);
        Ok(result)
    }
}

impl<T: ?Sized> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy").field("bean", &self.bean).finish_non_exhaustive()
    }
}

/// Wraps a target bean behind an interceptor.
pub trait ProxyFactory: Send + Sync {
    /// # Errors
    /// [`BunyanError::NoProxyFactory`] if the target's type has no wrapper.
    fn create_proxy(
        &self,
        bean: &str,
        target: BeanRef,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<BeanRef>;
}

type ProxyBuilder =
    Arc<dyn Fn(&str, BeanRef, Arc<dyn Interceptor>) -> Result<BeanRef> + Send + Sync>;

/// A [`ProxyFactory`] with one wrapper type per target type.
#[derive(Clone, Default)]
pub struct ProxyRegistry {
    builders: HashMap<TypeKey, ProxyBuilder>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the wrapper `P` for targets of type `T`; `class` describes `P`.
    pub fn register<T, P, F>(mut self, class: Arc<ClassDescriptor>, wrap: F) -> Self
    where
        T: Any + Send + Sync,
        P: Any + Send + Sync,
        F: Fn(Proxy<T>) -> P + Send + Sync + 'static,
    {
        let builder: ProxyBuilder = Arc::new(
            move |bean: &str, target: BeanRef, interceptor: Arc<dyn Interceptor>| -> Result<BeanRef> {
                let typed = target.cast::<T>().ok_or_else(|| BunyanError::NoProxyFactory {
                    bean: bean.to_string(),
                    class: target.class().name().to_string(),
                })?;
                let proxy = wrap(Proxy::new(bean, typed, interceptor));
                Ok(BeanRef::from_arc(Arc::new(proxy), class.clone()))
            },
        );
        self.builders.insert(TypeKey::of::<T>(), builder);
        self
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

impl ProxyFactory for ProxyRegistry {
    fn create_proxy(
        &self,
        bean: &str,
        target: BeanRef,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<BeanRef> {
        let Some(builder) = self.builders.get(&target.class().key()) else {
            return Err(BunyanError::NoProxyFactory {
                bean: bean.to_string(),
                class: target.class().name().to_string(),
            });
        };
        builder(bean, target, interceptor)
    }
}

impl fmt::Debug for ProxyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRegistry")
            .field("targets", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Proxies beans whose class carries the Around marker.
pub struct AroundProxyPostProcessor {
    factory: Arc<dyn ProxyFactory>,
    /// Originals behind the proxies, by bean name
    originals: Mutex<HashMap<String, BeanRef>>,
}

impl AroundProxyPostProcessor {
    pub fn new(factory: Arc<dyn ProxyFactory>) -> Self {
        Self {
            factory,
            originals: Mutex::new(HashMap::new()),
        }
    }

    /// A component class for this processor, ready to go into a catalog.
    pub fn class_descriptor(name: impl Into<String>, factory: Arc<dyn ProxyFactory>) -> Arc<ClassDescriptor> {
        ClassDescriptor::builder::<AroundProxyPostProcessor>(name)
            .component()
            .implements::<dyn BeanPostProcessor>(|p| p as Arc<dyn BeanPostProcessor>)
            .constructor(ConstructorDescriptor::new(move |_| {
                Ok(AroundProxyPostProcessor::new(factory.clone()))
            }))
            .build()
    }

    /// The original behind the proxy registered for `bean`, if any.
    pub fn original(&self, bean: &str) -> Option<BeanRef> {
        self.originals.lock().get(bean).cloned()
    }
}

impl BeanPostProcessor for AroundProxyPostProcessor {
    fn post_process_before_initialization(
        &self,
        bean: BeanRef,
        name: &str,
        resolver: &mut dyn BeanResolver,
    ) -> Result<BeanRef> {
        let Some(handler) = bean.class().annotations().around().map(str::to_string) else {
            return Ok(bean);
        };

        let handler_bean = resolver.resolve_bean(&handler)?;
        let interceptor = handler_bean
            .cast::<dyn Interceptor>()
            .ok_or_else(|| BunyanError::InvalidInterceptor {
                bean: name.to_string(),
                handler: handler.clone(),
            })?;

        let proxy = self.factory.create_proxy(name, bean.clone(), interceptor)?;
        debug!(
            bean = name,
            handler = %handler,
            proxy = proxy.class().name(),
            "Created Around proxy"
        );
        self.originals.lock().insert(name.to_string(), bean);
        Ok(proxy)
    }

    fn post_process_on_set_property(&self, bean: BeanRef, name: &str) -> BeanRef {
        match self.original(name) {
            Some(original) => {
                trace!(bean = name, "Handing back original behind proxy");
                original
            }
            None => bean,
        }
    }
}

impl fmt::Debug for AroundProxyPostProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AroundProxyPostProcessor")
            .field("proxied", &self.originals.lock().len())
            .finish_non_exhaustive()
    }
}
