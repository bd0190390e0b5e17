//! Bean definitions.

use std::cmp::Ordering;
use std::sync::Arc;

use bunyan_support::rendering::ChainEntry;

use crate::bean::BeanRef;
use crate::descriptor::{ClassDescriptor, ConstructorDescriptor, MethodDescriptor, ParamDescriptor};
use crate::error::{BunyanError, Result};
use crate::processor::is_post_processor;

/// Order given to beans that do not declare one; sorts last.
pub const DEFAULT_ORDER: i32 = i32::MAX;

/// How a bean instance is produced.
#[derive(Clone, Debug)]
pub enum Origin {
    Constructor(ConstructorDescriptor),
    /// A method on the configuration bean `factory_bean`.
    FactoryMethod {
        factory_bean: String,
        method: Arc<MethodDescriptor>,
    },
}

impl Origin {
    pub fn params(&self) -> &[ParamDescriptor] {
        match self {
            Self::Constructor(constructor) => constructor.params(),
            Self::FactoryMethod { method, .. } => method.params(),
        }
    }
}

/// A lifecycle callback.
#[derive(Clone, Debug)]
pub enum Callback {
    /// A method carrying the PostConstruct or PreDestroy marker.
    Method(Arc<MethodDescriptor>),
    /// A method named on a Bean marker, looked up on the runtime class.
    Named(String),
}

impl Callback {
    pub fn method_name(&self) -> &str {
        match self {
            Self::Method(method) => method.name(),
            Self::Named(name) => name,
        }
    }
}

/// Everything known about one bean.
///
/// The instance starts empty and is set exactly once during creation; it
/// may later be replaced by a post-processor with another object that is
/// still assignable to the declared class.
#[derive(Debug)]
pub struct BeanDefinition {
    name: String,
    class: Arc<ClassDescriptor>,
    origin: Origin,
    order: i32,
    primary: bool,
    init: Option<Callback>,
    destroy: Option<Callback>,
    instance: Option<BeanRef>,
}

impl BeanDefinition {
    pub fn new(name: impl Into<String>, class: Arc<ClassDescriptor>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            class,
            origin,
            order: DEFAULT_ORDER,
            primary: false,
            init: None,
            destroy: None,
            instance: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_init(mut self, init: Option<Callback>) -> Self {
        self.init = init;
        self
    }

    pub fn with_destroy(mut self, destroy: Option<Callback>) -> Self {
        self.destroy = destroy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared class: the component class, or a factory method's
    /// return type.
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn init(&self) -> Option<&Callback> {
        self.init.as_ref()
    }

    pub fn destroy(&self) -> Option<&Callback> {
        self.destroy.as_ref()
    }

    pub fn instance(&self) -> Option<&BeanRef> {
        self.instance.as_ref()
    }

    /// # Errors
    /// [`BunyanError::BeanNotInitialized`] before creation.
    pub fn required_instance(&self) -> Result<&BeanRef> {
        self.instance.as_ref().ok_or_else(|| BunyanError::BeanNotInitialized {
            name: self.name.clone(),
        })
    }

    /// Stores or replaces the instance.
    ///
    /// # Errors
    /// [`BunyanError::InstanceTypeMismatch`] if the instance's class is not
    /// assignable to the declared class.
    pub fn set_instance(&mut self, instance: BeanRef) -> Result<()> {
        if !instance.is_assignable_to(&self.class.key()) {
            return Err(BunyanError::InstanceTypeMismatch {
                name: self.name.clone(),
                declared: self.class.name().to_string(),
                actual: instance.class().name().to_string(),
            });
        }
        self.instance = Some(instance);
        Ok(())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.origin, Origin::Constructor(_)) && self.class.annotations().is_configuration()
    }

    pub fn is_post_processor(&self) -> bool {
        is_post_processor(&self.class)
    }

    /// Sort order: ascending order value, then name.
    pub fn cmp_order(&self, other: &Self) -> Ordering {
        self.order
            .cmp(&other.order)
            .then_with(|| self.name.cmp(&other.name))
    }

    /// Where the definition came from, for diagnostics.
    pub fn source(&self) -> String {
        match &self.origin {
            Origin::Constructor(_) => self.class.name().to_string(),
            Origin::FactoryMethod {
                factory_bean,
                method,
            } => format!("{factory_bean}.{}()", method.name()),
        }
    }

    pub(crate) fn chain_entry(&self) -> ChainEntry {
        ChainEntry {
            label: self.name.clone(),
            type_name: self.class.simple_name(),
            origin: match &self.origin {
                Origin::Constructor(_) => None,
                Origin::FactoryMethod { .. } => Some(self.source()),
            },
        }
    }
}
