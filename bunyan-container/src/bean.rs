//! Type-erased bean instances.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::ClassDescriptor;
use crate::key::TypeKey;

/// A bean object, type-erased.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A bean instance together with the descriptor of its runtime class.
///
/// The runtime class may differ from the declared class of the bean
/// definition holding it (a proxy, for example), but is always assignable
/// to it.
#[derive(Clone)]
pub struct BeanRef {
    value: Instance,
    class: Arc<ClassDescriptor>,
}

impl BeanRef {
    pub fn new(value: Instance, class: Arc<ClassDescriptor>) -> Self {
        Self { value, class }
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>, class: Arc<ClassDescriptor>) -> Self {
        Self::new(value, class)
    }

    pub fn value(&self) -> &Instance {
        &self.value
    }

    /// Borrows the object, e.g. to hand it to a member's invocation closure.
    pub fn object(&self) -> &(dyn Any + Send + Sync) {
        &*self.value
    }

    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Views the bean as `T`: its own type or one of the traits its class
    /// declares.
    pub fn cast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.class.cast::<T>(self.value.clone())
    }

    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.class.is_assignable_to(key)
    }

    pub fn can_cast(&self, key: &TypeKey) -> bool {
        self.class.can_cast(key)
    }

    /// Identity comparison: both refer to the same allocation.
    pub fn same(&self, other: &BeanRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
    }
}

impl fmt::Debug for BeanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanRef")
            .field("class", &self.class.name())
            .field("at", &Arc::as_ptr(&self.value))
            .finish()
    }
}
