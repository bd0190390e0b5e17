//! Resolved arguments handed to constructors, factory methods and setters.

use std::any::{Any, type_name};
use std::sync::Arc;

use crate::bean::BeanRef;
use crate::error::{BunyanError, Result};

/// One resolved argument.
#[derive(Debug)]
pub enum Arg {
    /// A converted configuration value.
    Value(Box<dyn Any + Send + Sync>),
    /// Another bean.
    Bean(BeanRef),
    /// An optional dependency that is not defined.
    Absent,
}

/// Positional arguments for one invocation.
///
/// Indexes follow the declared parameter order of the member being
/// invoked. Values are moved out on access, beans are shared.
#[derive(Debug, Default)]
pub struct Args {
    items: Vec<Arg>,
}

impl Args {
    pub fn new(items: Vec<Arg>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The bean at `index`, viewed as `T`.
    ///
    /// # Errors
    /// [`BunyanError::ArgumentMismatch`] if the argument is not a bean, is
    /// absent, or cannot be viewed as `T`.
    pub fn bean<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.optional_bean::<T>(index)?
            .ok_or_else(|| mismatch::<T>(index))
    }

    /// Like [`Args::bean`], but an absent optional dependency yields `None`.
    pub fn optional_bean<T: ?Sized + 'static>(&self, index: usize) -> Result<Option<Arc<T>>> {
        match self.items.get(index) {
            Some(Arg::Bean(bean)) => bean.cast::<T>().map(Some).ok_or_else(|| mismatch::<T>(index)),
            Some(Arg::Absent) => Ok(None),
            _ => Err(mismatch::<T>(index)),
        }
    }

    /// The bean at `index` without a typed view.
    pub fn bean_ref(&self, index: usize) -> Result<&BeanRef> {
        match self.items.get(index) {
            Some(Arg::Bean(bean)) => Ok(bean),
            _ => Err(mismatch::<BeanRef>(index)),
        }
    }

    /// Takes the configuration value at `index`.
    pub fn value<V: Any>(&mut self, index: usize) -> Result<V> {
        let Some(slot) = self.items.get_mut(index) else {
            return Err(mismatch::<V>(index));
        };
        if !matches!(slot, Arg::Value(_)) {
            return Err(mismatch::<V>(index));
        }
        match std::mem::replace(slot, Arg::Absent) {
            Arg::Value(boxed) => boxed.downcast::<V>().map(|value| *value).map_err(|_| mismatch::<V>(index)),
            _ => Err(mismatch::<V>(index)),
        }
    }
}

fn mismatch<T: ?Sized>(index: usize) -> BunyanError {
    BunyanError::ArgumentMismatch {
        index,
        expected: type_name::<T>().to_string(),
    }
}
