//! Type identification keys.
//!
//! [`TypeKey`] names a type the container can reason about: a component
//! class (`OrderService`), a capability trait (`dyn Clock`) or a value type
//! coerced from configuration (`u16`).

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use bunyan_support::rendering::shorten_type_name;

/// Identifies a Rust type inside the container.
///
/// Equality and hashing use only the [`TypeId`]; the name is kept for
/// error messages.
///
/// # Examples
/// ```
/// use bunyan_container::key::TypeKey;
///
/// trait Clock {}
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.short_name(), "String");
///
/// // trait objects are keys too
/// let clock = TypeKey::of::<dyn Clock>();
/// assert_ne!(clock, key);
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates the key for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Creates a key from a raw [`TypeId`] and type name.
    #[inline]
    pub fn from_raw(type_id: TypeId, type_name: &'static str) -> Self {
        Self { type_id, type_name }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, as reported by [`std::any::type_name`].
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without module paths.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }

    /// Returns `true` if this key names `T`.
    #[inline]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderService;
    trait Clock {}

    #[test]
    fn key_of_struct() {
        let key = TypeKey::of::<OrderService>();
        assert!(key.type_name().ends_with("OrderService"));
        assert_eq!(key.short_name(), "OrderService");
        assert!(key.is::<OrderService>());
    }

    #[test]
    fn struct_and_trait_keys_differ() {
        assert_ne!(TypeKey::of::<OrderService>(), TypeKey::of::<dyn Clock>());
    }

    #[test]
    fn raw_key_equals_typed_key() {
        let raw = TypeKey::from_raw(TypeId::of::<u16>(), "u16");
        assert_eq!(raw, TypeKey::of::<u16>());
    }

    #[test]
    fn key_in_hashset() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(TypeKey::of::<String>());
        set.insert(TypeKey::of::<String>());
        set.insert(TypeKey::of::<dyn Clock>());
        assert_eq!(set.len(), 2);
    }
}
