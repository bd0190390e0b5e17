//! Set-once slots for members filled in after construction.
//!
//! Beans are shared behind `Arc` as soon as they are created, so members
//! injected later (Autowired or Value fields) need interior mutability.
//! A slot is written exactly once, by the injection pass.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// A bean reference injected after construction.
///
/// ```
/// use std::sync::Arc;
/// use bunyan_container::slot::Wired;
///
/// let slot: Wired<String> = Wired::new();
/// assert!(slot.get().is_none());
/// slot.set(Arc::new("db".to_string())).unwrap();
/// assert_eq!(slot.get().map(|s| s.as_str()), Some("db"));
/// ```
pub struct Wired<T: ?Sized> {
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Wired<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        self.cell.get()
    }

    /// Stores the reference; returns it back if the slot is already filled.
    pub fn set(&self, value: Arc<T>) -> Result<(), Arc<T>> {
        self.cell.set(value)
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: ?Sized> Default for Wired<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Wired<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wired").field("set", &self.is_set()).finish()
    }
}

/// A configuration value injected after construction.
pub struct Configured<T> {
    cell: OnceCell<T>,
}

impl<T> Configured<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn set(&self, value: T) -> Result<(), T> {
        self.cell.set(value)
    }
}

impl<T> Default for Configured<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Configured<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Configured").field(&self.cell.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed;
    impl Clock for Fixed {
        fn now(&self) -> u64 {
            7
        }
    }

    #[test]
    fn wired_accepts_trait_objects() {
        let slot: Wired<dyn Clock> = Wired::new();
        slot.set(Arc::new(Fixed)).map_err(|_| ()).unwrap();
        assert_eq!(slot.get().unwrap().now(), 7);
    }

    #[test]
    fn wired_is_set_once() {
        let slot: Wired<u8> = Wired::default();
        assert!(slot.set(Arc::new(1)).is_ok());
        assert!(slot.set(Arc::new(2)).is_err());
        assert_eq!(**slot.get().unwrap(), 1);
    }

    #[test]
    fn configured_holds_value() {
        let port: Configured<u16> = Configured::new();
        port.set(8080).unwrap();
        assert_eq!(port.get(), Some(&8080));
        assert_eq!(format!("{port:?}"), "Configured(Some(8080))");
    }
}
