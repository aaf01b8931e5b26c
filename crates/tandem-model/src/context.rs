use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to whatever environment created an instance.
///
/// Instances carry their context so callers further down the graph can reach
/// back to it (a store registry, a client). The model layer never looks
/// inside.
#[derive(Clone, Default)]
pub struct Context(Option<Arc<dyn Any + Send + Sync>>);

impl Context {
    /// An empty context.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(Some(value))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the context as `T`, if that is what it holds.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns `true` if both handles point at the same context value.
    pub fn same(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Context(..)"),
            None => f.write_str("Context(none)"),
        }
    }
}
