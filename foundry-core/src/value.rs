//! The tagged-any boundary value passed between operations.
//!
//! Operations exchange values of arbitrary, caller-defined type. Rust has no
//! dynamic-typing escape hatch as permissive as the one this protocol was
//! originally described against, so the boundary is modeled explicitly: a
//! [`Value`] is a type-erased, cheaply cloneable handle that remembers the
//! name of the type it was built from, so that a mismatched downcast can
//! report both the declared and the actual type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased value crossing an operation boundary.
///
/// Cloning a `Value` clones the handle, not the payload (it's an `Arc`
/// underneath), so passing the same input to several middleware frames or
/// several `ForEach` children does not imply copying the wrapped data.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a concrete value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Value {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The canonical null value: present, but carrying no payload.
    pub fn null() -> Self {
        Value::new(())
    }

    /// True if this value is the canonical null.
    pub fn is_null(&self) -> bool {
        self.inner.is::<()>()
    }

    /// Attempt to borrow the wrapped value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// True if the wrapped value is of type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// The name of the concrete type this value was built from.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("type", &self.type_name).finish()
    }
}

/// A list-like value, the canonical representation `ForEach`'s `Split`
/// strategy indexes into.
///
/// The original protocol distinguishes arrays, lists, and lazily-materialized
/// iterables at the `Split` boundary; a statically typed [`Value`] has no
/// equivalent of reflecting over arbitrary iterable shapes, so all of them
/// collapse to this one concrete representation. Any `Value` that is not a
/// `ValueList` is treated as a non-collection scalar (Split degenerates to
/// Shared, per the contract).
pub type ValueList = Vec<Value>;
