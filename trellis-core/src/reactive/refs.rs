//! Refs
//!
//! A [`Ref`] is a single reactive slot with a `value`. Two kinds exist:
//!
//! - a boxed ref made by [`ref_value`], backed by a reactive object with one
//!   `value` property;
//! - a field ref made by [`to_ref`], which reads and writes one property of
//!   an existing proxy, so the property can be handed around on its own
//!   without losing reactivity.
//!
//! Refs are stored in containers as [`Value::Ref`]. A [`RefProxy`] (see
//! [`proxy_refs`]) is a view over a container that unwraps those entries on
//! read and writes through them on write.

use std::fmt;
use std::rc::Rc;

use super::context::untracked;
use crate::error::{Error, Result};
use crate::proxy::{reactive, Key, Raw, Reactive, Value};

/// Name of the property a boxed ref keeps its value under.
const VALUE: &str = "value";

enum RefInner {
    Boxed(Reactive),
    Field { object: Reactive, key: Key },
}

/// A reactive value slot.
///
/// Cloning a `Ref` clones the handle; refs compare by identity.
#[derive(Clone)]
pub struct Ref {
    inner: Rc<RefInner>,
}

impl Ref {
    /// Read the value. Tracked like any proxy read.
    pub fn value(&self) -> Value {
        match &*self.inner {
            RefInner::Boxed(slot) => slot.get(VALUE),
            RefInner::Field { object, key } => object.get(key),
        }
    }

    /// Read the value without recording a dependency.
    pub fn value_untracked(&self) -> Value {
        untracked(|| self.value())
    }

    /// Write the value, notifying readers if it changed. Returns `false` if
    /// the write was rejected (a field ref over a read-only proxy).
    pub fn set_value(&self, value: impl Into<Value>) -> bool {
        match &*self.inner {
            RefInner::Boxed(slot) => slot.set(VALUE, value),
            RefInner::Field { object, key } => object.set(key, value),
        }
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn new(inner: RefInner) -> Self {
        Self {
            inner: Rc::new(inner),
        }
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            RefInner::Boxed(_) => f.debug_struct("Ref").field("value", &self.value_untracked()).finish(),
            RefInner::Field { key, .. } => f.debug_struct("Ref").field("field", key).finish(),
        }
    }
}

/// Box a value into a fresh ref.
pub fn ref_value(value: impl Into<Value>) -> Ref {
    let slot = Raw::object_from([(VALUE, value.into())]);
    Ref::new(RefInner::Boxed(reactive(&slot)))
}

/// A ref bound to one property of `object`.
pub fn to_ref(object: &Reactive, key: impl Into<Key>) -> Ref {
    Ref::new(RefInner::Field {
        object: object.clone(),
        key: key.into(),
    })
}

/// A plain container holding a field ref for every own key of `object`.
///
/// Spreading a proxy's fields into separate variables loses reactivity;
/// spreading the refs does not. Arrays produce an array of refs.
pub fn to_refs(object: &Reactive) -> Raw {
    let keys = untracked(|| object.keys());
    if object.is_array() {
        Raw::array_from(keys.into_iter().map(|key| Value::Ref(to_ref(object, key))))
    } else {
        Raw::object_from(
            keys.into_iter()
                .map(|key| (key.clone(), Value::Ref(to_ref(object, key)))),
        )
    }
}

/// Whether the value is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// The ref's current value, or the value itself if it is not a ref.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(r) => r.value(),
        other => other.clone(),
    }
}

/// An auto-unwrapping view over a container of refs.
#[derive(Debug, Clone)]
pub struct RefProxy {
    target: Value,
}

impl RefProxy {
    /// Read a property; ref entries yield their current value.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let entry = match &self.target {
            Value::Proxy(proxy) => proxy.get(key),
            other => other.as_raw().map_or(Value::Undefined, |raw| raw.get(key)),
        };
        unref(&entry)
    }

    /// Write a property. Writing over a ref entry sets the ref's value
    /// instead of replacing the ref.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let Some(raw) = self.target.as_raw() else {
            return false;
        };
        if let Value::Ref(entry) = raw.get(key.clone()) {
            return entry.set_value(value);
        }
        match &self.target {
            Value::Proxy(proxy) => proxy.set(key, value),
            _ => raw.set(key, value),
        }
    }

    /// Own keys of the underlying container.
    pub fn keys(&self) -> Vec<Key> {
        match &self.target {
            Value::Proxy(proxy) => proxy.keys(),
            other => other.as_raw().map(|raw| raw.keys()).unwrap_or_default(),
        }
    }

    /// The wrapped container.
    pub fn target(&self) -> &Value {
        &self.target
    }
}

/// View `target` with its ref entries unwrapped.
///
/// Fails for values that are not containers.
pub fn proxy_refs(target: &Value) -> Result<RefProxy> {
    if !target.is_container() {
        return Err(Error::NotAContainer {
            found: target.type_name(),
        });
    }
    Ok(RefProxy {
        target: target.clone(),
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::cell::Cell;

    #[test]
    fn boxed_ref_is_reactive() {
        let count = ref_value(0);
        let runs = Rc::new(Cell::new(0));

        let e = effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                count.value();
                runs.set(runs.get() + 1);
            }
        });

        let next = count.value().as_f64().unwrap_or_default() + 1.0;
        count.set_value(next);
        assert_eq!(runs.get(), 2);
        assert_eq!(count.value(), Value::from(1));
        e.stop();
    }

    #[test]
    fn to_refs_keeps_reactivity_after_spreading() {
        let obj = reactive(&Raw::object_from([("foo", 1), ("bar", 2)]));
        let refs = to_refs(&obj);
        let Value::Ref(foo) = refs.get("foo") else {
            panic!("expected a ref entry");
        };

        let runs = Rc::new(Cell::new(0));
        let e = effect({
            let foo = foo.clone();
            let runs = runs.clone();
            move || {
                foo.value();
                runs.set(runs.get() + 1);
            }
        });

        foo.set_value(2);
        assert_eq!(runs.get(), 2);
        assert_eq!(obj.get("foo"), Value::from(2));
        e.stop();
    }

    #[test]
    fn to_ref_over_readonly_rejects_writes() {
        let obj = crate::proxy::readonly(&Raw::object_from([("a", 1)]));
        let a = to_ref(&obj, "a");
        assert!(!a.set_value(2));
        assert_eq!(a.value(), Value::from(1));
    }

    #[test]
    fn proxy_refs_unwraps_and_writes_through() {
        let count = ref_value(1);
        let raw = Raw::object_from([("count", Value::from(count.clone())), ("plain", Value::from(5))]);
        let view = proxy_refs(&Value::from(&raw)).unwrap();

        assert_eq!(view.get("count"), Value::from(1));
        assert_eq!(view.get("plain"), Value::from(5));

        assert!(view.set("count", 3));
        assert_eq!(count.value(), Value::from(3));
        assert!(is_ref(&raw.get("count")));

        assert!(view.set("plain", 6));
        assert_eq!(raw.get("plain"), Value::from(6));
    }

    #[test]
    fn proxy_refs_needs_a_container() {
        assert_eq!(
            proxy_refs(&Value::from(1)).unwrap_err(),
            Error::NotAContainer { found: "number" }
        );
    }

    #[test]
    fn unref_passes_plain_values_through() {
        assert_eq!(unref(&Value::from("x")), Value::from("x"));
        assert_eq!(unref(&Value::from(ref_value("y"))), Value::from("y"));
    }
}
