//! Accessor properties.
//!
//! An accessor is an object property backed by a getter and an optional
//! setter instead of a stored value. Both are called with a receiver: the
//! value the property was reached through. Read through a proxy, the
//! receiver is that proxy, so whatever the getter reads through it is
//! tracked as a dependency of the reader.

use std::fmt;
use std::rc::Rc;

use super::value::Value;

type Getter = Rc<dyn Fn(&Value) -> Value>;
type Setter = Rc<dyn Fn(&Value, Value)>;

/// A computed property definition.
///
/// # Example
///
/// ```rust
/// use trellis_core::{reactive, Accessor, Raw, Value};
///
/// let raw = Raw::object_from([("_age", 1)]);
/// raw.define_accessor(
///     "age",
///     Accessor::getter(|this| this.get("_age"))
///         .with_setter(|this, value| {
///             this.set("_age", value);
///         }),
/// );
///
/// let person = reactive(&raw);
/// person.set("age", 5);
/// assert_eq!(person.get("_age"), Value::from(5));
/// ```
#[derive(Clone)]
pub struct Accessor {
    get: Getter,
    set: Option<Setter>,
}

impl Accessor {
    /// An accessor without a setter. Writes to it are rejected.
    pub fn getter(get: impl Fn(&Value) -> Value + 'static) -> Self {
        Self {
            get: Rc::new(get),
            set: None,
        }
    }

    pub fn with_setter(mut self, set: impl Fn(&Value, Value) + 'static) -> Self {
        self.set = Some(Rc::new(set));
        self
    }

    pub fn has_setter(&self) -> bool {
        self.set.is_some()
    }

    pub(crate) fn read(&self, receiver: &Value) -> Value {
        (self.get)(receiver)
    }

    /// Returns `false` if there is no setter.
    pub(crate) fn write(&self, receiver: &Value, value: Value) -> bool {
        match &self.set {
            Some(set) => {
                set(receiver, value);
                true
            }
            None => {
                tracing::warn!("write to an accessor without a setter ignored");
                false
            }
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("setter", &self.has_setter())
            .finish()
    }
}
