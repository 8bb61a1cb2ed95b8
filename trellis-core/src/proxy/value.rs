//! Dynamic values stored in containers.
//!
//! Containers hold [`Value`]s. Primitives compare by value; containers,
//! proxies and refs compare by identity, which is what the change detection
//! in the proxy layer relies on.

use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::proxy::handle::{reactive, Reactive};
use crate::proxy::key::Key;
use crate::proxy::raw::Raw;
use crate::reactive::Ref;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A plain, unwrapped container.
    Object(Raw),
    /// A container seen through a reactive wrapper.
    Proxy(Reactive),
    /// A ref handle. Auto-unwrapping views match on this variant.
    Ref(Ref),
}

/// Whether a write of `new` over `old` counts as a change.
///
/// Strict inequality, except that two NaNs are treated as equal so that
/// writing NaN over NaN does not notify anyone.
pub fn has_changed(old: &Value, new: &Value) -> bool {
    !old.strict_eq(new) && !(old.is_nan() && new.is_nan())
}

impl Value {
    /// Name of the dynamic type, used in diagnostics and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(raw) if raw.is_array() => "array",
            Value::Object(_) => "object",
            Value::Proxy(p) if p.raw().is_array() => "array",
            Value::Proxy(_) => "object",
            Value::Ref(_) => "ref",
        }
    }

    /// Strict equality: primitives by value (NaN is unequal to itself),
    /// everything else by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    /// True for plain containers and proxies.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Reactive> {
        match self {
            Value::Proxy(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_ref_handle(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// The backing container, seeing through proxies.
    pub fn as_raw(&self) -> Option<Raw> {
        match self {
            Value::Object(raw) => Some(raw.clone()),
            Value::Proxy(p) => Some(p.raw().clone()),
            _ => None,
        }
    }

    /// Interpret the value as an array length or index: a finite,
    /// non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Strip a proxy wrapper, leaving every other value untouched.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Proxy(p) => Value::Object(p.raw().clone()),
            other => other.clone(),
        }
    }

    /// Read a property of whatever this value is: tracked through a proxy,
    /// untracked on a plain container, `Undefined` on anything else.
    ///
    /// This is how accessors read their receiver.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Value::Proxy(p) => p.get(key),
            Value::Object(raw) => raw.get(key),
            _ => Value::Undefined,
        }
    }

    /// Write a property through a proxy or onto a plain container. Returns
    /// `false` for primitives and rejected writes.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self {
            Value::Proxy(p) => p.set(key, value),
            Value::Object(raw) => raw.set(key, value),
            _ => false,
        }
    }

    /// Make the value reactive.
    ///
    /// Plain containers get a deep reactive wrapper; proxies are returned as
    /// they are. Primitives cannot be wrapped.
    pub fn to_reactive(&self) -> Result<Reactive> {
        match self {
            Value::Object(raw) => Ok(reactive(raw)),
            Value::Proxy(p) => Ok(p.clone()),
            other => {
                tracing::warn!(found = other.type_name(), "value cannot be made reactive");
                Err(Error::NotAContainer {
                    found: other.type_name(),
                })
            }
        }
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(raw) => write!(f, "Object({raw:?})"),
            Value::Proxy(p) => write!(f, "Proxy({p:?})"),
            Value::Ref(r) => write!(f, "Ref({r:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Object(raw) if raw.is_array() => {
                let items: Vec<String> = raw.values().iter().map(display_element).collect();
                f.write_str(&items.join(","))
            }
            Value::Proxy(p) => Value::Object(p.raw().clone()).fmt(f),
            Value::Object(_) | Value::Ref(_) => f.write_str("[object Object]"),
        }
    }
}

/// Array elements that are undefined or null render as empty strings.
fn display_element(value: &Value) -> String {
    match value {
        Value::Undefined | Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Raw> for Value {
    fn from(raw: Raw) -> Self {
        Value::Object(raw)
    }
}

impl From<&Raw> for Value {
    fn from(raw: &Raw) -> Self {
        Value::Object(raw.clone())
    }
}

impl From<Reactive> for Value {
    fn from(p: Reactive) -> Self {
        Value::Proxy(p)
    }
}

impl From<&Reactive> for Value {
    fn from(p: &Reactive) -> Self {
        Value::Proxy(p.clone())
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Undefined, Into::into)
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| value.mismatch("number"))
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| value.mismatch("boolean"))
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            other => Err(other.mismatch("string")),
        }
    }
}

impl TryFrom<Value> for Reactive {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Proxy(p) => Ok(p),
            other => Err(other.mismatch("proxy")),
        }
    }
}
