//! Raw Containers
//!
//! A [`Raw`] is the plain, unobserved data that reactive wrappers sit on top
//! of: either an object (an insertion-ordered property map with an optional
//! prototype) or an array. Every operation here is untracked and never
//! triggers; the proxy layer funnels its interception through these few
//! primitives.
//!
//! # Identity
//!
//! `Raw` is a shared handle. Cloning it clones the handle, not the data, and
//! two handles are the same container exactly when [`Raw::ptr_eq`] holds.
//! Each container carries a [`SourceId`] that keys its dependency map. When
//! the last handle goes away the container removes its dependency map and
//! proxy-cache entries.
//!
//! The dependency store holds running effects strongly. An effect whose
//! closure captures a proxy of this container therefore keeps the container
//! (and its dependency map) alive until the effect is stopped.
//!
//! # Accessors
//!
//! Object properties are either stored values or [`Accessor`]s. Reading an
//! accessor calls its getter with the receiver the read went through: the
//! container itself here, or the proxy in
//! [`Reactive::get`](super::Reactive::get).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::accessor::Accessor;
use super::handle::forget_proxies;
use super::key::Key;
use super::value::Value;
use crate::reactive::{Runtime, SourceId};

/// Highest index an array element may have.
const MAX_ARRAY_INDEX: usize = u32::MAX as usize - 1;

/// Longest an array may be.
const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Handle to a plain container.
///
/// An effect that captures a proxy of this container keeps it alive until
/// the effect is stopped; dropping the effect handle alone is not enough.
#[derive(Clone)]
pub struct Raw {
    cell: Rc<RawCell>,
}

struct RawCell {
    id: SourceId,
    data: RefCell<RawData>,
}

enum RawData {
    Object(ObjectData),
    Array(Vec<Value>),
}

#[derive(Default)]
struct ObjectData {
    props: IndexMap<Key, Slot>,
    proto: Option<Value>,
}

/// An own property as stored.
#[derive(Clone)]
pub(crate) enum Slot {
    Data(Value),
    Accessor(Accessor),
}

impl Slot {
    /// The property's value as seen through `receiver`.
    pub(crate) fn resolve(self, receiver: &Value) -> Value {
        match self {
            Slot::Data(value) => value,
            Slot::Accessor(accessor) => accessor.read(receiver),
        }
    }
}

impl Drop for RawCell {
    fn drop(&mut self) {
        Runtime::forget_source(self.id);
        forget_proxies(self.id);
    }
}

impl Raw {
    fn with_data(data: RawData) -> Self {
        Self {
            cell: Rc::new(RawCell {
                id: SourceId::new(),
                data: RefCell::new(data),
            }),
        }
    }

    /// An empty object.
    pub fn object() -> Self {
        Self::with_data(RawData::Object(ObjectData::default()))
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::with_data(RawData::Array(Vec::new()))
    }

    /// An object holding the given entries, in order.
    pub fn object_from<K, V, I>(entries: I) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let props = entries
            .into_iter()
            .map(|(k, v)| (k.into(), Slot::Data(v.into().to_raw())))
            .collect();
        Self::with_data(RawData::Object(ObjectData { props, proto: None }))
    }

    /// An array holding the given elements.
    pub fn array_from<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let items = items.into_iter().map(|v| v.into().to_raw()).collect();
        Self::with_data(RawData::Array(items))
    }

    /// The container's dependency-store identity.
    pub fn id(&self) -> SourceId {
        self.cell.id
    }

    pub fn ptr_eq(&self, other: &Raw) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn is_array(&self) -> bool {
        matches!(&*self.cell.data.borrow(), RawData::Array(_))
    }

    /// Current length if this is an array.
    pub fn array_len(&self) -> Option<usize> {
        match &*self.cell.data.borrow() {
            RawData::Array(items) => Some(items.len()),
            RawData::Object(_) => None,
        }
    }

    /// Number of elements (arrays) or own properties (objects).
    pub fn len(&self) -> usize {
        match &*self.cell.data.borrow() {
            RawData::Array(items) => items.len(),
            RawData::Object(obj) => obj.props.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An own property, without consulting the prototype chain. Accessors
    /// are read with this container as the receiver.
    pub fn get_own(&self, key: &Key) -> Option<Value> {
        let receiver = Value::Object(self.clone());
        self.own_slot(key).map(|slot| slot.resolve(&receiver))
    }

    /// An own property as stored. The borrow is released before returning,
    /// so the caller may run accessors that touch this container.
    pub(crate) fn own_slot(&self, key: &Key) -> Option<Slot> {
        match &*self.cell.data.borrow() {
            RawData::Object(obj) => obj.props.get(key).cloned(),
            RawData::Array(items) => match key {
                Key::Index(i) => items.get(*i).cloned().map(Slot::Data),
                k if k.is_length() => Some(Slot::Data(Value::from(items.len()))),
                _ => None,
            },
        }
    }

    pub fn has_own(&self, key: &Key) -> bool {
        match &*self.cell.data.borrow() {
            RawData::Object(obj) => obj.props.contains_key(key),
            RawData::Array(items) => match key {
                Key::Index(i) => *i < items.len(),
                k => k.is_length(),
            },
        }
    }

    /// Look a key up on this container and then along its prototype chain.
    ///
    /// Proxies on the chain are read through their raw target, so the lookup
    /// stays untracked.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let receiver = Value::Object(self.clone());
        let mut current = self.clone();
        loop {
            if let Some(slot) = current.own_slot(&key) {
                return slot.resolve(&receiver);
            }
            match current.prototype().and_then(|proto| proto.as_raw()) {
                Some(next) => current = next,
                None => return Value::Undefined,
            }
        }
    }

    /// Whether the key exists on the container or its prototype chain.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let mut current = self.clone();
        loop {
            if current.has_own(&key) {
                return true;
            }
            match current.prototype().and_then(|proto| proto.as_raw()) {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    /// Write a property. Returns `false` if the write is not representable
    /// (a named property on an array, an index or length beyond the array
    /// limits) or lands on an accessor without a setter.
    ///
    /// An accessor found on this container or its prototype chain gets the
    /// write, with this container as the receiver. Otherwise the value is
    /// stored as an own property. Writing past the end of an array pads it
    /// with `Undefined`; writing `length` truncates or pads.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into().to_raw();
        if let Some(accessor) = self.find_accessor(&key) {
            return accessor.write(&Value::Object(self.clone()), value);
        }
        self.write_own(key, value)
    }

    /// The accessor a write of `key` lands on, if the first definition of
    /// `key` along the chain is one.
    fn find_accessor(&self, key: &Key) -> Option<Accessor> {
        let mut current = self.clone();
        loop {
            match current.own_slot(key) {
                Some(Slot::Accessor(accessor)) => return Some(accessor),
                Some(Slot::Data(_)) => return None,
                None => current = current.prototype()?.as_raw()?,
            }
        }
    }

    /// Store `value` as an own data property, replacing whatever was there.
    pub(crate) fn write_own(&self, key: Key, value: Value) -> bool {
        // Overwritten values are dropped only after the borrow is released.
        let mut discarded = Vec::new();
        let mut replaced_slot = None;
        let written = {
            let mut data = self.cell.data.borrow_mut();
            match &mut *data {
                RawData::Object(obj) => {
                    replaced_slot = obj.props.insert(key, Slot::Data(value));
                    true
                }
                RawData::Array(items) => match key {
                    Key::Index(i) if i > MAX_ARRAY_INDEX => {
                        tracing::warn!(index = i, "array index out of range");
                        false
                    }
                    Key::Index(i) => match i.checked_add(1) {
                        Some(needed) => {
                            if needed > items.len() {
                                items.resize(needed, Value::Undefined);
                            }
                            discarded.push(std::mem::replace(&mut items[i], value));
                            true
                        }
                        None => false,
                    },
                    ref k if k.is_length() => match value.as_index() {
                        Some(len) if len > MAX_ARRAY_LENGTH => {
                            tracing::warn!(value = %value, "array length out of range");
                            false
                        }
                        Some(len) if len < items.len() => {
                            discarded = items.split_off(len);
                            true
                        }
                        Some(len) => {
                            items.resize(len, Value::Undefined);
                            true
                        }
                        None => {
                            tracing::warn!(value = %value, "invalid array length");
                            false
                        }
                    },
                    k => {
                        tracing::warn!(key = %k, "arrays only hold indexed elements");
                        false
                    }
                },
            }
        };
        drop(discarded);
        drop(replaced_slot);
        written
    }

    /// Define an accessor property on an object, replacing any own property
    /// of the same key. Arrays do not hold accessors.
    ///
    /// Definition is a plain write: nothing is notified.
    pub fn define_accessor(&self, key: impl Into<Key>, accessor: Accessor) -> bool {
        let key = key.into();
        let previous = match &mut *self.cell.data.borrow_mut() {
            RawData::Object(obj) => obj.props.insert(key, Slot::Accessor(accessor)),
            RawData::Array(_) => {
                tracing::warn!(key = %key, "arrays do not hold accessors");
                return false;
            }
        };
        drop(previous);
        true
    }

    /// Remove an own property. Returns whether the key was an own property.
    ///
    /// Deleting an array element leaves an `Undefined` hole; the length is
    /// not deletable.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let removed = {
            let mut data = self.cell.data.borrow_mut();
            match &mut *data {
                RawData::Object(obj) => obj.props.shift_remove(&key),
                RawData::Array(items) => match key {
                    Key::Index(i) if i < items.len() => {
                        Some(Slot::Data(std::mem::take(&mut items[i])))
                    }
                    _ => None,
                },
            }
        };
        removed.is_some()
    }

    /// Own enumerable keys: indices for arrays, property keys (symbols
    /// excluded) for objects.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.cell.data.borrow() {
            RawData::Object(obj) => obj
                .props
                .keys()
                .filter(|k| !k.is_symbol())
                .cloned()
                .collect(),
            RawData::Array(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    /// Own values in key order. Accessors are read with this container as
    /// the receiver.
    pub fn values(&self) -> Vec<Value> {
        let slots: Vec<Slot> = match &*self.cell.data.borrow() {
            RawData::Object(obj) => obj.props.values().cloned().collect(),
            RawData::Array(items) => return items.clone(),
        };
        let receiver = Value::Object(self.clone());
        slots
            .into_iter()
            .map(|slot| slot.resolve(&receiver))
            .collect()
    }

    pub fn prototype(&self) -> Option<Value> {
        match &*self.cell.data.borrow() {
            RawData::Object(obj) => obj.proto.clone(),
            RawData::Array(_) => None,
        }
    }

    /// Replace the prototype. The prototype may be a plain container or a
    /// proxy; anything else clears it. Arrays have no prototype.
    pub fn set_prototype(&self, proto: Option<Value>) {
        let proto = proto.filter(Value::is_container);
        // Keep the old prototype alive until the borrow is released.
        let _previous = match &mut *self.cell.data.borrow_mut() {
            RawData::Object(obj) => std::mem::replace(&mut obj.proto, proto),
            RawData::Array(_) => {
                tracing::warn!("arrays do not carry a prototype");
                None
            }
        };
    }
}

impl fmt::Debug for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_array() { "array" } else { "object" };
        f.debug_struct("Raw")
            .field("id", &self.cell.id)
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_properties_keep_insertion_order() {
        let raw = Raw::object_from([("b", 1), ("a", 2)]);
        raw.set("c", 3);
        raw.set("b", 4);
        assert_eq!(raw.keys(), vec![Key::from("b"), Key::from("a"), Key::from("c")]);
        assert_eq!(raw.get("b"), Value::from(4));
    }

    #[test]
    fn array_writes_pad_and_length_truncates() {
        let raw = Raw::array_from(["foo"]);
        assert!(raw.set(3usize, "bar"));
        assert_eq!(raw.array_len(), Some(4));
        assert_eq!(raw.get(1usize), Value::Undefined);

        assert!(raw.set("length", 1));
        assert_eq!(raw.values(), vec![Value::from("foo")]);

        assert!(!raw.set("length", -1));
        assert!(!raw.set("name", "x"));
        assert_eq!(raw.array_len(), Some(1));
    }

    #[test]
    fn deletes_report_own_keys_only() {
        let proto = Raw::object_from([("inherited", 1)]);
        let raw = Raw::object_from([("own", 1)]);
        raw.set_prototype(Some(Value::from(&proto)));

        assert!(raw.has("inherited"));
        assert!(!raw.has_own(&Key::from("inherited")));
        assert!(!raw.delete("inherited"));
        assert!(raw.delete("own"));
        assert!(!raw.delete("own"));
    }

    #[test]
    fn prototype_chain_lookup() {
        let grand = Raw::object_from([("x", 1)]);
        let parent = Raw::object();
        parent.set_prototype(Some(Value::from(&grand)));
        let child = Raw::object();
        child.set_prototype(Some(Value::from(&parent)));

        assert_eq!(child.get("x"), Value::from(1));
        assert_eq!(child.get("y"), Value::Undefined);
    }

    #[test]
    fn array_delete_leaves_hole() {
        let raw = Raw::array_from([1, 2]);
        assert!(raw.delete(0usize));
        assert_eq!(raw.array_len(), Some(2));
        assert_eq!(raw.get(0usize), Value::Undefined);
        assert!(!raw.delete("length"));
    }

    #[test]
    fn array_writes_beyond_limits_are_rejected() {
        let raw = Raw::array_from([1]);

        assert!(!raw.set(usize::MAX, 1));
        assert!(!raw.set("18446744073709551615", 1));
        assert!(!raw.set(MAX_ARRAY_INDEX + 1, 1));
        assert!(!raw.set("length", 1e12));
        assert!(!raw.set("length", MAX_ARRAY_LENGTH + 1));

        assert_eq!(raw.values(), vec![Value::from(1)]);
    }

    #[test]
    fn accessors_read_through_the_receiver() {
        let proto = Raw::object();
        proto.define_accessor(
            "greeting",
            Accessor::getter(|this| Value::from(format!("hi {}", this.get("name")))),
        );
        let child = Raw::object_from([("name", "rain")]);
        child.set_prototype(Some(Value::from(&proto)));

        assert_eq!(child.get("greeting"), Value::from("hi rain"));
        assert_eq!(child.get_own(&Key::from("greeting")), None);
        assert_eq!(proto.get("greeting"), Value::from("hi undefined"));
    }

    #[test]
    fn accessor_writes_go_to_the_setter() {
        let raw = Raw::object_from([("_n", 1)]);
        raw.define_accessor(
            "n",
            Accessor::getter(|this| this.get("_n")).with_setter(|this, value| {
                this.set("_n", value);
            }),
        );
        raw.define_accessor("fixed", Accessor::getter(|_| Value::from(0)));

        assert!(raw.set("n", 4));
        assert_eq!(raw.get("_n"), Value::from(4));
        assert_eq!(raw.values(), vec![Value::from(4), Value::from(4), Value::from(0)]);

        assert!(!raw.set("fixed", 1));
        assert_eq!(raw.get("fixed"), Value::from(0));
        assert!(!Raw::array().define_accessor("x", Accessor::getter(|_| Value::Null)));
    }
}
