//! Reactive Proxies
//!
//! A [`Reactive`] wraps a [`Raw`] container and intercepts every access to
//! it: reads call [`Runtime::track`], writes and deletes call
//! [`Runtime::trigger`]. The same container can be seen through four
//! flavors of wrapper:
//!
//! | constructor          | nested values | writes          |
//! |----------------------|---------------|-----------------|
//! | [`reactive`]         | wrapped       | allowed         |
//! | [`shallow_reactive`] | returned raw  | allowed         |
//! | [`readonly`]         | wrapped, r/o  | warned, dropped |
//! | [`shallow_readonly`] | returned raw  | warned, dropped |
//!
//! # Identity
//!
//! Wrapping the same container twice with the same flavor yields the same
//! proxy for as long as a handle to it is alive, so proxies can be compared
//! by identity. The cache holds proxies weakly and is purged when the
//! container is released.
//!
//! # Prototype chains
//!
//! A container may inherit from another container or proxy. A write to a
//! key the target does not own is forwarded to the first proxy on the chain
//! together with the original receiver; the property is always defined on
//! the receiver's target, and only the proxy whose target *is* the
//! receiver's target triggers. Without that guard a single write through a
//! child would notify readers twice, once per level of the chain.
//!
//! Accessors found anywhere on the chain run with the receiver proxy, so a
//! getter reading `_age` through its receiver makes the reader of `age`
//! depend on `_age` as well.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::key::{Key, ITERATE_KEY, RAW};
use super::accessor::Accessor;
use super::raw::{Raw, Slot};
use super::value::{has_changed, Value};
use crate::reactive::{Runtime, SourceId, SourceKind, TriggerKind};

/// Behavior switches of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Flavor {
    /// Nested containers are returned unwrapped.
    shallow: bool,
    /// Writes are rejected and reads are not tracked.
    readonly: bool,
}

impl Flavor {
    const REACTIVE: Flavor = Flavor {
        shallow: false,
        readonly: false,
    };
    const SHALLOW_REACTIVE: Flavor = Flavor {
        shallow: true,
        readonly: false,
    };
    const READONLY: Flavor = Flavor {
        shallow: false,
        readonly: true,
    };
    const SHALLOW_READONLY: Flavor = Flavor {
        shallow: true,
        readonly: true,
    };
    const ALL: [Flavor; 4] = [
        Self::REACTIVE,
        Self::SHALLOW_REACTIVE,
        Self::READONLY,
        Self::SHALLOW_READONLY,
    ];
}

struct ProxyInner {
    target: Raw,
    flavor: Flavor,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let cache_key = (self.target.id(), self.flavor);
        let _ = PROXY_CACHE.try_with(|cache| {
            if let Ok(mut cache) = cache.try_borrow_mut() {
                let dead = cache
                    .get(&cache_key)
                    .is_some_and(|entry| entry.strong_count() == 0);
                if dead {
                    cache.remove(&cache_key);
                }
            }
        });
    }
}

thread_local! {
    static PROXY_CACHE: RefCell<HashMap<(SourceId, Flavor), Weak<ProxyInner>>> =
        RefCell::new(HashMap::new());
}

/// Purge every cached proxy of a released container.
pub(crate) fn forget_proxies(id: SourceId) {
    let _ = PROXY_CACHE.try_with(|cache| {
        if let Ok(mut cache) = cache.try_borrow_mut() {
            for flavor in Flavor::ALL {
                cache.remove(&(id, flavor));
            }
        }
    });
}

fn create(target: &Raw, flavor: Flavor) -> Reactive {
    let cache_key = (target.id(), flavor);
    let cached = PROXY_CACHE.with(|cache| cache.borrow().get(&cache_key).and_then(Weak::upgrade));
    if let Some(inner) = cached {
        return Reactive { inner };
    }

    let inner = Rc::new(ProxyInner {
        target: target.clone(),
        flavor,
    });
    PROXY_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .insert(cache_key, Rc::downgrade(&inner))
    });
    Reactive { inner }
}

/// Deep reactive proxy over `target`.
pub fn reactive(target: &Raw) -> Reactive {
    create(target, Flavor::REACTIVE)
}

/// Reactive proxy whose nested containers are returned unwrapped.
pub fn shallow_reactive(target: &Raw) -> Reactive {
    create(target, Flavor::SHALLOW_REACTIVE)
}

/// Deep read-only proxy over `target`.
pub fn readonly(target: &Raw) -> Reactive {
    create(target, Flavor::READONLY)
}

/// Read-only proxy whose nested containers are returned unwrapped.
pub fn shallow_readonly(target: &Raw) -> Reactive {
    create(target, Flavor::SHALLOW_READONLY)
}

enum WriteRoute {
    /// Store on the receiver's target.
    Receiver,
    /// Delegate to a proxy further up the chain.
    Parent(Reactive),
    /// Call the setter with the receiver.
    Accessor(Accessor),
}

/// A container seen through a tracking wrapper.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ProxyInner>,
}

impl Reactive {
    /// The wrapped container.
    pub fn raw(&self) -> &Raw {
        &self.inner.target
    }

    /// Dependency-store identity of the wrapped container.
    pub fn id(&self) -> SourceId {
        self.inner.target.id()
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.flavor.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.flavor.shallow
    }

    pub fn is_array(&self) -> bool {
        self.inner.target.is_array()
    }

    fn source_kind(&self) -> SourceKind {
        if self.is_array() {
            SourceKind::Array
        } else {
            SourceKind::Object
        }
    }

    /// Read a property.
    ///
    /// The `"raw"` key returns the wrapped container itself. Other keys are
    /// tracked (unless this proxy is read-only or the key is a symbol),
    /// looked up on the target and then along its prototype chain, and
    /// container results are wrapped in this proxy's flavor unless it is
    /// shallow.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if key.as_str() == Some(RAW) {
            return Value::Object(self.raw().clone());
        }
        self.get_with_receiver(&key, self)
    }

    fn get_with_receiver(&self, key: &Key, receiver: &Reactive) -> Value {
        if !self.is_readonly() && !key.is_symbol() {
            Runtime::track(self.id(), key);
        }

        let value = match self.raw().own_slot(key) {
            Some(slot) => slot.resolve(&Value::Proxy(receiver.clone())),
            None => self.inherited(key, receiver),
        };
        self.wrap(value)
    }

    /// Walk the prototype chain for a key the target does not own. A proxy
    /// on the chain answers through its own tracked lookup.
    fn inherited(&self, key: &Key, receiver: &Reactive) -> Value {
        let mut proto = self.raw().prototype();
        while let Some(link) = proto {
            match link {
                Value::Proxy(parent) => return parent.get_with_receiver(key, receiver),
                Value::Object(raw) => {
                    if let Some(slot) = raw.own_slot(key) {
                        return slot.resolve(&Value::Proxy(receiver.clone()));
                    }
                    proto = raw.prototype();
                }
                _ => break,
            }
        }
        Value::Undefined
    }

    fn wrap(&self, value: Value) -> Value {
        if self.is_shallow() {
            return value;
        }
        match value {
            Value::Object(raw) if self.is_readonly() => Value::Proxy(readonly(&raw)),
            Value::Object(raw) => Value::Proxy(reactive(&raw)),
            other => other,
        }
    }

    /// Whether the key exists on the target or its prototype chain. Tracks
    /// the key.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        Runtime::track(self.id(), &key);

        if self.raw().has_own(&key) {
            return true;
        }
        let mut proto = self.raw().prototype();
        while let Some(link) = proto {
            match link {
                Value::Proxy(parent) => return parent.has(&key),
                Value::Object(raw) => {
                    if raw.has_own(&key) {
                        return true;
                    }
                    proto = raw.prototype();
                }
                _ => break,
            }
        }
        false
    }

    /// Own enumerable keys, in order.
    ///
    /// Depends on the key set as a whole: the iteration key for objects,
    /// `length` for arrays. Plain value updates do not invalidate it.
    pub fn keys(&self) -> Vec<Key> {
        let key = if self.is_array() {
            Key::length()
        } else {
            ITERATE_KEY
        };
        Runtime::track(self.id(), &key);
        self.raw().keys()
    }

    /// Array length through a tracked `length` read, or the number of own
    /// keys of an object.
    pub fn len(&self) -> usize {
        if self.is_array() {
            self.get(Key::length()).as_index().unwrap_or_default()
        } else {
            self.keys().len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a property. Returns `false` if the write was rejected.
    ///
    /// Subscribers are notified only if the value actually changed; writing
    /// NaN over NaN is not a change. Proxies are stored unwrapped.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        self.set_with_receiver(key.into(), value.into().to_raw(), self)
    }

    fn set_with_receiver(&self, key: Key, value: Value, receiver: &Reactive) -> bool {
        if self.is_readonly() {
            tracing::warn!(%key, "write to read-only property ignored");
            return false;
        }

        let target = self.raw();
        let old = target.get(key.clone());
        let op = match (target.array_len(), key.as_index()) {
            (Some(len), Some(index)) if index >= len => TriggerKind::Add,
            (Some(_), _) => TriggerKind::Set,
            (None, _) if target.has_own(&key) => TriggerKind::Set,
            (None, _) => TriggerKind::Add,
        };

        let written = match self.write_route(&key) {
            WriteRoute::Receiver => receiver.raw().write_own(key.clone(), value.clone()),
            WriteRoute::Parent(parent) => {
                parent.set_with_receiver(key.clone(), value.clone(), receiver)
            }
            WriteRoute::Accessor(accessor) => {
                accessor.write(&Value::Proxy(receiver.clone()), value.clone())
            }
        };

        if written && target.ptr_eq(receiver.raw()) && has_changed(&old, &value) {
            Runtime::trigger(self.id(), self.source_kind(), &key, op, Some(&value));
        }
        written
    }

    /// Where a write of `key` lands: the first definition of `key` along
    /// the chain decides, and an undefined key goes to the first proxy on
    /// the chain or, failing that, to the receiver.
    fn write_route(&self, key: &Key) -> WriteRoute {
        let mut slot = self.raw().own_slot(key);
        let mut proto = self.raw().prototype();
        loop {
            match slot {
                Some(Slot::Accessor(accessor)) => return WriteRoute::Accessor(accessor),
                Some(Slot::Data(_)) => return WriteRoute::Receiver,
                None => {}
            }
            match proto {
                Some(Value::Proxy(parent)) => return WriteRoute::Parent(parent),
                Some(Value::Object(raw)) => {
                    slot = raw.own_slot(key);
                    proto = raw.prototype();
                }
                _ => return WriteRoute::Receiver,
            }
        }
    }

    /// Delete an own property. Returns `false` if the delete was rejected.
    ///
    /// Only deleting a key the target actually owned notifies anyone.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if self.is_readonly() {
            tracing::warn!(%key, "delete of read-only property ignored");
            return false;
        }

        let had_key = self.raw().delete(key.clone());
        if had_key {
            Runtime::trigger(
                self.id(),
                self.source_kind(),
                &key,
                TriggerKind::Delete,
                None,
            );
        }
        true
    }

    /// Replace the target's prototype.
    pub fn set_prototype(&self, proto: Option<Value>) -> bool {
        if self.is_readonly() {
            tracing::warn!("prototype change on read-only proxy ignored");
            return false;
        }
        self.raw().set_prototype(proto);
        true
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.inner.target)
            .field("shallow", &self.inner.flavor.shallow)
            .field("readonly", &self.inner.flavor.readonly)
            .finish()
    }
}

/// True for writable proxies.
pub fn is_reactive(value: &Value) -> bool {
    value.as_proxy().is_some_and(|p| !p.is_readonly())
}

/// True for read-only proxies.
pub fn is_readonly(value: &Value) -> bool {
    value.as_proxy().is_some_and(Reactive::is_readonly)
}

/// True for shallow proxies.
pub fn is_shallow(value: &Value) -> bool {
    value.as_proxy().is_some_and(Reactive::is_shallow)
}

/// True for any proxy.
pub fn is_proxy(value: &Value) -> bool {
    value.as_proxy().is_some()
}

/// The value with any proxy wrapper removed.
pub fn to_raw(value: &Value) -> Value {
    value.to_raw()
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
    fn same_target_same_proxy() {
        let raw = Raw::object();
        let a = reactive(&raw);
        let b = reactive(&raw);
        assert_eq!(a, b);
        assert_ne!(a, readonly(&raw));
        assert_eq!(readonly(&raw), readonly(&raw));
    }

    #[test]
    fn raw_sentinel_returns_target() {
        let raw = Raw::object_from([("raw", 1)]);
        let proxy = reactive(&raw);
        assert_eq!(proxy.get("raw"), Value::from(&raw));
    }

    #[test]
    fn nested_values_follow_flavor() {
        let inner = Raw::object_from([("b", 1)]);
        let raw = Raw::object_from([("a", Value::from(&inner))]);

        assert!(is_reactive(&reactive(&raw).get("a")));
        assert!(is_readonly(&readonly(&raw).get("a")));
        assert_eq!(shallow_reactive(&raw).get("a"), Value::from(&inner));
        assert_eq!(shallow_readonly(&raw).get("a"), Value::from(&inner));
    }

    #[test]
    fn proxies_are_stored_unwrapped() {
        let inner = Raw::object();
        let proxy = reactive(&Raw::object());
        proxy.set("child", reactive(&inner));
        assert_eq!(proxy.raw().get("child"), Value::from(&inner));
        assert_eq!(proxy.get("child"), Value::from(reactive(&inner)));
    }

    #[test]
    fn readonly_rejects_writes() {
        let raw = Raw::object_from([("a", 1)]);
        let ro = readonly(&raw);
        assert!(!ro.set("a", 2));
        assert!(!ro.delete("a"));
        assert_eq!(ro.get("a"), Value::from(1));
    }

    #[test]
    fn readonly_reads_are_untracked() {
        let raw = Raw::object_from([("a", 1)]);
        let ro = readonly(&raw);
        let e = effect(move || {
            ro.get("a");
        });
        assert_eq!(e.dependency_count(), 0);
    }

    #[test]
    fn symbol_keys_are_untracked() {
        let sym = crate::proxy::Symbol::new("internal");
        let raw = Raw::object_from([(sym, 1)]);
        let proxy = reactive(&raw);
        let e = effect(move || {
            proxy.get(sym);
        });
        assert_eq!(e.dependency_count(), 0);
    }

    #[test]
    fn deleting_a_missing_key_does_not_trigger() {
        let proxy = reactive(&Raw::object_from([("a", 1)]));
        let runs = Rc::new(Cell::new(0));
        let e = effect({
            let proxy = proxy.clone();
            let runs = runs.clone();
            move || {
                proxy.keys();
                runs.set(runs.get() + 1);
            }
        });

        proxy.delete("missing");
        assert_eq!(runs.get(), 1);
        proxy.delete("a");
        assert_eq!(runs.get(), 2);
        e.stop();
    }

    #[test]
    fn inherited_accessor_reads_the_receiver() {
        let proto = Raw::object();
        proto.define_accessor("label", Accessor::getter(|this| this.get("name")));
        let child = reactive(&Raw::object_from([("name", "a")]));
        child.set_prototype(Some(Value::from(&proto)));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let e = effect({
            let child = child.clone();
            let seen = seen.clone();
            move || seen.borrow_mut().push(child.get("label"))
        });

        child.set("name", "b");
        assert_eq!(*seen.borrow(), vec![Value::from("a"), Value::from("b")]);
        e.stop();
    }

    #[test]
    fn accessor_without_setter_rejects_proxy_writes() {
        let raw = Raw::object();
        raw.define_accessor("zero", Accessor::getter(|_| Value::from(0)));
        let proxy = reactive(&raw);

        assert!(!proxy.set("zero", 1));
        assert_eq!(proxy.get("zero"), Value::from(0));
    }

    #[test]
    fn proxy_cache_is_purged_with_the_target() {
        let raw = Raw::object();
        let id = raw.id();
        let proxy = reactive(&raw);
        drop(raw);
        drop(proxy);

        let cached = PROXY_CACHE.with(|cache| cache.borrow().contains_key(&(id, Flavor::REACTIVE)));
        assert!(!cached);
    }
}
