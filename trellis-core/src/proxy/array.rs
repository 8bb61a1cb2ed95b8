//! Array methods on reactive proxies.
//!
//! The search methods look through the wrapped elements first and then fall
//! back to the raw backing array with the argument unwrapped. A caller holding
//! a raw element finds it even though the proxy hands out wrapped elements.
//!
//! The mutating methods read `length` and shuffle indices as an
//! implementation detail. They run with tracking paused so that calling
//! `push` inside an effect does not make the effect depend on `length`;
//! otherwise two effects pushing onto the same array would re-trigger each
//! other forever. Their writes still go through [`Reactive::set`], so readers
//! of the array are notified as usual.

use super::handle::Reactive;
use super::key::Key;
use super::value::Value;
use crate::reactive::pause_tracking;

impl Reactive {
    /// Whether the array contains `value`. NaN finds NaN.
    pub fn includes(&self, value: impl Into<Value>) -> bool {
        self.search(&value.into(), false, true).is_some()
    }

    /// First index holding `value`.
    pub fn index_of(&self, value: impl Into<Value>) -> Option<usize> {
        self.search(&value.into(), false, false)
    }

    /// Last index holding `value`.
    pub fn last_index_of(&self, value: impl Into<Value>) -> Option<usize> {
        self.search(&value.into(), true, false)
    }

    fn search(&self, needle: &Value, from_end: bool, nan_matches: bool) -> Option<usize> {
        let matches =
            |item: &Value, needle: &Value| item.strict_eq(needle) || (nan_matches && item.is_nan() && needle.is_nan());

        let len = self.len();
        let order: Vec<usize> = if from_end {
            (0..len).rev().collect()
        } else {
            (0..len).collect()
        };

        if let Some(found) = order.iter().copied().find(|&i| matches(&self.get(i), needle)) {
            return Some(found);
        }

        let needle = needle.to_raw();
        let items = self.raw().values();
        order
            .into_iter()
            .find(|&i| items.get(i).is_some_and(|item| matches(item, &needle)))
    }

    fn rejects_mutation(&self, method: &'static str) -> bool {
        if self.is_readonly() {
            tracing::warn!(method, "mutation of read-only array ignored");
            return true;
        }
        if !self.is_array() {
            tracing::warn!(method, "array method called on an object");
            return true;
        }
        false
    }

    /// Append a value. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let _pause = pause_tracking();
        let len = self.len();
        if self.rejects_mutation("push") {
            return len;
        }
        self.set(len, value);
        len + 1
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Value {
        let _pause = pause_tracking();
        if self.rejects_mutation("pop") {
            return Value::Undefined;
        }
        let len = self.len();
        if len == 0 {
            return Value::Undefined;
        }
        let last = self.get(len - 1);
        self.set(Key::length(), len - 1);
        last
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Value {
        let _pause = pause_tracking();
        if self.rejects_mutation("shift") {
            return Value::Undefined;
        }
        let len = self.len();
        if len == 0 {
            return Value::Undefined;
        }
        let first = self.get(0usize);
        for i in 1..len {
            self.set(i - 1, self.raw().get(i));
        }
        self.set(Key::length(), len - 1);
        first
    }

    /// Prepend a value. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let _pause = pause_tracking();
        let len = self.len();
        if self.rejects_mutation("unshift") {
            return len;
        }
        for i in (0..len).rev() {
            self.set(i + 1, self.raw().get(i));
        }
        self.set(0usize, value);
        len + 1
    }

    /// Remove `delete_count` elements at `start` and insert `items` in their
    /// place. Returns the removed elements.
    ///
    /// `start` past the end appends; `delete_count` is clamped to the
    /// elements available.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        let _pause = pause_tracking();
        if self.rejects_mutation("splice") {
            return Vec::new();
        }
        let len = self.len();
        let start = start.min(len);
        let delete_count = delete_count.min(len - start);
        let inserted = items.len();

        let removed: Vec<Value> = (start..start + delete_count)
            .map(|i| self.raw().get(i))
            .collect();
        let tail: Vec<Value> = (start + delete_count..len)
            .map(|i| self.raw().get(i))
            .collect();

        for (offset, value) in items.into_iter().chain(tail).enumerate() {
            self.set(start + offset, value);
        }

        let new_len = len - delete_count + inserted;
        if new_len < len {
            self.set(Key::length(), new_len);
        }
        removed
    }
}
