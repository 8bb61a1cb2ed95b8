//! Property keys.
//!
//! Containers are dynamically keyed. A key is a string, a numeric index or an
//! opaque symbol. Strings that spell a canonical non-negative integer are
//! normalized to [`Key::Index`] so that `"3"` and `3` name the same slot, the
//! same way array indices and numeric property names coincide.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

/// An opaque identity used as a property key.
///
/// Symbol keys are never tracked, which keeps internal lookups from creating
/// dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    id: u32,
    description: &'static str,
}

impl Symbol {
    /// Sentinel standing for "the own key set of an object as a whole".
    pub const ITERATE: Symbol = Symbol {
        id: 0,
        description: "iterate",
    };

    /// Create a fresh symbol, distinct from every other symbol.
    pub fn new(description: &'static str) -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description,
        }
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

/// A property key on a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Index(usize),
    Symbol(Symbol),
}

/// Synthetic key tracked by key enumeration and triggered by additions and
/// deletions only.
pub const ITERATE_KEY: Key = Key::Symbol(Symbol::ITERATE);

/// Name of the array length property.
pub(crate) const LENGTH: &str = "length";

/// Name of the sentinel property that exposes a proxy's raw target.
pub(crate) const RAW: &str = "raw";

impl Key {
    /// The array `length` key.
    pub fn length() -> Self {
        Key::Str(Rc::from(LENGTH))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Str(s) if &**s == LENGTH)
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Key::Symbol(_))
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse a canonical array index: digits only, no leading zero.
fn canonical_index(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    s.parse().ok()
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        match canonical_index(s) {
            Some(i) => Key::Index(i),
            None => Key::Str(Rc::from(s)),
        }
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::from(s.as_str())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<Symbol> for Key {
    fn from(s: Symbol) -> Self {
        Key::Symbol(s)
    }
}

impl From<&Key> for Key {
    fn from(k: &Key) -> Self {
        k.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Index(i) => write!(f, "{i}"),
            Key::Symbol(s) => write!(f, "Symbol({})", s.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_normalize_to_indices() {
        assert_eq!(Key::from("0"), Key::Index(0));
        assert_eq!(Key::from("42"), Key::Index(42));
        assert_eq!(Key::from("042"), Key::Str(Rc::from("042")));
        assert_eq!(Key::from("-1"), Key::Str(Rc::from("-1")));
        assert_eq!(Key::from(""), Key::Str(Rc::from("")));
    }

    #[test]
    fn length_key_is_recognized() {
        assert!(Key::from("length").is_length());
        assert!(Key::length().is_length());
        assert!(!Key::from("len").is_length());
    }

    #[test]
    fn symbols_are_unique() {
        let a = Symbol::new("a");
        let b = Symbol::new("a");
        assert_ne!(a, b);
        assert_ne!(Key::from(a), ITERATE_KEY);
        assert!(ITERATE_KEY.is_symbol());
        assert_eq!(ITERATE_KEY.to_string(), "Symbol(iterate)");
    }
}
