//! One-level structural equality
//!
//! Every place that pushes engine state into a binding's local snapshot gates
//! the update with [`shallow_equal`]. Two values are shallow-equal when they
//! have the same set of keys and every member compares equal. Members are
//! owned data here, so member comparison is plain `PartialEq`; nothing below
//! the first level is walked by the comparator itself.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde_json::{Map, Value};

/// One-level equality over keyed data.
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

/// Compare two optional values shallowly.
///
/// Absent on both sides is equal, absent on one side is not.
pub fn shallow_equal<T: ShallowEq + ?Sized>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::eq(a, b) || a.shallow_eq(b),
        _ => false,
    }
}

impl ShallowEq for Map<String, Value> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl ShallowEq for Value {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.shallow_eq(b),
            _ => self == other,
        }
    }
}

impl<K: Eq + Hash, V: PartialEq, S: std::hash::BuildHasher> ShallowEq for HashMap<K, V, S> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

impl<K: Ord, V: PartialEq> ShallowEq for BTreeMap<K, V> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

/// Implement [`ShallowEq`] for a struct by comparing the listed members.
///
/// ```ignore
/// impl_shallow_eq!(Point { x, y });
/// ```
#[macro_export]
macro_rules! impl_shallow_eq {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::shallow::ShallowEq for $ty {
            fn shallow_eq(&self, other: &Self) -> bool {
                true $(&& self.$field == other.$field)+
            }
        }
    };
}
