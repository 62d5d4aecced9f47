//! Dotted and indexed paths into form values
//!
//! Field names address nested values: `"customer.address[0].city"` is the
//! `city` key of the first element of `address` inside `customer`.

use serde_json::{Map, Value};

/// Whole-form values.
pub type Values = Map<String, Value>;

/// Largest array index [`set_in`] will grow an array to.
pub const MAX_INDEX: usize = 1 << 16;

/// Split a field name into path segments.
///
/// Brackets and dots are both separators; empty segments are dropped.
pub fn to_path(name: &str) -> Vec<&str> {
    name.split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn index_of(segment: &str) -> Option<usize> {
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        segment.parse().ok()
    } else {
        None
    }
}

/// Read the value at `name`, or `None` when any step is missing.
pub fn get_in<'a>(values: &'a Values, name: &str) -> Option<&'a Value> {
    let mut segments = to_path(name).into_iter();
    let mut current = values.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(index_of(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `name`, creating intermediate containers as needed.
///
/// Writing `None` deletes the key. Objects left empty by a deletion are
/// removed from their parent, so clearing the only nested field leaves `{}`
/// rather than `{"customer": {}}`. Arrays keep their length; a cleared
/// element becomes `null`.
///
/// A write through an index above [`MAX_INDEX`] is dropped.
pub fn set_in(values: &mut Values, name: &str, value: Option<Value>) {
    let segments = to_path(name);
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if value.is_some() && rest.iter().filter_map(|s| index_of(s)).any(|i| i > MAX_INDEX) {
        tracing::warn!(field = name, "index out of range; write ignored");
        return;
    }
    match value {
        Some(value) => {
            let slot = values.entry(first.to_string()).or_insert(Value::Null);
            write_at(slot, rest, value);
        }
        None => {
            if rest.is_empty() {
                values.remove(*first);
            } else if let Some(child) = values.get_mut(*first) {
                if remove_at(child, rest) {
                    values.remove(*first);
                }
            }
        }
    }
}

fn write_at(slot: &mut Value, rest: &[&str], value: Value) {
    let Some((segment, tail)) = rest.split_first() else {
        *slot = value;
        return;
    };
    if let Some(index) = index_of(segment) {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            write_at(&mut items[index], tail, value);
        }
    } else {
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            let child = map.entry(segment.to_string()).or_insert(Value::Null);
            write_at(child, tail, value);
        }
    }
}

/// Remove the value at `rest` below `slot`; returns whether `slot` became an
/// empty object and should itself be removed.
fn remove_at(slot: &mut Value, rest: &[&str]) -> bool {
    let Some((segment, tail)) = rest.split_first() else {
        return false;
    };
    match slot {
        Value::Object(map) => {
            if tail.is_empty() {
                map.remove(*segment);
            } else if let Some(child) = map.get_mut(*segment) {
                if remove_at(child, tail) {
                    map.remove(*segment);
                }
            }
            map.is_empty()
        }
        Value::Array(items) => {
            if let Some(child) = index_of(segment).and_then(|i| items.get_mut(i)) {
                if tail.is_empty() || remove_at(child, tail) {
                    *child = Value::Null;
                }
            }
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(value: Value) -> Values {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test helper expects an object"),
        }
    }

    #[test]
    fn test_to_path() {
        assert_eq!(to_path("a.b[0].c"), vec!["a", "b", "0", "c"]);
        assert_eq!(to_path("name"), vec!["name"]);
        assert!(to_path("").is_empty());
    }

    #[test]
    fn test_get_in() {
        let v = values(json!({"a": {"b": [{"c": 1}]}, "name": "erik"}));
        assert_eq!(get_in(&v, "a.b[0].c"), Some(&json!(1)));
        assert_eq!(get_in(&v, "name"), Some(&json!("erik")));
        assert_eq!(get_in(&v, "a.b[3].c"), None);
        assert_eq!(get_in(&v, "name.first"), None);
        assert_eq!(get_in(&v, ""), None);
    }

    #[test]
    fn test_set_in_creates_containers() {
        let mut v = Values::new();
        set_in(&mut v, "a.b[1]", Some(json!("x")));
        assert_eq!(Value::Object(v), json!({"a": {"b": [null, "x"]}}));
    }

    #[test]
    fn test_set_in_none_prunes_empty_objects() {
        let mut v = values(json!({"customer": {"name": "erik"}, "age": 3}));
        set_in(&mut v, "customer.name", None);
        assert_eq!(Value::Object(v.clone()), json!({"age": 3}));
        set_in(&mut v, "age", None);
        assert!(v.is_empty());
    }

    #[test]
    fn test_set_in_ignores_out_of_range_index() {
        let mut v = values(json!({"a": [1]}));
        set_in(&mut v, "a[18446744073709551615]", Some(json!(2)));
        set_in(&mut v, "b[99999999999]", Some(json!(2)));
        assert_eq!(Value::Object(v.clone()), json!({"a": [1]}));

        set_in(&mut v, "a[2]", Some(json!(3)));
        assert_eq!(Value::Object(v), json!({"a": [1, null, 3]}));
    }

    #[test]
    fn test_set_in_none_on_missing_path_is_noop() {
        let mut v = values(json!({"a": 1}));
        set_in(&mut v, "b.c", None);
        assert_eq!(Value::Object(v), json!({"a": 1}));
    }
}
