//! Recursive overlay of JSON values.
//!
//! Objects merge key by key. Everything else (strings, numbers, booleans,
//! null, arrays) replaces whatever was there.

use serde_json::{Map, Value};

/// Overlay `source` onto `target` in place and return `target`.
///
/// Keys that exist only in `target` are left alone. When `source[key]` is an
/// object the merge recurses, creating `target[key] = {}` first if the key is
/// missing or holds a non-object. Arrays are never merged element-wise.
///
/// A non-object `source` leaves `target` untouched. A non-object `target`
/// merged with an object `source` becomes an object first.
pub fn merge<'a>(target: &'a mut Value, source: &Value) -> &'a mut Value {
    let Value::Object(source) = source else {
        return target;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = &mut *target {
        merge_map(target_map, source);
    }
    target
}

/// Same as [`merge`], operating directly on object maps.
pub fn merge_map(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if value.is_object() {
            let slot = target
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            merge(slot, value);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}
