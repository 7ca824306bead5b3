//! Value shaping for the document store.
//!
//! The store holds integers as signed 64-bit values. Ciphering key lists
//! reported in `Subpackets` routinely exceed that, so they are persisted in
//! their string form.

use serde_json::{Map, Value};

pub const SUBPACKETS_KEY: &str = "Subpackets";
pub const CIPHERING_KEY_FIELDS: [&str; 2] = ["SRB Ciphering Keys", "DRB Ciphering Keys"];

/// Replace ciphering key entries of every subpacket with their compact JSON
/// text, e.g. `[1,2]` or `18446744073709551615`. String entries are left alone.
///
/// Returns the number of values rewritten.
pub fn stringify_ciphering_keys(fields: &mut Map<String, Value>) -> usize {
    let Some(Value::Array(subpackets)) = fields.get_mut(SUBPACKETS_KEY) else {
        return 0;
    };

    let mut rewritten = 0;
    for sub in subpackets.iter_mut().filter_map(Value::as_object_mut) {
        for key in CIPHERING_KEY_FIELDS {
            if let Some(v) = sub.get_mut(key) {
                if !v.is_string() {
                    *v = Value::String(v.to_string());
                    rewritten += 1;
                }
            }
        }
    }
    rewritten
}

/// Whether every number inside `value` fits the store's integer range.
pub fn is_storable(value: &Value) -> bool {
    first_unstorable(value, "").is_none()
}

/// Dotted path of the first value the store cannot hold, if any.
pub fn first_unstorable(value: &Value, path: &str) -> Option<String> {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_f64() {
                None
            } else {
                Some(path.to_string())
            }
        }
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .find_map(|(i, v)| first_unstorable(v, &join_path(path, &i.to_string()))),
        Value::Object(obj) => obj
            .iter()
            .find_map(|(k, v)| first_unstorable(v, &join_path(path, k))),
        _ => None,
    }
}

fn join_path(base: &str, part: &str) -> String {
    if base.is_empty() {
        part.to_string()
    } else {
        format!("{}.{}", base, part)
    }
}
