use serde::Serialize;
use serde_json::Value;

/// Turn a tree of optional CLI values into a figment layer: unset values
/// (`null`), empty lists and sections left empty by that are dropped, so
/// only flags the operator actually gave override the lower layers.
pub fn prune_unset<T: Serialize>(input: T) -> Value {
    let mut value = serde_json::to_value(input).unwrap_or(Value::Null);
    prune_recursive(&mut value);
    value
}

fn prune_recursive(value: &mut Value) {
    if let Value::Object(map) = value {
        for child in map.values_mut() {
            prune_recursive(child);
        }
        map.retain(|_, child| match child {
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            _ => true,
        });
    }
}
