use std::cmp::Ordering;

/// Dynamic value stored in run state and used as condition literals.
pub use serde_json::Value;

/// Mutable run state, also the shape of a tool's update set.
pub type State = serde_json::Map<String, Value>;

/// Ordering between two values of the same kind.
///
/// Numbers compare numerically, strings lexicographically, booleans with
/// `false < true`, arrays element-wise, and two nulls are equal. Any other
/// pairing (mixed kinds, objects) is incomparable and yields `None`.
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Some(a.cmp(&b));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

/// Equality with numeric normalization, so `3` equals `3.0`.
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Object(_), Value::Object(_)) => lhs == rhs,
        _ => compare(lhs, rhs) == Some(Ordering::Equal),
    }
}

/// Render a value the way it appears in run logs.
pub fn render(state: &State) -> String {
    Value::Object(state.clone()).to_string()
}
