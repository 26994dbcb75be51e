//! Semantic deep-equal for drift detection (§4.6): ignores map entries whose
//! value is null, normalizes numeric types, and otherwise compares
//! structurally.

use serde_json::Value;

/// True iff `observed` and `desired` are semantically equal: null-valued map
/// entries are ignored on both sides, and numbers compare by value rather
/// than by JSON representation (`1` == `1.0`).
pub fn semantically_equal(observed: &Value, desired: &Value) -> bool {
    match (observed, desired) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: std::collections::BTreeSet<&String> = a
                .iter()
                .chain(b.iter())
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect();
            keys.into_iter().all(|k| {
                let av = a.get(k).unwrap_or(&Value::Null);
                let bv = b.get(k).unwrap_or(&Value::Null);
                semantically_equal(av, bv)
            })
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| semantically_equal(x, y))
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;

    #[test]
    fn ignores_null_valued_map_entries() {
        let a = serde_json::json!({"spec": {"replicas": 1, "paused": null}});
        let b = serde_json::json!({"spec": {"replicas": 1}});
        assert!(semantically_equal(&a, &b));
    }

    #[test]
    fn normalizes_numeric_representation() {
        let a = serde_json::json!({"replicas": 1});
        let b = serde_json::json!({"replicas": 1.0});
        assert!(semantically_equal(&a, &b));
    }

    #[test]
    fn observed_state_structurally_includes_desired_fields() {
        let observed = serde_json::json!({
            "spec": {"replicas": 1, "paused": null},
            "status": {"readyReplicas": 1},
        });
        let desired = serde_json::json!({"spec": {"replicas": 1}});
        assert_json_include!(actual: observed, expected: desired);
    }

    #[test]
    fn detects_real_drift() {
        let a = serde_json::json!({"replicas": 1});
        let b = serde_json::json!({"replicas": 2});
        assert!(!semantically_equal(&a, &b));
    }

    #[test]
    fn detects_array_length_drift() {
        let a = serde_json::json!({"ports": [80]});
        let b = serde_json::json!({"ports": [80, 443]});
        assert!(!semantically_equal(&a, &b));
    }
}
