// ABOUTME: Partial-merge updates for options records.
// ABOUTME: Unset fields keep their prior value; unknown fields are rejected.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum OptionError {
    #[error("Unknown option field: {0}")]
    UnknownField(String),

    #[error("Option field {0} is not a table")]
    NotATable(String),

    #[error("Invalid option value: {0}")]
    InvalidValue(#[from] serde_json::Error),

    #[error("Invalid charset: {0}")]
    InvalidCharset(String),
}

/// Merge `patch` over `current` and return the updated record.
/// Nested tables merge field by field. `current` is untouched on error.
pub fn merge_options<T>(current: &T, patch: &Map<String, Value>) -> Result<T, OptionError>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(current)?;
    merge_into(&mut value, patch, "")?;
    Ok(serde_json::from_value(value)?)
}

/// Turn a dotted field path (`bloom.intensity`) and a value into a patch table.
pub fn patch_for_path(field: &str, value: Value) -> Map<String, Value> {
    let mut parts: Vec<&str> = field.split('.').collect();
    let last = parts.pop().unwrap_or_default();
    let mut patch = Map::new();
    patch.insert(last.to_string(), value);
    for part in parts.into_iter().rev() {
        let mut outer = Map::new();
        outer.insert(part.to_string(), Value::Object(patch));
        patch = outer;
    }
    patch
}

fn merge_into(target: &mut Value, patch: &Map<String, Value>, path: &str) -> Result<(), OptionError> {
    let Value::Object(fields) = target else {
        return Err(OptionError::NotATable(path.to_string()));
    };

    for (key, incoming) in patch {
        let name = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        let Some(slot) = fields.get_mut(key) else {
            return Err(OptionError::UnknownField(name));
        };
        match incoming {
            Value::Object(inner) if slot.is_object() => merge_into(slot, inner, &name)?,
            _ => *slot = incoming.clone(),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Inner {
        enabled: bool,
        amount: f32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Outer {
        size: f32,
        name: String,
        inner: Inner,
    }

    fn sample() -> Outer {
        Outer {
            size: 12.0,
            name: "a".to_string(),
            inner: Inner {
                enabled: false,
                amount: 0.5,
            },
        }
    }

    #[test]
    fn unset_fields_keep_prior_values() {
        let patch = json!({ "size": 16.0 });
        let merged = merge_options(&sample(), patch.as_object().unwrap()).unwrap();
        assert_eq!(merged.size, 16.0);
        assert_eq!(merged.name, "a");
        assert_eq!(merged.inner, sample().inner);
    }

    #[test]
    fn nested_tables_merge_field_by_field() {
        let patch = json!({ "inner": { "enabled": true } });
        let merged = merge_options(&sample(), patch.as_object().unwrap()).unwrap();
        assert!(merged.inner.enabled);
        assert_eq!(merged.inner.amount, 0.5);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let patch = json!({ "inner": { "missing": 1 } });
        let err = merge_options(&sample(), patch.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, OptionError::UnknownField(ref f) if f == "inner.missing"));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let patch = json!({ "size": "large" });
        let err = merge_options(&sample(), patch.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, OptionError::InvalidValue(_)));
    }

    #[test]
    fn dotted_path_builds_nested_patch() {
        let patch = patch_for_path("inner.amount", json!(0.9));
        assert_eq!(Value::Object(patch.clone()), json!({ "inner": { "amount": 0.9 } }));
        let merged = merge_options(&sample(), &patch).unwrap();
        assert_eq!(merged.inner.amount, 0.9);
    }
}
