//! PostgreSQL repository implementations.

pub mod canonical_product;
pub mod category;
pub mod origin_product;
pub mod schema;
pub mod settings;

pub use canonical_product::CanonicalProductRepositoryImpl;
pub use category::CategoryRepositoryImpl;
pub use origin_product::OriginProductRepositoryImpl;
pub use settings::SettingsRepositoryImpl;

/// Decode a JSONB column that must hold an array of strings. Numbers are
/// stringified; anything else is dropped with a log line.
pub(crate) fn json_string_array(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                other => {
                    tracing::warn!(?other, "dropping non-string entry in string array column");
                    None
                }
            })
            .collect(),
        Some(serde_json::Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::warn!(?other, "string array column held a scalar, wrapping");
            match other {
                serde_json::Value::String(s) => vec![s.clone()],
                serde_json::Value::Number(n) => vec![n.to_string()],
                _ => Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_string_array_accepts_mixed_entries() {
        let value = json!(["100371", 110729, null]);
        assert_eq!(json_string_array(Some(&value)), vec!["100371", "110729"]);
    }

    #[test]
    fn test_json_string_array_wraps_scalar() {
        let value = json!("100371");
        assert_eq!(json_string_array(Some(&value)), vec!["100371"]);
        assert!(json_string_array(None).is_empty());
    }
}
