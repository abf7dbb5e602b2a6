//! Recursive filter for upstream detail payloads.
//!
//! The harvested detail tree carries both source-language (`*C`) and
//! translated (`*T`) fields plus bulky media fields. Before storage the tree
//! is reduced to the translated, listing-relevant subset.

use serde_json::{Map, Value};

/// Keys removed at any depth regardless of suffix.
const EXCLUDED_KEYS: &[&str] = &["video", "description", "fromPlatform_logo", "picUrl", "titleT"];

/// Subtrees kept alive even when filtering empties them, because downstream
/// variant materialization reads them.
const PRESERVED_SUBTREES: &[&str] = &["specification", "specifications"];

fn is_excluded(key: &str) -> bool {
    EXCLUDED_KEYS.contains(&key)
}

fn is_preserved(key: &str) -> bool {
    PRESERVED_SUBTREES.contains(&key)
}

/// Filter a detail payload.
///
/// Drops every key ending in `"C"` (source-language duplicates) and the
/// excluded media keys, recursively. Objects that end up empty collapse to
/// `None`, except under a preserved subtree. A second pass re-enforces the
/// excluded-key rule, since a preserved branch can carry them back in.
pub fn filter_detail_json(value: &Value) -> Option<Value> {
    let mut filtered = filter_node(value, false)?;
    strip_excluded(&mut filtered);
    Some(filtered)
}

fn filter_node(value: &Value, preserved: bool) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map {
                if key.ends_with('C') || is_excluded(key) {
                    continue;
                }
                let child_preserved = preserved || is_preserved(key);
                if let Some(filtered) = filter_node(child, child_preserved) {
                    out.insert(key.clone(), filtered);
                }
            }
            if out.is_empty() && !preserved {
                None
            } else {
                Some(Value::Object(out))
            }
        }
        Value::Array(items) => {
            let filtered: Vec<Value> = items
                .iter()
                .filter_map(|item| filter_node(item, preserved))
                .collect();
            Some(Value::Array(filtered))
        }
        other => Some(other.clone()),
    }
}

fn strip_excluded(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !is_excluded(key) && !key.ends_with('C'));
            for child in map.values_mut() {
                strip_excluded(child);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_excluded(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_no_forbidden_keys(value: &Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    assert!(!key.ends_with('C'), "key {} ends with C", key);
                    assert!(!is_excluded(key), "excluded key {} survived", key);
                    assert_no_forbidden_keys(child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    assert_no_forbidden_keys(item);
                }
            }
            _ => {}
        }
    }

    #[test]
    fn test_filter_drops_source_language_and_media_keys() {
        let input = json!({
            "titleC": "中",
            "titleT": "日",
            "goodsInfo": {
                "specification": [
                    {"keyC": "x", "keyT": "色", "valueT": [{"name": "赤", "picUrl": "u"}]}
                ],
                "video": "v"
            }
        });

        let filtered = filter_detail_json(&input).unwrap();
        assert_eq!(
            filtered,
            json!({
                "goodsInfo": {
                    "specification": [
                        {"keyT": "色", "valueT": [{"name": "赤"}]}
                    ]
                }
            })
        );
        assert_no_forbidden_keys(&filtered);
    }

    #[test]
    fn test_filter_collapses_empty_objects() {
        let input = json!({
            "titleC": "only source fields",
            "nested": {"valueC": [1, 2]}
        });
        assert_eq!(filter_detail_json(&input), None);
    }

    #[test]
    fn test_filter_preserves_empty_specification() {
        let input = json!({
            "goodsInfo": {
                "specification": [{"keyC": "only-source"}],
                "unit": "piece"
            }
        });
        let filtered = filter_detail_json(&input).unwrap();
        // the specification branch survives even though filtering emptied it
        assert_eq!(
            filtered["goodsInfo"]["specification"],
            json!([{}])
        );
        assert_eq!(filtered["goodsInfo"]["unit"], json!("piece"));
    }

    #[test]
    fn test_filter_keeps_scalars_and_arrays() {
        let input = json!({
            "images": ["a.jpg", "b.jpg"],
            "goodsId": "123"
        });
        let filtered = filter_detail_json(&input).unwrap();
        assert_eq!(filtered["images"], json!(["a.jpg", "b.jpg"]));
        assert_eq!(filtered["goodsId"], json!("123"));
    }

    #[test]
    fn test_excluded_keys_removed_inside_preserved_subtree() {
        let input = json!({
            "goodsInfo": {
                "specification": [
                    {"keyT": "色", "valueT": [{"name": "赤", "picUrl": "http://img"}]}
                ]
            }
        });
        let filtered = filter_detail_json(&input).unwrap();
        assert_no_forbidden_keys(&filtered);
        assert_eq!(
            filtered["goodsInfo"]["specification"][0]["valueT"][0],
            json!({"name": "赤"})
        );
    }
}
