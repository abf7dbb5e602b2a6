//! Variant selector construction and SKU cartesian materialization.
//!
//! The upstream detail payload describes variation axes under
//! `goodsInfo.specification` and per-combination stock under
//! `goodsInfo.goodsInventory`. Selectors are translated into Japanese display
//! values; inventory keys are parsed and matched back against those display
//! values to price each cell of the cartesian.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::dto::listing::{SelectorValue, VariantSelector};
use crate::services::translator::{
    translate_display_name, translate_key_to_english, translate_variant_value, Translator,
    SELECTOR_VALUE_MAX_BYTES,
};
use crate::Result;

/// Marketplace cap on values per selector.
pub const SELECTOR_VALUE_LIMIT: usize = 40;

/// Separator between axis values inside an inventory combination key.
const INVENTORY_KEY_SEPARATOR: &str = "㊖㊎";

/// Delivery lead time attached to every stocked variant.
pub const NORMAL_DELIVERY_TIME_ID: i64 = 225554;

/// One inventory combination resolved against the selectors.
#[derive(Debug, Clone)]
pub struct InventoryEntry {
    /// Display value per selector, in selector order
    pub combination: Vec<String>,
    pub sku_id: String,
    pub unit_price: Option<f64>,
    pub amount_on_sale: Option<i64>,
}

/// An unpriced variant: one cell of the cartesian with its matched stock
/// entry. Pricing is applied by the materializer, which owns the settings.
#[derive(Debug, Clone)]
pub struct VariantDraft {
    pub sku_id: String,
    pub selector_values: BTreeMap<String, String>,
    pub unit_price: Option<f64>,
    pub amount_on_sale: Option<i64>,
}

/// Build the translated variant selectors from `goodsInfo.specification`.
///
/// Keys become snake_case English identifiers (deduplicated with a numeric
/// suffix when upstream repeats an axis); display names are Japanese; values
/// go through the normalization table / MT path and the 32-byte cap. Empty
/// axes are dropped and values are capped at the marketplace limit.
pub async fn build_variant_selectors(
    specification: &Value,
    translator: &dyn Translator,
) -> Result<Vec<VariantSelector>> {
    let entries = match specification.as_array() {
        Some(entries) => entries,
        None => return Ok(Vec::new()),
    };

    let mut selectors: Vec<VariantSelector> = Vec::new();
    let mut used_keys: HashSet<String> = HashSet::new();

    for entry in entries {
        let key_t = entry
            .get("keyT")
            .and_then(|k| k.as_str())
            .unwrap_or("")
            .trim();
        if key_t.is_empty() {
            continue;
        }

        let mut key = translate_key_to_english(translator, key_t).await;
        if key.is_empty() {
            continue;
        }
        if used_keys.contains(&key) {
            let mut n = 2;
            while used_keys.contains(&format!("{}_{}", key, n)) {
                n += 1;
            }
            key = format!("{}_{}", key, n);
        }

        let display_name = translate_display_name(translator, key_t).await?;

        let mut values: Vec<SelectorValue> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        if let Some(raw_values) = entry.get("valueT").and_then(|v| v.as_array()) {
            for raw in raw_values {
                let name = raw.get("name").and_then(|n| n.as_str()).unwrap_or("").trim();
                if name.is_empty() {
                    continue;
                }
                let display_value =
                    translate_variant_value(translator, name, SELECTOR_VALUE_MAX_BYTES).await?;
                if display_value.is_empty() || !seen.insert(display_value.clone()) {
                    continue;
                }
                values.push(SelectorValue { display_value });
                if values.len() >= SELECTOR_VALUE_LIMIT {
                    tracing::warn!(
                        key = %key,
                        "selector value count capped at {}",
                        SELECTOR_VALUE_LIMIT
                    );
                    break;
                }
            }
        }
        if values.is_empty() {
            continue;
        }

        used_keys.insert(key.clone());
        selectors.push(VariantSelector {
            key,
            display_name,
            values,
        });
    }

    Ok(selectors)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn normalized(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Match the translated tokens of one inventory key against the selectors.
///
/// For each selector, in order: exact equality, then case/space-insensitive
/// equality, then substring containment in either direction. A selector with
/// no matching token falls back to its first value. Each token is consumed
/// by at most one selector.
fn resolve_combination(tokens: &[String], selectors: &[VariantSelector]) -> Vec<String> {
    let mut available: Vec<Option<&String>> = tokens.iter().map(Some).collect();
    let mut combination = Vec::with_capacity(selectors.len());

    for selector in selectors {
        let mut chosen: Option<(usize, String)> = None;

        'stages: for stage in 0..3 {
            for (idx, slot) in available.iter().enumerate() {
                let token = match slot {
                    Some(token) => *token,
                    None => continue,
                };
                for value in &selector.values {
                    let display = &value.display_value;
                    let hit = match stage {
                        0 => token == display,
                        1 => normalized(token) == normalized(display),
                        _ => display.contains(token.as_str()) || token.contains(display.as_str()),
                    };
                    if hit {
                        chosen = Some((idx, display.clone()));
                        break 'stages;
                    }
                }
            }
        }

        match chosen {
            Some((idx, display)) => {
                available[idx] = None;
                combination.push(display);
            }
            None => {
                combination.push(selector.values[0].display_value.clone());
            }
        }
    }

    combination
}

/// Parse `goodsInfo.goodsInventory` and resolve each entry to a combination
/// of selector display values plus its SKU id, unit price and stock figure.
pub async fn build_inventory_entries(
    goods_inventory: &Value,
    selectors: &[VariantSelector],
    translator: &dyn Translator,
) -> Result<Vec<InventoryEntry>> {
    let raw_entries = match goods_inventory.as_array() {
        Some(entries) => entries,
        None => return Ok(Vec::new()),
    };
    if selectors.is_empty() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for raw in raw_entries {
        let key_t = raw.get("keyT").and_then(|k| k.as_str()).unwrap_or("");
        let mut tokens: Vec<String> = Vec::new();
        for piece in key_t.split(INVENTORY_KEY_SEPARATOR) {
            for token in piece.split_whitespace() {
                if !token.is_empty() {
                    tokens.push(token.to_string());
                }
            }
        }

        let mut translated = Vec::with_capacity(tokens.len());
        for token in &tokens {
            translated
                .push(translate_variant_value(translator, token, SELECTOR_VALUE_MAX_BYTES).await?);
        }

        let sku = match raw
            .get("valueT")
            .and_then(|v| v.as_array())
            .and_then(|v| v.first())
        {
            Some(sku) => sku,
            None => continue,
        };
        let sku_id = match sku.get("skuId").and_then(value_as_string) {
            Some(id) if !id.is_empty() => id,
            _ => continue,
        };

        entries.push(InventoryEntry {
            combination: resolve_combination(&translated, selectors),
            sku_id,
            unit_price: sku.get("price").and_then(value_as_f64),
            amount_on_sale: sku.get("amountOnSale").and_then(value_as_i64),
        });
    }

    Ok(entries)
}

/// Emit one draft variant per cell of the selector cartesian.
///
/// Exact combination matches take their SKU directly. A cell with no exact
/// match borrows the first entry sharing its first-selector value (the SKU id
/// is suffixed to stay unique); a cell with no partial match either is
/// skipped.
pub fn materialize_variants(
    selectors: &[VariantSelector],
    entries: &[InventoryEntry],
) -> Vec<VariantDraft> {
    if selectors.is_empty() {
        return Vec::new();
    }

    let index: HashMap<&[String], &InventoryEntry> = entries
        .iter()
        .map(|entry| (entry.combination.as_slice(), entry))
        .collect();

    let mut used_skus: HashSet<String> = HashSet::new();
    let mut drafts = Vec::new();

    for combination in cartesian(selectors) {
        let entry = match index.get(combination.as_slice()) {
            Some(entry) => *entry,
            None => match entries
                .iter()
                .find(|entry| entry.combination.first() == combination.first())
            {
                Some(entry) => entry,
                None => {
                    tracing::debug!(?combination, "no inventory match, combination skipped");
                    continue;
                }
            },
        };

        let mut sku_id = entry.sku_id.clone();
        if used_skus.contains(&sku_id) {
            let mut n = 2;
            while used_skus.contains(&format!("{}-{}", entry.sku_id, n)) {
                n += 1;
            }
            sku_id = format!("{}-{}", entry.sku_id, n);
        }
        used_skus.insert(sku_id.clone());

        let selector_values: BTreeMap<String, String> = selectors
            .iter()
            .zip(combination.iter())
            .map(|(selector, value)| (selector.key.clone(), value.clone()))
            .collect();

        drafts.push(VariantDraft {
            sku_id,
            selector_values,
            unit_price: entry.unit_price,
            amount_on_sale: entry.amount_on_sale,
        });
    }

    drafts
}

/// All combinations of selector display values, first selector varying
/// slowest.
fn cartesian(selectors: &[VariantSelector]) -> Vec<Vec<String>> {
    let mut combinations: Vec<Vec<String>> = vec![Vec::new()];
    for selector in selectors {
        let mut next = Vec::with_capacity(combinations.len() * selector.values.len());
        for combination in &combinations {
            for value in &selector.values {
                let mut extended = combination.clone();
                extended.push(value.display_value.clone());
                next.push(extended);
            }
        }
        combinations = next;
    }
    combinations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::translator::Lang;
    use async_trait::async_trait;
    use serde_json::json;

    /// Deterministic stand-in for DeepL: knows the handful of tokens the
    /// fixtures use.
    struct TableTranslator;

    #[async_trait]
    impl Translator for TableTranslator {
        async fn translate(&self, text: &str, _source: Option<Lang>, target: Lang) -> Result<String> {
            let out = match (text, target) {
                ("颜色", Lang::English) => "Color",
                ("尺码", Lang::English) => "Size",
                ("颜色", Lang::Japanese) => "カラー",
                ("尺码", Lang::Japanese) => "サイズ",
                (other, _) => other,
            };
            Ok(out.to_string())
        }
    }

    fn specification() -> Value {
        json!([
            {"keyT": "颜色", "valueT": [{"name": "黑色"}, {"name": "白色"}]},
            {"keyT": "尺码", "valueT": [{"name": "M"}, {"name": "L"}]}
        ])
    }

    fn goods_inventory() -> Value {
        json!([
            {"keyT": "黑色㊖㊎M", "valueT": [{"skuId": 1, "price": "10", "amountOnSale": 1200}]},
            {"keyT": "白色㊖㊎L", "valueT": [{"skuId": 2, "price": "12", "amountOnSale": 30}]}
        ])
    }

    #[tokio::test]
    async fn test_selectors_from_specification() {
        let selectors = build_variant_selectors(&specification(), &TableTranslator)
            .await
            .unwrap();
        assert_eq!(selectors.len(), 2);

        assert_eq!(selectors[0].key, "color");
        assert_eq!(selectors[0].display_name, "カラー");
        let colors: Vec<_> = selectors[0]
            .values
            .iter()
            .map(|v| v.display_value.as_str())
            .collect();
        assert_eq!(colors, vec!["ブラック", "ホワイト"]);

        assert_eq!(selectors[1].key, "size");
        assert_eq!(selectors[1].display_name, "サイズ");
        let sizes: Vec<_> = selectors[1]
            .values
            .iter()
            .map(|v| v.display_value.as_str())
            .collect();
        assert_eq!(sizes, vec!["M", "L"]);
    }

    #[tokio::test]
    async fn test_selector_values_respect_byte_cap() {
        let spec = json!([
            {"keyT": "颜色", "valueT": [{"name": "アイウエオカキクケコサシスセソタチツ"}]}
        ]);
        let selectors = build_variant_selectors(&spec, &TableTranslator).await.unwrap();
        assert_eq!(selectors.len(), 1);
        for selector in &selectors {
            for value in &selector.values {
                assert!(value.display_value.len() <= SELECTOR_VALUE_MAX_BYTES);
            }
        }
    }

    #[tokio::test]
    async fn test_duplicate_axis_keys_are_suffixed() {
        let spec = json!([
            {"keyT": "颜色", "valueT": [{"name": "黑色"}]},
            {"keyT": "颜色", "valueT": [{"name": "白色"}]}
        ]);
        let selectors = build_variant_selectors(&spec, &TableTranslator).await.unwrap();
        assert_eq!(selectors[0].key, "color");
        assert_eq!(selectors[1].key, "color_2");
    }

    #[tokio::test]
    async fn test_inventory_entries_resolve_combinations() {
        let selectors = build_variant_selectors(&specification(), &TableTranslator)
            .await
            .unwrap();
        let entries = build_inventory_entries(&goods_inventory(), &selectors, &TableTranslator)
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].combination, vec!["ブラック", "M"]);
        assert_eq!(entries[0].sku_id, "1");
        assert_eq!(entries[0].unit_price, Some(10.0));
        assert_eq!(entries[0].amount_on_sale, Some(1200));
        assert_eq!(entries[1].combination, vec!["ホワイト", "L"]);
    }

    #[tokio::test]
    async fn test_unmatched_token_falls_back_to_first_value() {
        let selectors = build_variant_selectors(&specification(), &TableTranslator)
            .await
            .unwrap();
        let inventory = json!([
            {"keyT": "謎トークン", "valueT": [{"skuId": 9, "price": 5}]}
        ]);
        let entries = build_inventory_entries(&inventory, &selectors, &TableTranslator)
            .await
            .unwrap();
        assert_eq!(entries[0].combination, vec!["ブラック", "M"]);
    }

    #[tokio::test]
    async fn test_cartesian_is_complete_and_bounded() {
        let selectors = build_variant_selectors(&specification(), &TableTranslator)
            .await
            .unwrap();
        let entries = build_inventory_entries(&goods_inventory(), &selectors, &TableTranslator)
            .await
            .unwrap();
        let drafts = materialize_variants(&selectors, &entries);

        // 2x2 cartesian, all cells covered via exact or partial matches
        assert_eq!(drafts.len(), 4);

        let all_combinations: HashSet<Vec<String>> = cartesian(&selectors).into_iter().collect();
        for draft in &drafts {
            let combination: Vec<String> = selectors
                .iter()
                .map(|s| draft.selector_values[&s.key].clone())
                .collect();
            assert!(all_combinations.contains(&combination));
        }

        // exact matches keep their SKUs; partial matches derive unique ones
        let skus: HashSet<_> = drafts.iter().map(|d| d.sku_id.clone()).collect();
        assert_eq!(skus.len(), 4);
        assert!(skus.contains("1"));
        assert!(skus.contains("2"));
    }

    #[tokio::test]
    async fn test_no_inventory_at_all_skips_every_combination() {
        let selectors = build_variant_selectors(&specification(), &TableTranslator)
            .await
            .unwrap();
        let drafts = materialize_variants(&selectors, &[]);
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_cartesian_size() {
        let selectors = vec![
            VariantSelector {
                key: "a".into(),
                display_name: "A".into(),
                values: vec![
                    SelectorValue {
                        display_value: "1".into(),
                    },
                    SelectorValue {
                        display_value: "2".into(),
                    },
                    SelectorValue {
                        display_value: "3".into(),
                    },
                ],
            },
            VariantSelector {
                key: "b".into(),
                display_name: "B".into(),
                values: vec![
                    SelectorValue {
                        display_value: "x".into(),
                    },
                    SelectorValue {
                        display_value: "y".into(),
                    },
                ],
            },
        ];
        assert_eq!(cartesian(&selectors).len(), 6);
    }
}
