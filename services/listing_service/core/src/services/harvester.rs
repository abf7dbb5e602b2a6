//! Upstream marketplace adapter trait and the defensive response parsing.

use async_trait::async_trait;
use serde_json::Value;

use crate::dto::harvest::{
    KeywordSearchRequest, MultiCategorySearchResult, RawProduct, SearchPage,
};
use crate::repositories::origin_product::NewOriginProduct;
use crate::Result;
use shared_error::AppError;

#[async_trait]
pub trait Harvester: Send + Sync {
    /// Keyword (or category, via `category_id`) search.
    async fn keyword_search(&self, request: &KeywordSearchRequest) -> Result<SearchPage>;

    /// Fetch one product's detail payload, already normalized and filtered.
    async fn product_detail(&self, goods_id: &str, shop_type: &str) -> Result<Option<Value>>;

    /// Reverse image lookup: upload a base64 image, get back an image id and
    /// search link.
    async fn image_lookup(&self, image_base64: &str) -> Result<Option<Value>>;
}

/// Extract the product list from a search response.
///
/// The upstream API has returned the list under several shapes over time;
/// all four are traversed before giving up:
/// `data.result.result`, `data.result` (direct array), `data.products`,
/// `data.data.result`.
pub fn parse_search_response(response: &Value) -> Result<SearchPage> {
    if !response
        .get("success")
        .and_then(|s| s.as_bool())
        .unwrap_or(false)
    {
        let error = response
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        return Err(AppError::upstream(None, error, Some(response.clone())));
    }

    let data = response.get("data").cloned().unwrap_or(Value::Null);
    let mut total: i64 = 0;
    let mut products_value: Option<Vec<Value>> = None;

    if let Some(data_obj) = data.as_object() {
        if let Some(result) = data_obj.get("result") {
            if let Some(result_obj) = result.as_object() {
                total = result_obj.get("total").and_then(|t| t.as_i64()).unwrap_or(0);
                if let Some(inner) = result_obj.get("result").and_then(|r| r.as_array()) {
                    products_value = Some(inner.clone());
                }
            } else if let Some(direct) = result.as_array() {
                products_value = Some(direct.clone());
            }
        }
        if products_value.is_none() {
            if let Some(products) = data_obj.get("products").and_then(|p| p.as_array()) {
                total = data_obj.get("total").and_then(|t| t.as_i64()).unwrap_or(0);
                products_value = Some(products.clone());
            }
        }
        if products_value.is_none() {
            if let Some(inner_data) = data_obj.get("data").and_then(|d| d.as_object()) {
                if let Some(inner) = inner_data.get("result").and_then(|r| r.as_array()) {
                    total = inner_data.get("total").and_then(|t| t.as_i64()).unwrap_or(0);
                    products_value = Some(inner.clone());
                }
            }
        }
    }

    let raw_products = match products_value {
        Some(list) => list,
        None => {
            tracing::warn!("no products found in search response");
            return Ok(SearchPage::default());
        }
    };

    let mut products = Vec::with_capacity(raw_products.len());
    for raw in raw_products {
        // goodsId may arrive as a number
        let mut raw = raw;
        let numeric_id = raw
            .get("goodsId")
            .filter(|goods_id| goods_id.is_number())
            .map(|goods_id| goods_id.to_string());
        if let Some(goods_id) = numeric_id {
            raw["goodsId"] = Value::String(goods_id);
        }
        match serde_json::from_value::<RawProduct>(raw) {
            Ok(product) => products.push(product),
            Err(e) => tracing::warn!(error = %e, "skipping unparsable product record"),
        }
    }

    if total == 0 {
        total = products.len() as i64;
    }
    Ok(SearchPage { total, products })
}

/// Search several categories sequentially, isolating per-category failures.
pub async fn search_multiple_categories(
    harvester: &dyn Harvester,
    category_ids: &[String],
    template: &KeywordSearchRequest,
) -> MultiCategorySearchResult {
    let mut result = MultiCategorySearchResult::default();

    for category_id in category_ids {
        let mut request = template.clone();
        request.keywords = String::new();
        request.category_id = Some(category_id.clone());

        match harvester.keyword_search(&request).await {
            Ok(page) => {
                result.total_found += page.total;
                result.successful_categories += 1;
                for mut product in page.products {
                    product.source_category_id = Some(category_id.clone());
                    result.products.push(product);
                }
            }
            Err(e) => {
                tracing::warn!(category_id = %category_id, error = %e, "category search failed");
                result.failed_category_ids.push(category_id.clone());
            }
        }
    }

    result
}

/// Project a raw detail payload onto the documented shape.
///
/// Best effort: unknown fields are dropped, list entries that are not
/// objects are skipped, ids are coerced to strings. The result still carries
/// the source-language fields; storage applies
/// [`crate::services::detail_filter::filter_detail_json`] on top.
pub fn normalize_detail_payload(payload: &Value) -> Value {
    let as_string = |value: Option<&Value>| -> Value {
        match value {
            Some(Value::String(s)) => Value::String(s.clone()),
            Some(Value::Number(n)) => Value::String(n.to_string()),
            _ => Value::Null,
        }
    };

    let goods_info = payload
        .get("goodsInfo")
        .and_then(|g| g.as_object())
        .cloned()
        .unwrap_or_default();

    let coerce_entries = |entries: Option<&Value>| -> Value {
        let mut out = Vec::new();
        if let Some(entries) = entries.and_then(|e| e.as_array()) {
            for entry in entries {
                if let Some(entry) = entry.as_object() {
                    out.push(serde_json::json!({
                        "startQuantity": entry.get("startQuantity").cloned().unwrap_or(Value::Null),
                        "price": entry.get("price").cloned().unwrap_or(Value::Null),
                        "amountOnSale": entry.get("amountOnSale").cloned().unwrap_or(Value::Null),
                        "skuId": entry.get("skuId").cloned().unwrap_or(Value::Null),
                        "specId": entry.get("specId").cloned().unwrap_or(Value::Null),
                    }));
                }
            }
        }
        Value::Array(out)
    };

    let coerce_named = |entries: Option<&Value>| -> Value {
        let mut out = Vec::new();
        if let Some(entries) = entries.and_then(|e| e.as_array()) {
            for entry in entries {
                if let Some(entry) = entry.as_object() {
                    out.push(serde_json::json!({
                        "name": entry.get("name").cloned().unwrap_or(Value::Null),
                        "picUrl": entry.get("picUrl").cloned().unwrap_or(Value::Null),
                    }));
                }
            }
        }
        Value::Array(out)
    };

    let mut specification = Vec::new();
    if let Some(entries) = goods_info.get("specification").and_then(|s| s.as_array()) {
        for entry in entries {
            if let Some(entry) = entry.as_object() {
                specification.push(serde_json::json!({
                    "keyC": entry.get("keyC").cloned().unwrap_or(Value::Null),
                    "keyT": entry.get("keyT").cloned().unwrap_or(Value::Null),
                    "valueC": coerce_named(entry.get("valueC")),
                    "valueT": coerce_named(entry.get("valueT")),
                }));
            }
        }
    }

    let mut goods_inventory = Vec::new();
    if let Some(entries) = goods_info.get("goodsInventory").and_then(|s| s.as_array()) {
        for entry in entries {
            if let Some(entry) = entry.as_object() {
                goods_inventory.push(serde_json::json!({
                    "keyC": entry.get("keyC").cloned().unwrap_or(Value::Null),
                    "keyT": entry.get("keyT").cloned().unwrap_or(Value::Null),
                    "valueC": coerce_entries(entry.get("valueC")),
                    "valueT": coerce_entries(entry.get("valueT")),
                }));
            }
        }
    }

    serde_json::json!({
        "fromUrl": payload.get("fromUrl").cloned().unwrap_or(Value::Null),
        "fromPlatform": payload.get("fromPlatform").cloned().unwrap_or(Value::Null),
        "shopId": as_string(payload.get("shopId")),
        "shopName": payload.get("shopName").cloned().unwrap_or(Value::Null),
        "goodsId": as_string(payload.get("goodsId")),
        "titleC": payload.get("titleC").cloned().unwrap_or(Value::Null),
        "titleT": payload.get("titleT").cloned().unwrap_or(Value::Null),
        "images": payload.get("images").and_then(|i| i.as_array()).cloned().map(Value::Array).unwrap_or_else(|| Value::Array(vec![])),
        "address": payload.get("address").cloned().unwrap_or(Value::Null),
        "goodsInfo": ({
            let mut info = serde_json::Map::new();
            info.insert("unit".into(), goods_info.get("unit").cloned().unwrap_or(Value::Null));
            info.insert(
                "minOrderQuantity".into(),
                goods_info.get("minOrderQuantity").cloned().unwrap_or(Value::Null),
            );
            info.insert("specification".into(), Value::Array(specification));
            info.insert("goodsInventory".into(), Value::Array(goods_inventory));
            Value::Object(info)
        })
    })
}

/// Map one raw search record into an origin upsert row.
pub fn raw_to_origin(raw: &RawProduct, keyword: Option<&str>) -> NewOriginProduct {
    NewOriginProduct {
        product_id: raw.goods_id.clone(),
        title_c: raw.title_c.clone(),
        title_t: raw.title_t.clone(),
        main_category: raw.top_category_id.clone(),
        middle_category: raw.second_category_id.clone(),
        type_tag: raw.shop_type.clone(),
        monthly_sales: raw.month_sold,
        wholesale_price: raw.goods_price,
        weight: None,
        length: None,
        width: None,
        height: None,
        size: None,
        creation_date: raw.create_date.clone(),
        repurchase_rate: raw.repurchase_rate,
        rating_score: raw.trade_score,
        detail_json: raw.detail.clone(),
        keyword: keyword.map(|k| k.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_result_shape() {
        let response = json!({
            "success": true,
            "data": {"result": {"total": 2, "result": [
                {"goodsId": "1", "titleT": "A"},
                {"goodsId": 2, "titleT": "B"}
            ]}}
        });
        let page = parse_search_response(&response).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.products.len(), 2);
        assert_eq!(page.products[1].goods_id, "2");
    }

    #[test]
    fn test_parse_direct_array_shape() {
        let response = json!({
            "success": true,
            "data": {"result": [{"goodsId": "1"}]}
        });
        let page = parse_search_response(&response).unwrap();
        assert_eq!(page.products.len(), 1);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_parse_products_shape() {
        let response = json!({
            "success": true,
            "data": {"total": 5, "products": [{"goodsId": "9"}]}
        });
        let page = parse_search_response(&response).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.products[0].goods_id, "9");
    }

    #[test]
    fn test_parse_double_nested_shape() {
        let response = json!({
            "success": true,
            "data": {"data": {"total": 1, "result": [{"goodsId": "7"}]}}
        });
        let page = parse_search_response(&response).unwrap();
        assert_eq!(page.products[0].goods_id, "7");
    }

    #[test]
    fn test_parse_failure_flag() {
        let response = json!({"success": false, "error": "bad sign"});
        let err = parse_search_response(&response).unwrap_err();
        assert!(err.to_string().contains("bad sign"));
    }

    #[test]
    fn test_parse_unknown_shape_is_empty_not_error() {
        let response = json!({"success": true, "data": {"unexpected": true}});
        let page = parse_search_response(&response).unwrap();
        assert!(page.products.is_empty());
    }

    #[tokio::test]
    async fn test_multi_category_search_isolates_failures() {
        use crate::services::test_support::FakeHarvester;

        let harvester = FakeHarvester::default();
        harvester.pages.lock().unwrap().insert(
            "cat-a".to_string(),
            SearchPage {
                total: 2,
                products: vec![
                    RawProduct {
                        goods_id: "a1".into(),
                        ..Default::default()
                    },
                    RawProduct {
                        goods_id: "a2".into(),
                        ..Default::default()
                    },
                ],
            },
        );
        harvester
            .fail_keywords
            .lock()
            .unwrap()
            .push("cat-b".to_string());

        let template = KeywordSearchRequest::for_keyword("ignored");
        let result = search_multiple_categories(
            &harvester,
            &["cat-a".to_string(), "cat-b".to_string()],
            &template,
        )
        .await;

        assert_eq!(result.successful_categories, 1);
        assert_eq!(result.failed_category_ids, vec!["cat-b"]);
        assert_eq!(result.total_found, 2);
        assert_eq!(result.products.len(), 2);
        assert_eq!(
            result.products[0].source_category_id.as_deref(),
            Some("cat-a")
        );
    }

    #[test]
    fn test_normalize_detail_projects_known_fields() {
        let raw = json!({
            "fromUrl": "https://detail.1688.com/offer/1.html",
            "goodsId": 42,
            "titleT": "日本語",
            "images": ["a.jpg"],
            "unexpected_top": true,
            "goodsInfo": {
                "unit": "piece",
                "specification": [
                    {"keyT": "色", "valueT": [{"name": "赤", "picUrl": "p", "junk": 1}], "junk": 2},
                    "not-an-object"
                ],
                "goodsInventory": [
                    {"keyT": "赤", "valueT": [{"skuId": 1, "price": "3.5", "amountOnSale": 10, "junk": 3}]}
                ]
            }
        });
        let normalized = normalize_detail_payload(&raw);
        assert_eq!(normalized["goodsId"], json!("42"));
        assert!(normalized.get("unexpected_top").is_none());
        assert_eq!(
            normalized["goodsInfo"]["specification"][0]["valueT"][0],
            json!({"name": "赤", "picUrl": "p"})
        );
        assert_eq!(
            normalized["goodsInfo"]["goodsInventory"][0]["valueT"][0]["skuId"],
            json!(1)
        );
        assert_eq!(normalized["goodsInfo"]["specification"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_raw_to_origin_mapping() {
        let raw = RawProduct {
            goods_id: "g1".into(),
            title_t: Some("ワンピース".into()),
            goods_price: Some(12.5),
            month_sold: Some(300),
            top_category_id: Some("10".into()),
            second_category_id: Some("1020".into()),
            trade_score: Some(4.8),
            ..Default::default()
        };
        let origin = raw_to_origin(&raw, Some("dress"));
        assert_eq!(origin.product_id, "g1");
        assert_eq!(origin.wholesale_price, Some(12.5));
        assert_eq!(origin.main_category.as_deref(), Some("10"));
        assert_eq!(origin.middle_category.as_deref(), Some("1020"));
        assert_eq!(origin.rating_score, Some(4.8));
        assert_eq!(origin.keyword.as_deref(), Some("dress"));
        assert!(origin.validate().is_ok());
    }
}
