//! Hand-rolled fakes shared by the service unit tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::dto::harvest::{KeywordSearchRequest, SearchPage};
use crate::dto::listing::{
    InventoryPayload, InventoryVariant, ItemImage, ListQuery, OperationLeadTime,
    ProductDescription, Variant,
};
use crate::dto::rakuten::{ApiCallResult, PricePatchBody, RakutenItemPayload};
use crate::models::{CanonicalProduct, OriginProduct, RakutenStatus, RegistrationStatus};
use crate::repositories::canonical_product::CanonicalProductRepository;
use crate::repositories::origin_product::{DimensionField, NewOriginProduct, OriginProductRepository};
use crate::repositories::settings::SettingsRepository;
use crate::services::content::{ContentGenerator, ContentInput, GeneratedContent};
use crate::services::harvester::Harvester;
use crate::services::images::{ImagePipeline, ProcessedImageOutcome, StoredImageReader};
use crate::services::marketplace::{
    CabinetResult, InventoryUpsertRequest, MarketplaceClient,
};
use crate::services::selectors::NORMAL_DELIVERY_TIME_ID;
use crate::services::translator::{Lang, Translator};
use crate::models::PricingSettings;
use crate::Result;
use shared_error::AppError;

pub fn origin_product(product_id: &str) -> OriginProduct {
    OriginProduct {
        product_id: product_id.to_string(),
        title_c: Some("连衣裙".to_string()),
        title_t: Some("ワンピース".to_string()),
        main_category: Some("10".to_string()),
        middle_category: Some("1020".to_string()),
        type_tag: Some("1688".to_string()),
        monthly_sales: Some(500),
        wholesale_price: Some(8.0),
        weight: Some(0.5),
        length: None,
        width: None,
        height: None,
        size: Some(60),
        creation_date: None,
        repurchase_rate: None,
        rating_score: None,
        detail_json: None,
        registration_status: RegistrationStatus::Unregistered,
        r_cat_id: vec![],
        keyword: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn canonical_product(item_number: &str) -> CanonicalProduct {
    let mut variants = BTreeMap::new();
    variants.insert(
        "1".to_string(),
        Variant {
            selector_values: BTreeMap::from([("color".to_string(), "ブラック".to_string())]),
            standard_price: "990".to_string(),
            article_number: None,
            attributes: None,
            shipping: None,
            features: None,
            normal_delivery_date_id: None,
        },
    );
    CanonicalProduct {
        item_number: item_number.to_string(),
        title: "テスト商品".to_string(),
        tagline: Some("キャッチコピー".to_string()),
        product_description: ProductDescription {
            pc: "PC説明".to_string(),
            sp: "SP説明".to_string(),
        },
        sales_description: Some("販売説明".to_string()),
        images: vec![ItemImage {
            image_type: "CABINET".to_string(),
            location: "/img01306503/01306503_0.jpg".to_string(),
            alt: Some("テスト商品".to_string()),
        }],
        variant_selectors: vec![],
        variants,
        inventory: Some(InventoryPayload {
            manage_number: item_number.to_string(),
            variants: vec![InventoryVariant {
                variant_id: "1".to_string(),
                quantity: 100,
                mode: "ABSOLUTE".to_string(),
                operation_lead_time: Some(OperationLeadTime {
                    normal_delivery_time_id: NORMAL_DELIVERY_TIME_ID,
                }),
            }],
        }),
        features: None,
        payment: None,
        layout: None,
        item_type: "NORMAL".to_string(),
        hide_item: true,
        unlimited_inventory_flag: false,
        genre_id: Some("201198".to_string()),
        r_cat_id: vec!["100371".to_string()],
        rakuten_registration_status: None,
        image_registration_status: None,
        inventory_registration_status: None,
        rakuten_registered_at: None,
        registration_error: None,
        actual_purchase_price: None,
        change_status: None,
        block: false,
        src_url: None,
        main_category: Some("10".to_string()),
        middle_category: Some("1020".to_string()),
        product_image_code: Some("01306503".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// In-memory canonical repository mirroring the status-stamping rules of the
/// real one.
#[derive(Default)]
pub struct FakeCanonicalRepo {
    pub rows: Mutex<HashMap<String, CanonicalProduct>>,
}

impl FakeCanonicalRepo {
    pub fn with(products: Vec<CanonicalProduct>) -> Self {
        let rows = products
            .into_iter()
            .map(|p| (p.item_number.clone(), p))
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn get(&self, item_number: &str) -> Option<CanonicalProduct> {
        self.rows.lock().unwrap().get(item_number).cloned()
    }
}

#[async_trait]
impl CanonicalProductRepository for FakeCanonicalRepo {
    async fn upsert_with_origin_status(&self, product: &CanonicalProduct) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert(product.item_number.clone(), product.clone());
        Ok(())
    }

    async fn find_by_item_number(&self, item_number: &str) -> Result<Option<CanonicalProduct>> {
        Ok(self.get(item_number))
    }

    async fn list(&self, _query: &ListQuery) -> Result<Vec<CanonicalProduct>> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn delete(&self, item_numbers: &[String]) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut removed = 0;
        for item in item_numbers {
            if rows.remove(item).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn update_hide_item(&self, item_numbers: &[String], hidden: bool) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for item in item_numbers {
            if let Some(row) = rows.get_mut(item) {
                if RakutenStatus::allows_hide_toggle(row.rakuten_registration_status) {
                    row.hide_item = hidden;
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn remove_image(&self, item_number: &str, location: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(item_number) {
            let before = row.images.len();
            let target = location.trim();
            row.images.retain(|image| image.location.trim() != target);
            return Ok(row.images.len() < before);
        }
        Ok(false)
    }

    async fn set_rakuten_status(
        &self,
        item_number: &str,
        status: Option<RakutenStatus>,
        error: Option<&str>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(item_number)
            .ok_or_else(|| AppError::NotFound(item_number.to_string()))?;
        match status {
            Some(RakutenStatus::True) => {
                if row.rakuten_registered_at.is_none() {
                    row.rakuten_registered_at = Some(Utc::now());
                }
            }
            Some(RakutenStatus::Deleted) => {
                row.rakuten_registered_at = None;
            }
            _ => {}
        }
        row.rakuten_registration_status = status;
        row.registration_error = error.map(|e| e.to_string());
        Ok(())
    }

    async fn set_image_registration_status(&self, item_number: &str, status: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(item_number) {
            row.image_registration_status = Some(status.to_string());
        }
        Ok(())
    }

    async fn set_inventory_registration_status(
        &self,
        item_number: &str,
        status: &str,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(item_number) {
            row.inventory_registration_status = Some(status.to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeOriginRepo {
    pub rows: Mutex<HashMap<String, OriginProduct>>,
}

impl FakeOriginRepo {
    pub fn with(products: Vec<OriginProduct>) -> Self {
        let rows = products
            .into_iter()
            .map(|p| (p.product_id.clone(), p))
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn get(&self, product_id: &str) -> Option<OriginProduct> {
        self.rows.lock().unwrap().get(product_id).cloned()
    }
}

#[async_trait]
impl OriginProductRepository for FakeOriginRepo {
    async fn upsert_batch(&self, products: &[NewOriginProduct]) -> Result<usize> {
        let mut rows = self.rows.lock().unwrap();
        let mut written = 0;
        for record in products {
            if record.validate().is_err() {
                continue;
            }
            let mut row = origin_product(&record.product_id);
            row.title_c = record.title_c.clone();
            row.title_t = record.title_t.clone();
            row.detail_json = record.detail_json.clone();
            if let Some(existing) = rows.get(&record.product_id) {
                row.registration_status = existing.registration_status;
                row.created_at = existing.created_at.min(row.created_at);
            }
            rows.insert(record.product_id.clone(), row);
            written += 1;
        }
        Ok(written)
    }

    async fn find_by_id(&self, product_id: &str) -> Result<Option<OriginProduct>> {
        Ok(self.get(product_id))
    }

    async fn find_by_ids(&self, product_ids: &[String]) -> Result<Vec<OriginProduct>> {
        let rows = self.rows.lock().unwrap();
        Ok(product_ids
            .iter()
            .filter_map(|id| rows.get(id).cloned())
            .collect())
    }

    async fn set_registration_status(
        &self,
        product_ids: &[String],
        status: RegistrationStatus,
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for id in product_ids {
            if let Some(row) = rows.get_mut(id) {
                row.registration_status = status;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn propagate_dimension(
        &self,
        _category_ids: &[String],
        _field: DimensionField,
        _value: Option<f64>,
    ) -> Result<u64> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct FakeSettingsRepo {
    pub settings: Mutex<PricingSettings>,
}

impl FakeSettingsRepo {
    pub fn with(settings: PricingSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

#[async_trait]
impl SettingsRepository for FakeSettingsRepo {
    async fn load_pricing(&self) -> Result<PricingSettings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn save_pricing(&self, settings: &PricingSettings) -> Result<()> {
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }
}

/// Translation table covering the fixture vocabulary.
pub struct FixtureTranslator;

#[async_trait]
impl Translator for FixtureTranslator {
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

pub struct FixtureContentGenerator;

#[async_trait]
impl ContentGenerator for FixtureContentGenerator {
    async fn generate(&self, input: &ContentInput) -> Result<GeneratedContent> {
        let base = input
            .title_t
            .clone()
            .or_else(|| input.title_c.clone())
            .unwrap_or_default();
        Ok(GeneratedContent {
            title: format!("{} 高品質 送料無料", base),
            catchphrase: format!("{}の新作", base),
            description: format!("{}の説明です。", base),
            sales_description: "お買い得です。".to_string(),
        })
    }
}

pub struct FixtureImagePipeline;

#[async_trait]
impl ImagePipeline for FixtureImagePipeline {
    async fn process_images(
        &self,
        urls: &[String],
        product_image_code: &str,
    ) -> Result<Vec<ProcessedImageOutcome>> {
        Ok(urls
            .iter()
            .enumerate()
            .map(|(i, url)| ProcessedImageOutcome {
                original_url: url.clone(),
                processed_url: None,
                relative_path: format!(
                    "/img{}/{}_{}.jpg",
                    product_image_code, product_image_code, i
                ),
            })
            .collect())
    }
}

pub struct FixtureImageReader;

#[async_trait]
impl StoredImageReader for FixtureImageReader {
    async fn read(&self, _location: &str) -> Result<Vec<u8>> {
        // smallest valid JPEG header prefix; enough for upload fakes
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10])
    }
}

/// Scripted marketplace client that records every call.
#[derive(Default)]
pub struct FakeMarketplaceClient {
    pub upsert_result: Mutex<Option<ApiCallResult>>,
    pub patch_result: Mutex<Option<ApiCallResult>>,
    pub delete_result: Mutex<Option<ApiCallResult>>,
    pub get_result: Mutex<Option<ApiCallResult>>,
    pub category_result: Mutex<Option<ApiCallResult>>,
    pub inventory_results: Mutex<Vec<ApiCallResult>>,
    pub calls: Mutex<Vec<String>>,
    pub patch_bodies: Mutex<Vec<PricePatchBody>>,
}

impl FakeMarketplaceClient {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn take_or_ok(&self, slot: &Mutex<Option<ApiCallResult>>, url: &str) -> ApiCallResult {
        slot.lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ApiCallResult::ok(url, None))
    }
}

#[async_trait]
impl MarketplaceClient for FakeMarketplaceClient {
    async fn product_upsert(
        &self,
        manage_number: &str,
        _payload: &RakutenItemPayload,
    ) -> ApiCallResult {
        self.record("product_upsert");
        self.take_or_ok(&self.upsert_result, manage_number)
    }

    async fn product_price_patch(
        &self,
        manage_number: &str,
        body: &PricePatchBody,
    ) -> ApiCallResult {
        self.record("product_price_patch");
        self.patch_bodies.lock().unwrap().push(body.clone());
        self.take_or_ok(&self.patch_result, manage_number)
    }

    async fn product_delete(&self, manage_number: &str) -> ApiCallResult {
        self.record("product_delete");
        self.take_or_ok(&self.delete_result, manage_number)
    }

    async fn product_get(&self, manage_number: &str) -> ApiCallResult {
        self.record("product_get");
        self.take_or_ok(&self.get_result, manage_number)
    }

    async fn category_map(
        &self,
        manage_number: &str,
        _category_ids: &[String],
        _main_plural_category_id: Option<&str>,
    ) -> ApiCallResult {
        self.record("category_map");
        self.take_or_ok(&self.category_result, manage_number)
    }

    async fn cabinet_create_folder(
        &self,
        _folder_name: &str,
        _directory_name: Option<&str>,
        _upper_folder_id: Option<i64>,
    ) -> CabinetResult {
        self.record("cabinet_create_folder");
        CabinetResult {
            success: true,
            id: Some(19946),
            result_code: Some(0),
            error: None,
        }
    }

    async fn cabinet_upload_file(
        &self,
        _file_name: &str,
        _file_path_name: Option<&str>,
        _folder_id: i64,
        _data: &[u8],
        _overwrite: bool,
    ) -> CabinetResult {
        self.record("cabinet_upload_file");
        CabinetResult {
            success: true,
            id: Some(101517460),
            result_code: Some(0),
            error: None,
        }
    }

    async fn inventory_upsert(
        &self,
        manage_number: &str,
        _variant_id: &str,
        _request: &InventoryUpsertRequest,
    ) -> ApiCallResult {
        self.record("inventory_upsert");
        let mut scripted = self.inventory_results.lock().unwrap();
        if scripted.is_empty() {
            ApiCallResult::ok(manage_number, None)
        } else {
            scripted.remove(0)
        }
    }
}

/// Harvester fake serving a canned page for every request.
#[derive(Default)]
pub struct FakeHarvester {
    pub pages: Mutex<HashMap<String, SearchPage>>,
    pub fail_keywords: Mutex<Vec<String>>,
}

#[async_trait]
impl Harvester for FakeHarvester {
    async fn keyword_search(&self, request: &KeywordSearchRequest) -> Result<SearchPage> {
        let key = request
            .category_id
            .clone()
            .unwrap_or_else(|| request.keywords.clone());
        if self.fail_keywords.lock().unwrap().contains(&key) {
            return Err(AppError::Transient("search failed".into()));
        }
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn product_detail(
        &self,
        _goods_id: &str,
        _shop_type: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn image_lookup(&self, _image_base64: &str) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
}

/// Category repository fake backed by a plain vector.
#[derive(Default)]
pub struct FakeCategoryRepo {
    pub categories: Mutex<Vec<crate::models::Category>>,
}

impl FakeCategoryRepo {
    pub fn with(categories: Vec<crate::models::Category>) -> Self {
        Self {
            categories: Mutex::new(categories),
        }
    }
}

#[async_trait]
impl crate::repositories::category::CategoryRepository for FakeCategoryRepo {
    async fn list(&self) -> Result<Vec<crate::models::Category>> {
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn create(
        &self,
        category: &crate::repositories::category::NewCategory,
    ) -> Result<crate::models::Category> {
        let mut categories = self.categories.lock().unwrap();
        let id = categories.len() as i64 + 1;
        let row = crate::models::Category {
            id,
            category_name: category.category_name.clone(),
            category_ids: category.category_ids.clone(),
            rakuten_category_ids: category.rakuten_category_ids.clone(),
            genre_id: category.genre_id.clone(),
            primary_category_id: category.primary_category_id,
            weight: category.weight,
            length: category.length,
            width: category.width,
            height: category.height,
            size_option: category.size_option.clone(),
            size: category.size,
            attributes: category.attributes.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        categories.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        id: i64,
        patch: &crate::repositories::category::CategoryPatch,
    ) -> Result<crate::models::Category> {
        let mut categories = self.categories.lock().unwrap();
        let row = categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound(format!("category {}", id)))?;
        if let Some(name) = &patch.category_name {
            row.category_name = name.clone();
        }
        if let Some(ids) = &patch.category_ids {
            row.category_ids = ids.clone();
        }
        if let Some(ids) = &patch.rakuten_category_ids {
            row.rakuten_category_ids = ids.clone();
        }
        if let Some(weight) = patch.weight {
            row.weight = Some(weight);
        }
        if let Some(size) = patch.size {
            row.size = Some(size);
        }
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(categories.len() < before)
    }

    async fn find_for_category_code(&self, code: &str) -> Result<Option<crate::models::Category>> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.category_ids.iter().any(|id| id == code))
            .cloned())
    }

    async fn rakuten_category_map(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut map = HashMap::new();
        for category in self.categories.lock().unwrap().iter() {
            for code in &category.category_ids {
                map.insert(code.clone(), category.rakuten_category_ids.clone());
            }
        }
        Ok(map)
    }

    async fn sync_rakuten_ids(
        &self,
        _category_ids: &[String],
        _rakuten_ids: &[String],
    ) -> Result<(u64, u64)> {
        Ok((0, 0))
    }

    async fn list_primary(&self) -> Result<Vec<crate::models::PrimaryCategory>> {
        Ok(Vec::new())
    }

    async fn create_primary(
        &self,
        category_name: &str,
        default_category_ids: &[String],
    ) -> Result<crate::models::PrimaryCategory> {
        Ok(crate::models::PrimaryCategory {
            id: 1,
            category_name: category_name.to_string(),
            default_category_ids: default_category_ids.to_vec(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn update_primary(
        &self,
        id: i64,
        category_name: Option<&str>,
        default_category_ids: Option<&[String]>,
    ) -> Result<crate::models::PrimaryCategory> {
        Ok(crate::models::PrimaryCategory {
            id,
            category_name: category_name.unwrap_or("primary").to_string(),
            default_category_ids: default_category_ids.map(|d| d.to_vec()).unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn delete_primary(&self, _id: i64) -> Result<bool> {
        Ok(true)
    }
}
