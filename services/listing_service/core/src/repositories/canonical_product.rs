//! Canonical product repository trait
//!
//! Data access interface for the marketplace-ready rows
//! (`product_management`).

use async_trait::async_trait;

use crate::dto::listing::ListQuery;
use crate::models::{CanonicalProduct, RakutenStatus};
use crate::Result;

#[async_trait]
pub trait CanonicalProductRepository: Send + Sync {
    /// Upsert a canonical row and mark the matching origin row as registered,
    /// in one transaction. The materializer commits one product at a time so
    /// a mid-batch failure keeps earlier products.
    async fn upsert_with_origin_status(&self, product: &CanonicalProduct) -> Result<()>;

    async fn find_by_item_number(&self, item_number: &str) -> Result<Option<CanonicalProduct>>;

    /// Paginated listing. The sort column comes from a closed enum, never
    /// from caller strings.
    async fn list(&self, query: &ListQuery) -> Result<Vec<CanonicalProduct>>;

    async fn count(&self) -> Result<i64>;

    /// Delete canonical rows. Matching origin rows that were registered are
    /// flipped to previously-registered so the UI can tell "never registered"
    /// from "was registered, then deleted". Returns deleted row count.
    async fn delete(&self, item_numbers: &[String]) -> Result<u64>;

    /// Toggle `hide_item`, skipping rows whose marketplace status no longer
    /// allows it (`deleted`, `stop`). Returns affected row count.
    async fn update_hide_item(&self, item_numbers: &[String], hidden: bool) -> Result<u64>;

    /// Remove one image from a product's image list by exact location match
    /// (whitespace-trimmed, case-sensitive). Returns whether an image was
    /// removed.
    async fn remove_image(&self, item_number: &str, location: &str) -> Result<bool>;

    /// Write a marketplace status transition.
    ///
    /// `None -> True` stamps `rakuten_registered_at`; a transition to
    /// `Deleted` clears it; `OnSale`/`Stop` preserve it.
    async fn set_rakuten_status(
        &self,
        item_number: &str,
        status: Option<RakutenStatus>,
        error: Option<&str>,
    ) -> Result<()>;

    async fn set_image_registration_status(&self, item_number: &str, status: &str) -> Result<()>;

    async fn set_inventory_registration_status(&self, item_number: &str, status: &str)
        -> Result<()>;
}
