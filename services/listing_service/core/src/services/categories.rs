//! Category management with propagation into product rows.
//!
//! Dimension fields set on a category flow into every origin product whose
//! main or middle category falls under it; marketplace category IDs flow
//! into the `r_cat_id` arrays of both product tables. Propagation is atomic
//! per category; concurrent edits are last-writer-wins.

use std::sync::Arc;

use crate::models::Category;
use crate::repositories::category::{CategoryPatch, CategoryRepository, NewCategory};
use crate::repositories::origin_product::{DimensionField, OriginProductRepository};
use crate::Result;

pub struct CategoryManager {
    categories: Arc<dyn CategoryRepository>,
    origin: Arc<dyn OriginProductRepository>,
}

impl CategoryManager {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        origin: Arc<dyn OriginProductRepository>,
    ) -> Self {
        Self { categories, origin }
    }

    pub async fn create(&self, category: &NewCategory) -> Result<Category> {
        let created = self.categories.create(category).await?;
        self.propagate(&created).await?;
        Ok(created)
    }

    pub async fn update(&self, id: i64, patch: &CategoryPatch) -> Result<Category> {
        let updated = self.categories.update(id, patch).await?;
        self.propagate_patch(&updated, patch).await?;
        Ok(updated)
    }

    /// Push every dimension a category carries into its product rows.
    async fn propagate(&self, category: &Category) -> Result<()> {
        let codes = &category.category_ids;
        if codes.is_empty() {
            return Ok(());
        }
        for (field, value) in [
            (DimensionField::Weight, category.weight),
            (DimensionField::Length, category.length),
            (DimensionField::Width, category.width),
            (DimensionField::Height, category.height),
            (DimensionField::Size, category.size),
        ] {
            if value.is_some() {
                let affected = self.origin.propagate_dimension(codes, field, value).await?;
                tracing::info!(
                    category = %category.category_name,
                    field = field.as_column(),
                    affected,
                    "category dimension propagated"
                );
            }
        }
        if !category.rakuten_category_ids.is_empty() {
            let (origin_rows, canonical_rows) = self
                .categories
                .sync_rakuten_ids(codes, &category.rakuten_category_ids)
                .await?;
            tracing::info!(
                category = %category.category_name,
                origin_rows,
                canonical_rows,
                "marketplace category IDs synced"
            );
        }
        Ok(())
    }

    /// Push only the fields the patch actually touched.
    async fn propagate_patch(&self, category: &Category, patch: &CategoryPatch) -> Result<()> {
        let codes = &category.category_ids;
        if codes.is_empty() {
            return Ok(());
        }
        for (field, value) in [
            (DimensionField::Weight, patch.weight),
            (DimensionField::Length, patch.length),
            (DimensionField::Width, patch.width),
            (DimensionField::Height, patch.height),
            (DimensionField::Size, patch.size),
        ] {
            if value.is_some() {
                self.origin.propagate_dimension(codes, field, value).await?;
            }
        }
        if patch.rakuten_category_ids.is_some() && !category.rakuten_category_ids.is_empty() {
            self.categories
                .sync_rakuten_ids(codes, &category.rakuten_category_ids)
                .await?;
        }
        Ok(())
    }
}
