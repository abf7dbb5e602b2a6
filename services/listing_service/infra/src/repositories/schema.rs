//! Idempotent schema bootstrap.
//!
//! Besides creating the tables, the bootstrap repairs the shapes older
//! deployments left behind: text registration statuses, scalar `r_cat_id`
//! values, long-dead columns and serial sequences that fell behind after
//! manual inserts.

use shared_error::AppError;
use sqlx::PgPool;

/// Columns dropped from `products_origin`; earlier revisions stored the full
/// search record column-by-column.
const DEPRECATED_ORIGIN_COLUMNS: &[&str] = &[
    "img_url",
    "price_text",
    "jpy_price",
    "shop_name",
    "shop_city",
    "shop_info",
    "trace_info",
    "is_jxhy",
    "goods_tags",
    "seller_identities",
    "detail_description",
    "source_category_id",
    "optimized_name",
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    create_tables(pool).await?;
    fix_products_origin(pool).await?;
    fix_product_management(pool).await?;
    realign_sequences(pool).await?;
    tracing::info!("database schema ensured");
    Ok(())
}

async fn create_tables(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products_origin (
            id BIGSERIAL PRIMARY KEY,
            product_id TEXT NOT NULL UNIQUE,
            title_c TEXT,
            title_t TEXT,
            main_category TEXT,
            middle_category TEXT,
            type_tag TEXT,
            monthly_sales BIGINT,
            wholesale_price DOUBLE PRECISION,
            weight DOUBLE PRECISION,
            length DOUBLE PRECISION,
            width DOUBLE PRECISION,
            height DOUBLE PRECISION,
            size INTEGER,
            creation_date TEXT,
            repurchase_rate DOUBLE PRECISION,
            rating_score DOUBLE PRECISION,
            detail_json JSONB,
            registration_status INTEGER NOT NULL DEFAULT 1,
            r_cat_id JSONB NOT NULL DEFAULT '[]'::jsonb,
            keyword TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_management (
            id BIGSERIAL PRIMARY KEY,
            item_number TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            tagline TEXT,
            product_description JSONB NOT NULL DEFAULT '{}'::jsonb,
            sales_description TEXT,
            images JSONB NOT NULL DEFAULT '[]'::jsonb,
            variant_selectors JSONB NOT NULL DEFAULT '[]'::jsonb,
            variants JSONB NOT NULL DEFAULT '{}'::jsonb,
            inventory JSONB,
            features JSONB,
            payment JSONB,
            layout JSONB,
            item_type TEXT NOT NULL DEFAULT 'NORMAL',
            hide_item BOOLEAN NOT NULL DEFAULT TRUE,
            unlimited_inventory_flag BOOLEAN NOT NULL DEFAULT FALSE,
            genre_id TEXT,
            r_cat_id JSONB NOT NULL DEFAULT '[]'::jsonb,
            rakuten_registration_status TEXT,
            image_registration_status TEXT,
            inventory_registration_status TEXT,
            rakuten_registered_at TIMESTAMPTZ,
            registration_error TEXT,
            actual_purchase_price DOUBLE PRECISION,
            change_status TEXT,
            block BOOLEAN NOT NULL DEFAULT FALSE,
            src_url TEXT,
            main_category TEXT,
            middle_category TEXT,
            product_image_code TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS primary_category_management (
            id BIGSERIAL PRIMARY KEY,
            category_name TEXT NOT NULL,
            default_category_ids JSONB NOT NULL DEFAULT '[]'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_management (
            id BIGSERIAL PRIMARY KEY,
            category_name TEXT NOT NULL,
            category_ids JSONB NOT NULL DEFAULT '[]'::jsonb,
            rakuten_category_ids JSONB NOT NULL DEFAULT '[]'::jsonb,
            genre_id TEXT,
            primary_category_id BIGINT REFERENCES primary_category_management(id) ON DELETE SET NULL,
            weight DOUBLE PRECISION,
            length DOUBLE PRECISION,
            width DOUBLE PRECISION,
            height DOUBLE PRECISION,
            size_option TEXT,
            size DOUBLE PRECISION,
            attributes JSONB NOT NULL DEFAULT '[]'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            name TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            last_login TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn column_type(pool: &PgPool, table: &str, column: &str) -> Result<Option<String>, AppError> {
    let data_type: Option<String> = sqlx::query_scalar(
        r#"
        SELECT data_type FROM information_schema.columns
        WHERE table_name = $1 AND column_name = $2
        "#,
    )
    .bind(table)
    .bind(column)
    .fetch_optional(pool)
    .await?;
    Ok(data_type)
}

async fn fix_products_origin(pool: &PgPool) -> Result<(), AppError> {
    // legacy deployments stored the status as text
    if let Some(data_type) = column_type(pool, "products_origin", "registration_status").await? {
        if data_type != "integer" {
            tracing::info!(from = %data_type, "coercing products_origin.registration_status to integer");
            sqlx::query(
                r#"
                ALTER TABLE products_origin
                ALTER COLUMN registration_status TYPE INTEGER
                USING CASE
                    WHEN registration_status::text ~ '^[0-9]+$'
                        THEN registration_status::text::integer
                    ELSE 1
                END
                "#,
            )
            .execute(pool)
            .await?;
        }
    }
    sqlx::query(
        "UPDATE products_origin SET registration_status = 1 WHERE registration_status NOT IN (1, 2, 3)",
    )
    .execute(pool)
    .await?;

    // r_cat_id must always be a JSON array
    if let Some(data_type) = column_type(pool, "products_origin", "r_cat_id").await? {
        if data_type != "jsonb" {
            tracing::info!(from = %data_type, "coercing products_origin.r_cat_id to jsonb array");
            sqlx::query(
                r#"
                ALTER TABLE products_origin
                ALTER COLUMN r_cat_id TYPE JSONB
                USING CASE
                    WHEN r_cat_id IS NULL OR btrim(r_cat_id::text) = '' THEN '[]'::jsonb
                    WHEN btrim(r_cat_id::text) LIKE '[%' THEN btrim(r_cat_id::text)::jsonb
                    ELSE jsonb_build_array(btrim(r_cat_id::text))
                END
                "#,
            )
            .execute(pool)
            .await?;
        }
    }
    sqlx::query(
        r#"
        UPDATE products_origin
        SET r_cat_id = CASE
            WHEN r_cat_id IS NULL OR jsonb_typeof(r_cat_id) = 'null' THEN '[]'::jsonb
            WHEN jsonb_typeof(r_cat_id) <> 'array' THEN jsonb_build_array(r_cat_id)
            ELSE r_cat_id
        END
        WHERE r_cat_id IS NULL OR jsonb_typeof(r_cat_id) <> 'array'
        "#,
    )
    .execute(pool)
    .await?;

    for column in DEPRECATED_ORIGIN_COLUMNS {
        sqlx::query(&format!(
            "ALTER TABLE products_origin DROP COLUMN IF EXISTS {}",
            column
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn fix_product_management(pool: &PgPool) -> Result<(), AppError> {
    // legacy deployments stored the marketplace status as a boolean
    if let Some(data_type) =
        column_type(pool, "product_management", "rakuten_registration_status").await?
    {
        if data_type == "boolean" {
            tracing::info!("coercing product_management.rakuten_registration_status to text");
            sqlx::query(
                r#"
                ALTER TABLE product_management
                ALTER COLUMN rakuten_registration_status TYPE TEXT
                USING CASE
                    WHEN rakuten_registration_status IS NULL THEN NULL
                    WHEN rakuten_registration_status::text IN ('true', 't') THEN 'true'
                    ELSE 'false'
                END
                "#,
            )
            .execute(pool)
            .await?;
        }
    }

    // columns added after the first deployments
    for (column, definition) in [
        ("registration_error", "TEXT"),
        ("change_status", "TEXT"),
        ("image_registration_status", "TEXT"),
        ("inventory_registration_status", "TEXT"),
        ("product_image_code", "TEXT"),
        ("block", "BOOLEAN NOT NULL DEFAULT FALSE"),
    ] {
        sqlx::query(&format!(
            "ALTER TABLE product_management ADD COLUMN IF NOT EXISTS {} {}",
            column, definition
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE product_management
        SET r_cat_id = CASE
            WHEN r_cat_id IS NULL OR jsonb_typeof(r_cat_id) = 'null' THEN '[]'::jsonb
            WHEN jsonb_typeof(r_cat_id) <> 'array' THEN jsonb_build_array(r_cat_id)
            ELSE r_cat_id
        END
        WHERE r_cat_id IS NULL OR jsonb_typeof(r_cat_id) <> 'array'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Serial sequences fall behind after manual inserts with explicit ids;
/// realign them to MAX(id) so the next insert does not collide.
async fn realign_sequences(pool: &PgPool) -> Result<(), AppError> {
    for table in [
        "products_origin",
        "product_management",
        "category_management",
        "primary_category_management",
        "users",
    ] {
        sqlx::query(&format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), COALESCE((SELECT MAX(id) FROM {table}), 1))",
        ))
        .execute(pool)
        .await?;
    }
    Ok(())
}
