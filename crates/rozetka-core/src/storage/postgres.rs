use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::debug;

use super::{ProductStore, Upserted};
use crate::record::ProductRecord;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: Option<String>,
    pub color: Option<String>,
    pub memory_size: Option<i64>,
    pub seller: Option<String>,
    pub regular_price: Option<i64>,
    pub promotional_price: Option<i64>,
    pub product_code: Option<i64>,
    pub number_of_reviews: Option<i64>,
    pub series: Option<String>,
    pub screen_diagonal: Option<String>,
    pub display_resolution: Option<String>,
    pub specifications: Option<serde_json::Value>,
    /// Photo URLs in insertion order.
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn list_products(&self) -> anyhow::Result<Vec<ProductRow>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.name, p.color, p.memory_size, p.seller, p.regular_price,
                   p.promotional_price, p.product_code, p.number_of_reviews, p.series,
                   p.screen_diagonal, p.display_resolution, p.specifications,
                   COALESCE(
                       array_agg(ph.url ORDER BY ph.id) FILTER (WHERE ph.url IS NOT NULL),
                       '{}'
                   ) AS photos,
                   p.created_at
            FROM products p
            LEFT JOIN product_photos ph ON ph.product_id = p.id
            GROUP BY p.id
            ORDER BY p.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn upsert_product(&self, record: &ProductRecord) -> anyhow::Result<Upserted> {
        let specifications = record.specifications.as_ref().map(Json);
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM products
            WHERE name IS NOT DISTINCT FROM $1
              AND color IS NOT DISTINCT FROM $2
              AND memory_size IS NOT DISTINCT FROM $3
              AND seller IS NOT DISTINCT FROM $4
              AND regular_price IS NOT DISTINCT FROM $5
              AND promotional_price IS NOT DISTINCT FROM $6
              AND product_code IS NOT DISTINCT FROM $7
              AND number_of_reviews IS NOT DISTINCT FROM $8
              AND series IS NOT DISTINCT FROM $9
              AND screen_diagonal IS NOT DISTINCT FROM $10
              AND display_resolution IS NOT DISTINCT FROM $11
              AND specifications IS NOT DISTINCT FROM $12
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(&record.name)
        .bind(&record.color)
        .bind(record.memory_size)
        .bind(&record.seller)
        .bind(record.regular_price)
        .bind(record.promotional_price)
        .bind(record.product_code)
        .bind(record.number_of_reviews)
        .bind(&record.series)
        .bind(&record.screen_diagonal)
        .bind(&record.display_resolution)
        .bind(&specifications)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(id) = existing {
            tx.commit().await?;
            debug!("Product {} already stored", id);
            return Ok(Upserted { id, created: false });
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO products (
                name, color, memory_size, seller, regular_price, promotional_price,
                product_code, number_of_reviews, series, screen_diagonal,
                display_resolution, specifications
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&record.name)
        .bind(&record.color)
        .bind(record.memory_size)
        .bind(&record.seller)
        .bind(record.regular_price)
        .bind(record.promotional_price)
        .bind(record.product_code)
        .bind(record.number_of_reviews)
        .bind(&record.series)
        .bind(&record.screen_diagonal)
        .bind(&record.display_resolution)
        .bind(&specifications)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Stored new product {}", id);
        Ok(Upserted { id, created: true })
    }

    async fn attach_photo(&self, product_id: i64, url: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO product_photos (product_id, url)
            VALUES ($1, $2)
            ON CONFLICT (product_id, url) DO NOTHING
            "#,
        )
        .bind(product_id)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
