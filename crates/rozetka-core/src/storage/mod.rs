//! Persisting records: upsert by the full field tuple, then photos as
//! get-or-create children.

pub mod memory;
pub mod postgres;

pub use memory::MemoryProductStore;
pub use postgres::{PgProductStore, ProductRow};

use async_trait::async_trait;
use tracing::info;

use crate::record::ProductRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub product_id: i64,
    pub product_created: bool,
    pub photos_added: usize,
    pub photos_existing: usize,
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Returns the stored product whose every field (photos aside) equals
    /// `record`, creating it if there is none. Missing fields compare equal.
    async fn upsert_product(&self, record: &ProductRecord) -> anyhow::Result<Upserted>;

    /// `true` if the photo was new for this product.
    async fn attach_photo(&self, product_id: i64, url: &str) -> anyhow::Result<bool>;
}

pub async fn persist<S: ProductStore + ?Sized>(
    store: &S,
    record: &ProductRecord,
) -> anyhow::Result<PersistSummary> {
    let product = store.upsert_product(record).await?;
    let mut summary = PersistSummary {
        product_id: product.id,
        product_created: product.created,
        ..Default::default()
    };

    for url in &record.photos {
        if store.attach_photo(product.id, url).await? {
            summary.photos_added += 1;
        } else {
            summary.photos_existing += 1;
        }
    }

    info!(
        "Persisted product {} ({}), {} new photos, {} already stored",
        summary.product_id,
        if summary.product_created { "created" } else { "existing" },
        summary.photos_added,
        summary.photos_existing
    );
    Ok(summary)
}
