use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ProductStore, Upserted};
use crate::record::ProductRecord;

#[derive(Default)]
struct Tables {
    products: Vec<(i64, ProductRecord)>,
    photos: Vec<(i64, String)>,
}

/// In-process store with the same contract as the Postgres one.
#[derive(Default)]
pub struct MemoryProductStore {
    tables: Mutex<Tables>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored products with their photos reattached, in insertion order.
    pub async fn products(&self) -> Vec<(i64, ProductRecord)> {
        let tables = self.tables.lock().await;
        tables
            .products
            .iter()
            .map(|(id, record)| {
                let mut record = record.clone();
                record.photos = tables
                    .photos
                    .iter()
                    .filter(|(owner, _)| owner == id)
                    .map(|(_, url)| url.clone())
                    .collect();
                (*id, record)
            })
            .collect()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn upsert_product(&self, record: &ProductRecord) -> anyhow::Result<Upserted> {
        let key = ProductRecord {
            photos: Vec::new(),
            ..record.clone()
        };

        let mut tables = self.tables.lock().await;
        if let Some((id, _)) = tables.products.iter().find(|(_, stored)| *stored == key) {
            return Ok(Upserted {
                id: *id,
                created: false,
            });
        }

        let id = tables.products.last().map_or(1, |(id, _)| id + 1);
        tables.products.push((id, key));
        Ok(Upserted { id, created: true })
    }

    async fn attach_photo(&self, product_id: i64, url: &str) -> anyhow::Result<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.products.iter().any(|(id, _)| *id == product_id) {
            anyhow::bail!("no product with id {}", product_id);
        }
        if tables
            .photos
            .iter()
            .any(|(owner, stored)| *owner == product_id && stored == url)
        {
            return Ok(false);
        }
        tables.photos.push((product_id, url.to_string()));
        Ok(true)
    }
}
