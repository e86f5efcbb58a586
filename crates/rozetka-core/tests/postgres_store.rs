//! Needs a database: `DATABASE_URL=postgres://... cargo test -- --ignored`.

use rozetka_core::storage::{persist, PgProductStore, ProductStore};
use rozetka_core::{ProductRecord, SpecSection, SpecTable};
use sqlx::PgPool;

fn record() -> ProductRecord {
    let mut section = SpecSection::new(SpecTable::section_key(0));
    section.insert("Серія".into(), "X Series".into());
    let mut specs = SpecTable::default();
    specs.push(section);

    ProductRecord {
        name: Some("Product X".into()),
        regular_price: Some(999),
        memory_size: Some(128),
        photos: vec!["https://img/1.jpg".into(), "https://img/1.jpg".into()],
        specifications: Some(specs),
        ..Default::default()
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn upsert_matches_on_null_fields_and_specifications(pool: PgPool) {
    let store = PgProductStore::new(pool);

    let first = persist(&store, &record()).await.unwrap();
    assert!(first.product_created);
    assert_eq!(first.photos_added, 1);
    assert_eq!(first.photos_existing, 1);

    let again = store.upsert_product(&record()).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.id, first.product_id);

    let without_specs = ProductRecord {
        specifications: None,
        ..record()
    };
    assert!(store.upsert_product(&without_specs).await.unwrap().created);

    let rows = store.list_products().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].photos, vec!["https://img/1.jpg"]);
    assert_eq!(
        rows[0].specifications,
        Some(serde_json::json!({"section_0": {"Серія": "X Series"}}))
    );
    assert_eq!(rows[1].photos, Vec::<String>::new());
}
