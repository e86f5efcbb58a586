//! Flattening a record into a spreadsheet row.

pub mod xlsx;

pub use xlsx::{save_record, write_workbook};

use crate::record::ProductRecord;

pub const SHEET_NAME: &str = "mobile";

pub const COLUMNS: [&str; 13] = [
    "name",
    "color",
    "memory_size",
    "seller",
    "regular_price",
    "promotional_price",
    "photos",
    "product_code",
    "number_of_reviews",
    "series",
    "screen_diagonal",
    "display_resolution",
    "specifications",
];

pub const PHOTO_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Number(i64),
    Empty,
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map(Cell::Text).unwrap_or(Cell::Empty)
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }
}

/// One row in `COLUMNS` order.
pub fn row(record: &ProductRecord) -> serde_json::Result<Vec<Cell>> {
    let photos = if record.photos.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(record.photos.join(PHOTO_SEPARATOR))
    };

    Ok(vec![
        record.name.clone().into(),
        record.color.clone().into(),
        record.memory_size.into(),
        record.seller.clone().into(),
        record.regular_price.into(),
        record.promotional_price.into(),
        photos,
        record.product_code.into(),
        record.number_of_reviews.into(),
        record.series.clone().into(),
        record.screen_diagonal.clone().into(),
        record.display_resolution.clone().into(),
        record.specifications_json()?.into(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{SpecSection, SpecTable};

    #[test]
    fn row_follows_column_order() {
        let mut section = SpecSection::new(SpecTable::section_key(0));
        section.insert("Серія".into(), "iPhone 15".into());
        let mut specs = SpecTable::default();
        specs.push(section);

        let record = ProductRecord {
            name: Some("Product X".into()),
            memory_size: Some(128),
            promotional_price: Some(799),
            photos: vec!["a.jpg".into(), "b.jpg".into()],
            specifications: Some(specs),
            ..Default::default()
        };

        let row = row(&record).unwrap();
        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(row[0], Cell::Text("Product X".into()));
        assert_eq!(row[1], Cell::Empty);
        assert_eq!(row[2], Cell::Number(128));
        assert_eq!(row[5], Cell::Number(799));
        assert_eq!(row[6], Cell::Text("a.jpg, b.jpg".into()));
        assert_eq!(
            row[12],
            Cell::Text(r#"{"section_0":{"Серія":"iPhone 15"}}"#.into())
        );
    }

    #[test]
    fn empty_record_is_all_blank() {
        let row = row(&ProductRecord::default()).unwrap();
        assert!(row.iter().all(|cell| *cell == Cell::Empty));
    }
}
