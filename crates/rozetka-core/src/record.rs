use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// One product page visit, flattened. Every field is optional on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub name: Option<String>,
    pub regular_price: Option<i64>,
    pub promotional_price: Option<i64>,
    pub color: Option<String>,
    pub memory_size: Option<i64>,
    pub product_code: Option<i64>,
    pub number_of_reviews: Option<i64>,
    pub series: Option<String>,
    pub screen_diagonal: Option<String>,
    pub display_resolution: Option<String>,
    pub seller: Option<String>,
    pub photos: Vec<String>,
    pub specifications: Option<SpecTable>,
}

impl ProductRecord {
    /// Number of scalar fields that resolved, for run summaries.
    pub fn filled_fields(&self) -> usize {
        [
            self.name.is_some(),
            self.regular_price.is_some(),
            self.promotional_price.is_some(),
            self.color.is_some(),
            self.memory_size.is_some(),
            self.product_code.is_some(),
            self.number_of_reviews.is_some(),
            self.series.is_some(),
            self.screen_diagonal.is_some(),
            self.display_resolution.is_some(),
            self.seller.is_some(),
        ]
        .into_iter()
        .filter(|filled| *filled)
        .count()
    }

    pub fn specifications_json(&self) -> serde_json::Result<Option<String>> {
        self.specifications
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSection {
    pub key: String,
    entries: Vec<(String, String)>,
}

impl SpecSection {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: Vec::new(),
        }
    }

    /// A repeated label replaces the earlier value but keeps its position.
    pub fn insert(&mut self, label: String, value: String) {
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SpecSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Sectioned characteristics, in page order. Section keys are only stable
/// within a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecTable {
    sections: Vec<SpecSection>,
}

impl SpecTable {
    pub fn section_key(index: usize) -> String {
        format!("section_{index}")
    }

    pub fn push(&mut self, section: SpecSection) {
        self.sections.push(section);
    }

    pub fn get(&self, key: &str) -> Option<&SpecSection> {
        self.sections.iter().find(|s| s.key == key)
    }

    pub fn sections(&self) -> &[SpecSection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Serialize for SpecTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.key, section)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SpecTable {
        let mut first = SpecSection::new(SpecTable::section_key(0));
        first.insert("Серія".into(), "iPhone 15".into());
        first.insert("Діагональ екрана".into(), "6.1\"".into());
        let mut table = SpecTable::default();
        table.push(first);
        for i in 1..=10 {
            table.push(SpecSection::new(SpecTable::section_key(i)));
        }
        table
    }

    #[test]
    fn json_keeps_page_order_past_ten_sections() {
        let json = serde_json::to_string(&table()).unwrap();
        assert!(json.starts_with(r#"{"section_0":{"Серія":"iPhone 15","Діагональ екрана":"6.1\""}"#));
        let second = json.find("\"section_2\"").unwrap();
        let tenth = json.find("\"section_10\"").unwrap();
        assert!(second < tenth);
    }

    #[test]
    fn repeated_label_overwrites_in_place() {
        let mut section = SpecSection::new("section_0");
        section.insert("Колір".into(), "Black".into());
        section.insert("Вага".into(), "171 г".into());
        section.insert("Колір".into(), "Pink".into());
        assert_eq!(section.len(), 2);
        assert_eq!(section.get("Колір"), Some("Pink"));
        assert_eq!(section.entries().next(), Some(("Колір", "Pink")));
    }

    #[test]
    fn filled_fields_counts_scalars_only() {
        let record = ProductRecord {
            name: Some("Product X".into()),
            regular_price: Some(999),
            photos: vec!["a.jpg".into()],
            ..Default::default()
        };
        assert_eq!(record.filled_fields(), 2);
        assert_eq!(record.specifications_json().unwrap(), None);
    }
}
