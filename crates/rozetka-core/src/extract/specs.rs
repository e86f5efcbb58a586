use crate::layout::SpecLayout;
use crate::normalize;
use crate::record::{SpecSection, SpecTable};
use crate::scraper::DocumentHandle;
use tracing::debug;

/// Reads the characteristics page into a table.
///
/// Each section becomes `section_<i>` in page order, kept even when it holds
/// no rows. Within a row group labels and values pair up by position; any
/// surplus on either side is dropped.
pub async fn build<H: DocumentHandle>(doc: &H, layout: &SpecLayout) -> anyhow::Result<SpecTable> {
    let mut table = SpecTable::default();

    for (index, section) in doc.select(None, &layout.sections).await?.iter().enumerate() {
        let mut entry = SpecSection::new(SpecTable::section_key(index));
        for group in doc.select(Some(section), &layout.groups).await? {
            let labels = doc.select(Some(&group), &layout.labels).await?;
            let values = doc.select(Some(&group), &layout.values).await?;
            if labels.len() != values.len() {
                debug!(
                    section = index,
                    labels = labels.len(),
                    values = values.len(),
                    "uneven characteristics row"
                );
            }
            for (label, value) in labels.iter().zip(values.iter()) {
                let label = normalize::collapse_whitespace(&doc.text(label).await?);
                let value = normalize::collapse_whitespace(&doc.text(value).await?);
                entry.insert(label, value);
            }
        }
        table.push(entry);
    }

    debug!(sections = table.len(), "specifications built");
    Ok(table)
}
