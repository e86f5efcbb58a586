//! Field lookup and the product page extractor.
//!
//! A [`Locator`] says how to find one field; [`extract_into`] walks the whole
//! [`PageLayout`] and fills a record. Nothing in here fails a run: a lookup
//! error is logged and the field stays `None`.

pub mod specs;

use crate::layout::PageLayout;
use crate::normalize::{self, Value, ValueKind};
use crate::record::ProductRecord;
use crate::scraper::DocumentHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// First match of a CSS selector.
    Path(String),
    /// Scan `pairs` for the first one whose `label` text contains `marker`,
    /// then read its `value`.
    LabelScan {
        pairs: String,
        label: String,
        value: String,
        marker: String,
    },
    /// The first `tag` element after the first `anchor` match, under the
    /// same parent.
    Sibling { anchor: String, tag: String },
    /// First match of `selector` whose text contains `marker`.
    Containing {
        selector: String,
        marker: String,
        strip_marker: bool,
    },
    /// Text of a link inside `block`, or an attribute of its image when the
    /// link is absent or blank.
    AttributeScan {
        block: String,
        link: String,
        image: String,
        attribute: String,
    },
    /// `attribute` of every match of the first selector that matches at all.
    Gallery {
        selectors: Vec<String>,
        attribute: String,
    },
    /// Alternatives in priority order. Alternatives do not nest.
    FirstOf(Vec<Locator>),
}

impl Locator {
    fn alternatives(&self) -> &[Locator] {
        match self {
            Locator::FirstOf(alternatives) => alternatives,
            other => std::slice::from_ref(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    One(String),
    Many(Vec<String>),
}

impl RawValue {
    pub fn into_one(self) -> Option<String> {
        match self {
            RawValue::One(s) => Some(s),
            RawValue::Many(mut all) => (!all.is_empty()).then(|| all.remove(0)),
        }
    }

    pub fn into_many(self) -> Vec<String> {
        match self {
            RawValue::One(s) => vec![s],
            RawValue::Many(all) => all,
        }
    }
}

/// Resolves a node-addressing locator to its node.
pub async fn find<H: DocumentHandle>(doc: &H, locator: &Locator) -> anyhow::Result<Option<H::Node>> {
    for alternative in locator.alternatives() {
        if let Some(node) = find_one(doc, alternative).await? {
            return Ok(Some(node));
        }
    }
    Ok(None)
}

async fn find_one<H: DocumentHandle>(doc: &H, locator: &Locator) -> anyhow::Result<Option<H::Node>> {
    match locator {
        Locator::Path(selector) => first(doc, None, selector).await,
        Locator::LabelScan {
            pairs,
            label,
            value,
            marker,
        } => {
            for pair in doc.select(None, pairs).await? {
                if !has_marked_node(doc, &pair, label, marker).await? {
                    continue;
                }
                // The first labelled pair wins, even if its value is missing.
                return first(doc, Some(&pair), value).await;
            }
            Ok(None)
        }
        Locator::Sibling { anchor, tag } => match first(doc, None, anchor).await? {
            Some(anchor) => doc.next_sibling(&anchor, tag).await,
            None => Ok(None),
        },
        Locator::Containing {
            selector, marker, ..
        } => {
            for node in doc.select(None, selector).await? {
                if doc.text(&node).await?.contains(marker.as_str()) {
                    return Ok(Some(node));
                }
            }
            Ok(None)
        }
        Locator::AttributeScan { .. } | Locator::Gallery { .. } => {
            anyhow::bail!("locator does not address a single node: {:?}", locator)
        }
        Locator::FirstOf(_) => anyhow::bail!("nested alternatives are not supported"),
    }
}

/// Resolves a locator to raw text (or texts), before normalization.
pub async fn locate<H: DocumentHandle>(doc: &H, locator: &Locator) -> anyhow::Result<Option<RawValue>> {
    for alternative in locator.alternatives() {
        if let Some(value) = locate_one(doc, alternative).await? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

async fn locate_one<H: DocumentHandle>(doc: &H, locator: &Locator) -> anyhow::Result<Option<RawValue>> {
    match locator {
        Locator::AttributeScan {
            block,
            link,
            image,
            attribute,
        } => {
            let Some(block) = first(doc, None, block).await? else {
                return Ok(None);
            };
            if let Some(link) = first(doc, Some(&block), link).await? {
                let text = doc.text(&link).await?;
                if !normalize::clean(&text).is_empty() {
                    return Ok(Some(RawValue::One(text)));
                }
            }
            if let Some(image) = first(doc, Some(&block), image).await? {
                if let Some(value) = doc.attribute(&image, attribute).await? {
                    if !normalize::clean(&value).is_empty() {
                        return Ok(Some(RawValue::One(value)));
                    }
                }
            }
            Ok(None)
        }
        Locator::Gallery {
            selectors,
            attribute,
        } => {
            for selector in selectors {
                let nodes = doc.select(None, selector).await?;
                if nodes.is_empty() {
                    continue;
                }
                let mut values = Vec::with_capacity(nodes.len());
                for node in &nodes {
                    if let Some(value) = doc.attribute(node, attribute).await? {
                        values.push(value);
                    }
                }
                return Ok(Some(RawValue::Many(values)));
            }
            Ok(None)
        }
        Locator::Containing {
            marker,
            strip_marker: true,
            ..
        } => match find_one(doc, locator).await? {
            Some(node) => {
                let text = doc.text(&node).await?;
                Ok(Some(RawValue::One(text.replace(marker.as_str(), ""))))
            }
            None => Ok(None),
        },
        _ => match find_one(doc, locator).await? {
            Some(node) => Ok(Some(RawValue::One(doc.text(&node).await?))),
            None => Ok(None),
        },
    }
}

async fn first<H: DocumentHandle>(
    doc: &H,
    scope: Option<&H::Node>,
    selector: &str,
) -> anyhow::Result<Option<H::Node>> {
    Ok(doc.select(scope, selector).await?.into_iter().next())
}

async fn has_marked_node<H: DocumentHandle>(
    doc: &H,
    scope: &H::Node,
    selector: &str,
    marker: &str,
) -> anyhow::Result<bool> {
    for node in doc.select(Some(scope), selector).await? {
        if doc.text(&node).await?.contains(marker) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn settle<T>(field: &'static str, result: anyhow::Result<Option<T>>) -> Option<T> {
    match result {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            debug!(field, "not found");
            None
        }
        Err(e) => {
            debug!(field, error = %e, "lookup failed");
            None
        }
    }
}

async fn raw_text<H: DocumentHandle>(doc: &H, field: &'static str, locator: &Locator) -> Option<String> {
    settle(field, locate(doc, locator).await).and_then(RawValue::into_one)
}

async fn field<H: DocumentHandle>(
    doc: &H,
    name: &'static str,
    locator: &Locator,
    kind: ValueKind<'_>,
) -> Option<Value> {
    raw_text(doc, name, locator)
        .await
        .and_then(|raw| normalize::normalize(&raw, kind))
}

/// Fills every product-page field of `record` from the current page.
///
/// Fields are written one at a time, so a caller that gives up half way
/// keeps whatever was already read.
pub async fn extract_into<H: DocumentHandle>(doc: &H, layout: &PageLayout, record: &mut ProductRecord) {
    use ValueKind::{Currency, Text, UnitInteger};

    record.name = field(doc, "name", &layout.name, Text)
        .await
        .and_then(Value::into_text);

    let regular = settle(
        "regular_price",
        first(doc, None, &layout.regular_price).await,
    );
    let regular_raw = match &regular {
        Some(node) => settle("regular_price", doc.text(node).await.map(Some)),
        None => None,
    };
    record.regular_price = regular_raw
        .as_deref()
        .and_then(|raw| normalize::normalize(raw, Currency))
        .and_then(Value::into_integer);

    // A discount is only shown next to the regular price it replaces.
    record.promotional_price = match (&regular, &regular_raw) {
        (Some(node), Some(_)) => {
            let sibling = settle(
                "promotional_price",
                doc.next_sibling(node, &layout.promotional_price_tag).await,
            );
            let raw = match &sibling {
                Some(node) => settle("promotional_price", doc.text(node).await.map(Some)),
                None => None,
            };
            raw.and_then(|raw| normalize::normalize(&raw, Currency))
                .and_then(Value::into_integer)
        }
        _ => None,
    };

    record.color = field(doc, "color", &layout.color, Text)
        .await
        .and_then(Value::into_text);
    record.memory_size = field(
        doc,
        "memory_size",
        &layout.memory_size,
        UnitInteger(&layout.memory_unit),
    )
    .await
    .and_then(Value::into_integer);
    record.product_code = field(
        doc,
        "product_code",
        &layout.product_code,
        UnitInteger(&layout.product_code_label),
    )
    .await
    .and_then(Value::into_integer);
    record.number_of_reviews = field(
        doc,
        "number_of_reviews",
        &layout.number_of_reviews,
        UnitInteger(&layout.reviews_unit),
    )
    .await
    .and_then(Value::into_integer);

    record.series = field(doc, "series", &layout.series, Text)
        .await
        .and_then(Value::into_text);
    record.screen_diagonal = field(doc, "screen_diagonal", &layout.screen_diagonal, Text)
        .await
        .and_then(Value::into_text);
    record.display_resolution = field(doc, "display_resolution", &layout.display_resolution, Text)
        .await
        .and_then(Value::into_text);
    record.seller = field(doc, "seller", &layout.seller, Text)
        .await
        .and_then(Value::into_text);

    record.photos = settle("photos", locate(doc, &layout.photos).await)
        .map(RawValue::into_many)
        .unwrap_or_default();

    debug!(
        filled = record.filled_fields(),
        photos = record.photos.len(),
        "product page extracted"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::http::StaticDocument;

    fn product(body: &str) -> StaticDocument {
        StaticDocument::from_html(&format!("<html><body>{body}</body></html>"))
    }

    async fn extract(body: &str) -> ProductRecord {
        let doc = product(body);
        let mut record = ProductRecord::default();
        extract_into(&doc, &PageLayout::default(), &mut record).await;
        record
    }

    #[tokio::test]
    async fn label_scan_without_matching_label_is_missing() {
        let doc = product(
            r#"<div class="var-options"><p><span>Вага:</span><span>171 г</span></p></div>"#,
        );
        let layout = PageLayout::default();
        assert_eq!(locate(&doc, &layout.color).await.unwrap(), None);
    }

    #[tokio::test]
    async fn label_scan_takes_the_first_matching_pair() {
        let record = extract(
            r#"
            <div class="var-options">
                <p><span>Колір:</span><span>Black</span></p>
            </div>
            <div class="var-options">
                <p><span>Колір:</span><span>Pink</span></p>
                <p><span>Вбудована пам'ять:</span><span>128ГБ</span></p>
            </div>
            "#,
        )
        .await;
        assert_eq!(record.color.as_deref(), Some("Black"));
        assert_eq!(record.memory_size, Some(128));
    }

    #[tokio::test]
    async fn promotional_price_needs_a_regular_price() {
        let both = extract(
            r#"<div class="product-prices">
                <p class="product-price__small">41 999₴</p>
                <p class="product-price__big">37 999₴</p>
            </div>"#,
        )
        .await;
        assert_eq!(both.regular_price, Some(41999));
        assert_eq!(both.promotional_price, Some(37999));

        let orphan = extract(
            r#"<div class="product-prices">
                <span>Ціна</span>
                <p class="product-price__big">37 999₴</p>
            </div>"#,
        )
        .await;
        assert_eq!(orphan.regular_price, None);
        assert_eq!(orphan.promotional_price, None);
    }

    #[tokio::test]
    async fn promotional_price_comes_from_the_regular_price_block() {
        let record = extract(
            r#"<div class="product-prices"><p class="product-price__small">41 999₴</p></div>
            <section class="recommendations"><div>
                <p class="product-price__small">9 999₴</p><p>7 999₴</p>
            </div></section>"#,
        )
        .await;
        assert_eq!(record.regular_price, Some(41999));
        assert_eq!(record.promotional_price, None);
    }

    #[tokio::test]
    async fn sibling_locator_is_anchored_on_the_first_match() {
        let doc = product(
            r#"<div><b class="old">1</b></div><div><b class="old">2</b><i>3</i></div>"#,
        );
        let sibling = Locator::Sibling {
            anchor: "b.old".into(),
            tag: "i".into(),
        };
        assert_eq!(locate(&doc, &sibling).await.unwrap(), None);
    }

    #[tokio::test]
    async fn photos_keep_order_and_duplicates() {
        let record = extract(
            r#"<app-slider class="preview-slider">
                <img src="https://img/1.jpg"><img src="https://img/2.jpg">
                <img><img src="https://img/1.jpg">
            </app-slider>"#,
        )
        .await;
        assert_eq!(
            record.photos,
            vec!["https://img/1.jpg", "https://img/2.jpg", "https://img/1.jpg"]
        );
    }

    #[tokio::test]
    async fn photos_fall_back_to_the_thumbnail_strip() {
        let record = extract(
            r#"<div class="scrollbar__content"><ul>
                <li><img src="https://img/a.jpg"></li>
                <li><img src="https://img/b.jpg"></li>
            </ul></div>"#,
        )
        .await;
        assert_eq!(record.photos, vec!["https://img/a.jpg", "https://img/b.jpg"]);
        assert!(extract("<h1>x</h1>").await.photos.is_empty());
    }

    #[tokio::test]
    async fn seller_prefers_link_then_image_then_comment() {
        let link = extract(r#"<p class="seller-title">Продавець: <a>Rozetka</a></p>"#).await;
        assert_eq!(link.seller.as_deref(), Some("Rozetka"));

        let image = extract(
            r#"<p class="seller-title"><a> </a><img alt="Allo" src="logo.png"></p>"#,
        )
        .await;
        assert_eq!(image.seller.as_deref(), Some("Allo"));

        let comment = extract(
            r#"<div class="comment__vars"><span>Колір: Black</span><span>Продавець: Comfy</span></div>"#,
        )
        .await;
        assert_eq!(comment.seller.as_deref(), Some("Comfy"));

        assert_eq!(extract("<h1>x</h1>").await.seller, None);
    }

    #[tokio::test]
    async fn rating_block_yields_code_and_reviews() {
        let record = extract(
            r#"<div class="product-about__right">
                <div class="rating text-base">
                    <a href="comments/">42 відгуки</a>
                    <span>Код:&nbsp;395460480</span>
                </div>
            </div>"#,
        )
        .await;
        assert_eq!(record.product_code, Some(395460480));
        assert_eq!(record.number_of_reviews, Some(42));
    }

    #[tokio::test]
    async fn details_list_fields() {
        let record = extract(
            r#"<dl class="list">
                <div><dt class="label">Серія</dt><dd>iPhone 15</dd></div>
                <div><dt class="label">Діагональ екрана</dt><dd> 6.1 </dd></div>
                <div><dt class="label">Роздільна здатність дисплея</dt><dd></dd></div>
            </dl>"#,
        )
        .await;
        assert_eq!(record.series.as_deref(), Some("iPhone 15"));
        assert_eq!(record.screen_diagonal.as_deref(), Some("6.1"));
        assert_eq!(record.display_resolution, None);
    }

    #[tokio::test]
    async fn empty_page_leaves_every_field_missing() {
        let record = extract("").await;
        assert_eq!(record, ProductRecord::default());
    }

    #[tokio::test]
    async fn first_of_tries_alternatives_in_order() {
        let doc = product(r#"<a href="/c">Характеристики</a>"#);
        let layout = PageLayout::default();
        let node = find(&doc, &layout.characteristics_link).await.unwrap();
        assert!(node.is_some());

        let nested = Locator::FirstOf(vec![Locator::FirstOf(vec![])]);
        assert!(find(&doc, &nested).await.is_err());
    }
}
