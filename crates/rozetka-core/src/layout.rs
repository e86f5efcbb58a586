//! Where each field lives on the storefront's pages.

use crate::extract::Locator;

#[derive(Debug, Clone)]
pub struct SpecLayout {
    pub sections: String,
    pub groups: String,
    pub labels: String,
    pub values: String,
}

#[derive(Debug, Clone)]
pub struct PageLayout {
    pub search_input: String,
    pub search_submit: Locator,
    pub results_ready: String,
    pub first_result: Locator,
    pub product_ready: String,

    pub name: Locator,
    /// Plain selector: the promotional price is addressed relative to it.
    pub regular_price: String,
    /// Tag of the discounted price node that follows the regular price.
    pub promotional_price_tag: String,
    pub color: Locator,
    pub memory_size: Locator,
    pub memory_unit: String,
    pub product_code: Locator,
    pub product_code_label: String,
    pub number_of_reviews: Locator,
    pub reviews_unit: String,
    pub series: Locator,
    pub screen_diagonal: Locator,
    pub display_resolution: Locator,
    pub seller: Locator,
    pub photos: Locator,

    pub characteristics_link: Locator,
    pub specifications: SpecLayout,
}

impl Default for PageLayout {
    fn default() -> Self {
        let variant = |marker: &str| Locator::LabelScan {
            pairs: "div.var-options p".into(),
            label: "span".into(),
            value: "span ~ span".into(),
            marker: marker.into(),
        };
        let detail = |marker: &str| Locator::LabelScan {
            pairs: "dl.list > div".into(),
            label: "dt.label".into(),
            value: "dd".into(),
            marker: marker.into(),
        };

        Self {
            search_input: "input[name=\"search\"]".into(),
            search_submit: Locator::FirstOf(vec![
                Locator::Containing {
                    selector: "button".into(),
                    marker: "Знайти".into(),
                    strip_marker: false,
                },
                Locator::Path("button.search-form__submit".into()),
            ]),
            results_ready: "ul.catalog-grid".into(),
            first_result: Locator::Path("ul.catalog-grid > li:first-child a".into()),
            product_ready: "h1".into(),

            name: Locator::Path("h1".into()),
            regular_price: "p.product-price__small".into(),
            promotional_price_tag: "p".into(),
            color: variant("Колір"),
            memory_size: variant("Вбудована пам'ять"),
            memory_unit: "ГБ".into(),
            product_code: Locator::Path(
                "div.product-about__right div.rating.text-base > span".into(),
            ),
            product_code_label: "Код:".into(),
            number_of_reviews: Locator::Path(
                "div.product-about__right div.rating.text-base > a".into(),
            ),
            reviews_unit: "відгуки".into(),
            series: detail("Серія"),
            screen_diagonal: detail("Діагональ екрана"),
            display_resolution: detail("Роздільна здатність дисплея"),
            seller: Locator::FirstOf(vec![
                Locator::AttributeScan {
                    block: "p.seller-title".into(),
                    link: "a".into(),
                    image: "img".into(),
                    attribute: "alt".into(),
                },
                Locator::Containing {
                    selector: "div.comment__vars span".into(),
                    marker: "Продавець:".into(),
                    strip_marker: true,
                },
            ]),
            photos: Locator::Gallery {
                selectors: vec![
                    "app-slider.preview-slider img".into(),
                    "div.scrollbar__content > ul li img".into(),
                ],
                attribute: "src".into(),
            },

            characteristics_link: Locator::FirstOf(vec![
                Locator::Path("a.product-characteristics".into()),
                Locator::Containing {
                    selector: "a".into(),
                    marker: "Характеристики".into(),
                    strip_marker: false,
                },
            ]),
            specifications: SpecLayout {
                sections: "main.product-tabs__content section".into(),
                groups: "dl > div".into(),
                labels: "dt".into(),
                values: "dd".into(),
            },
        }
    }
}
