//! CSS selector fallback chains for the supported sites.
//!
//! Each field is an ordered list tried first-match-wins: the first selector
//! that matches an element is used and the rest are skipped. Price is the one
//! exception - later selectors are still tried when the matched text does not
//! normalize to a valid amount. Update these lists when a site changes its
//! markup.

use crate::market::sites::Site;
use scraper::Selector;
use std::sync::LazyLock;

/// The selector chains for one site.
pub struct SiteSelectors {
    /// Product container candidates; the first matching ≥1 element wins for
    /// the whole page.
    pub containers: Vec<Selector>,
    /// Product title within a container.
    pub title: Vec<Selector>,
    /// Link fallback when the title element has no enclosing anchor.
    pub link: Vec<Selector>,
    /// Price text within a container.
    pub price: Vec<Selector>,
    /// Brand (Falabella) or official-store seller (MercadoLibre).
    pub vendor: Vec<Selector>,
    /// Next-page control on the results page.
    pub next_page: Vec<Selector>,
}

fn parse_all(sources: &[&str]) -> Vec<Selector> {
    sources.iter().map(|s| Selector::parse(s).unwrap()).collect()
}

static FALABELLA: LazyLock<SiteSelectors> = LazyLock::new(|| SiteSelectors {
    containers: parse_all(&[
        "div.pod",
        "div.search-results > div",
        "div[data-pod]",
        "section[data-testid=\"search-results\"] > div",
        "div.pod-container",
    ]),
    title: parse_all(&[
        "b.pod-subTitle",
        "div.pod-title",
        "h3[data-testid=\"product-title\"]",
        "a[data-testid=\"product-link\"]",
        ".pod-title",
    ]),
    link: parse_all(&["a"]),
    price: parse_all(&[
        "li.price-0 span",
        "span[data-testid=\"price\"]",
        "div.prices span",
        "span.copy10",
        ".pod-prices .price",
    ]),
    vendor: parse_all(&[
        "span.pod-subTitle-2",
        "div.brand",
        "span[data-testid=\"brand\"]",
        ".pod-subTitle-2",
    ]),
    next_page: parse_all(&[
        "a[title=\"Siguiente\"]",
        "button[aria-label=\"Siguiente\"]",
        "li.pagination-next a",
        "a.pagination-next",
        ".pagination-next",
    ]),
});

static MERCADOLIBRE: LazyLock<SiteSelectors> = LazyLock::new(|| SiteSelectors {
    containers: parse_all(&[
        "li.ui-search-layout__item",
        "div.ui-search-result",
        "ol.ui-search-layout > li",
        "section[data-testid=\"results-section\"] > div",
        ".ui-search-result",
    ]),
    title: parse_all(&[
        "h2.ui-search-item__title",
        "a.ui-search-item__group__element",
        "div.ui-search-result__content-wrapper h2",
        ".ui-search-item__title",
    ]),
    link: parse_all(&["a.ui-search-link"]),
    price: parse_all(&[
        "span.price-tag-fraction",
        "span.andes-money-amount__fraction",
        "div.ui-search-price__second-line span",
        ".ui-search-price__second-line .price-tag-fraction",
    ]),
    vendor: parse_all(&[
        "span.ui-search-official-store-label",
        "p.ui-search-official-store-label",
        "span.ui-search-item__group__element.ui-search-link__title",
        ".ui-search-official-store-label",
    ]),
    next_page: parse_all(&[
        "a[title=\"Siguiente\"]",
        "li.andes-pagination__button--next a",
        "span.andes-pagination__arrow--next",
        ".andes-pagination__button--next a",
    ]),
});

impl Site {
    /// Returns the selector chains for this site.
    pub fn selectors(&self) -> &'static SiteSelectors {
        match self {
            Site::Falabella => &FALABELLA,
            Site::MercadoLibre => &MERCADOLIBRE,
        }
    }
}
