//! HTML parsing for search-results pages.
//!
//! All parsing is synchronous and string-in, records-out: `scraper::Html` is
//! not `Send` and must never be held across an await point.

use crate::market::models::ProductRecord;
use crate::market::price;
use crate::market::selectors::SiteSelectors;
use crate::market::sites::Site;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

static ANY_ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Everything one pass over a results page yields.
#[derive(Debug)]
pub struct PageScan {
    /// Records extracted from the page, in container order.
    pub records: Vec<ProductRecord>,
    /// Absolute URL of the next results page, when a next control was found.
    pub next_page: Option<String>,
}

/// Scans one results page: picks the container chain, extracts every product,
/// and locates the next-page control.
pub fn scan_page(html: &str, site: Site, keyword: &str) -> PageScan {
    let document = Html::parse_document(html);
    let selectors = site.selectors();

    let mut containers: Vec<ElementRef> = Vec::new();
    for selector in &selectors.containers {
        let found: Vec<ElementRef> = document.select(selector).collect();
        if !found.is_empty() {
            debug!("Using container selector with {} elements", found.len());
            containers = found;
            break;
        }
    }

    if containers.is_empty() {
        warn!("No product containers found on page");
    }

    let mut records = Vec::new();
    for (rank, element) in containers.iter().enumerate() {
        match extract_record(*element, site, keyword, rank) {
            Some(record) => {
                trace!("Extracted record: {}", record.title);
                records.push(record);
            }
            None => trace!("Skipping container {} (missing title or price)", rank),
        }
    }

    let next_page = next_page_target(&document, selectors, site);

    PageScan { records, next_page }
}

/// Extracts a single product record from one container element.
///
/// Title, link, and vendor use first-match-wins over their chains. Price keeps
/// trying later selectors when the matched text fails to normalize. Returns
/// `None` when the container lacks a non-empty title or a valid price.
pub fn extract_record(
    element: ElementRef,
    site: Site,
    keyword: &str,
    rank: usize,
) -> Option<ProductRecord> {
    let selectors = site.selectors();

    let mut title = String::new();
    let mut url = String::new();
    for selector in &selectors.title {
        if let Some(matched) = element.select(selector).next() {
            title = collect_text(matched);
            url = enclosing_link(matched)
                .or_else(|| first_link(element, &selectors.link))
                .map(|href| resolve_url(&href, site))
                .unwrap_or_default();
            break;
        }
    }

    let mut price_text = String::new();
    let mut price = None;
    for selector in &selectors.price {
        if let Some(matched) = element.select(selector).next() {
            price_text = collect_text(matched);
            price = price::normalize(&price_text);
            if price.is_some() {
                break;
            }
        }
    }

    let vendor = selectors
        .vendor
        .iter()
        .find_map(|selector| element.select(selector).next())
        .map(collect_text)
        .filter(|text| !text.is_empty());

    if title.is_empty() || price.is_none() {
        return None;
    }

    let (brand, seller) = match site {
        Site::Falabella => (vendor, None),
        Site::MercadoLibre => (None, vendor),
    };

    Some(ProductRecord {
        position: rank + 1,
        title,
        price_text,
        price,
        url,
        brand,
        seller,
        site,
        keyword: keyword.to_string(),
        timestamp: Utc::now(),
        original_index: rank + 1,
    })
}

/// Finds the next-page control and resolves its target URL.
///
/// The original control may be a plain anchor or a button wrapping one; the
/// href is taken from the matched element itself, a descendant anchor, or an
/// enclosing anchor, in that order. No href means no more pages.
fn next_page_target(document: &Html, selectors: &SiteSelectors, site: Site) -> Option<String> {
    let control = selectors
        .next_page
        .iter()
        .find_map(|selector| document.select(selector).next())?;

    let href = control
        .value()
        .attr("href")
        .map(str::to_owned)
        .or_else(|| {
            control
                .select(&ANY_ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href").map(str::to_owned))
        })
        .or_else(|| enclosing_link(control));

    match href {
        Some(href) => Some(resolve_url(&href, site)),
        None => {
            debug!("Next-page control present but carries no href");
            None
        }
    }
}

fn collect_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Walks up from an element looking for an enclosing anchor with an href.
fn enclosing_link(element: ElementRef) -> Option<String> {
    if element.value().name() == "a" {
        if let Some(href) = element.value().attr("href") {
            return Some(href.to_string());
        }
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href").map(str::to_owned))
}

fn first_link(element: ElementRef, chain: &[Selector]) -> Option<String> {
    chain
        .iter()
        .find_map(|selector| element.select(selector).next())
        .and_then(|a| a.value().attr("href").map(str::to_owned))
}

fn resolve_url(href: &str, site: Site) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", site.origin(), href)
    }
}
