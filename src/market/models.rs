//! Data model for extracted product records.

use crate::market::sites::Site;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One product scraped from a search-results page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// 1-based rank in the final result sequence.
    pub position: usize,
    /// Product title.
    pub title: String,
    /// Raw price text as shown on the page.
    pub price_text: String,
    /// Normalized whole soles amount, if one could be recovered.
    pub price: Option<u64>,
    /// Product URL, empty when no link was found.
    pub url: String,
    /// Brand, when the site exposes one (Falabella).
    pub brand: Option<String>,
    /// Seller, when the site exposes one (MercadoLibre official stores).
    pub seller: Option<String>,
    /// Site the record came from.
    pub site: Site,
    /// Keyword that produced the record.
    pub keyword: String,
    /// Extraction time.
    pub timestamp: DateTime<Utc>,
    /// 1-based rank within the page it was extracted from.
    pub original_index: usize,
}

impl ProductRecord {
    /// A record is only surfaced when both a title and a price are present.
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && self.price.is_some()
    }

    /// Brand or seller, whichever the site exposes.
    pub fn vendor(&self) -> Option<&str> {
        self.brand.as_deref().or(self.seller.as_deref())
    }

    /// Identity used for deduplication across pages.
    pub fn fingerprint(&self) -> String {
        if self.url.is_empty() {
            format!("{}|{}", self.title, self.price_text)
        } else {
            self.url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(title: &str, price: Option<u64>, url: &str) -> ProductRecord {
        ProductRecord {
            position: 1,
            title: title.to_string(),
            price_text: "S/ 99,90".to_string(),
            price,
            url: url.to_string(),
            brand: Some("TestBrand".to_string()),
            seller: None,
            site: Site::Falabella,
            keyword: "mouse".to_string(),
            timestamp: Utc::now(),
            original_index: 1,
        }
    }

    #[test]
    fn test_validity() {
        assert!(make_record("Mouse", Some(100), "https://x/p").is_valid());
        assert!(!make_record("", Some(100), "https://x/p").is_valid());
        assert!(!make_record("Mouse", None, "https://x/p").is_valid());
    }

    #[test]
    fn test_fingerprint_prefers_url() {
        let with_url = make_record("Mouse", Some(100), "https://x/p");
        assert_eq!(with_url.fingerprint(), "https://x/p");

        let without_url = make_record("Mouse", Some(100), "");
        assert_eq!(without_url.fingerprint(), "Mouse|S/ 99,90");
    }

    #[test]
    fn test_vendor_prefers_brand() {
        let mut record = make_record("Mouse", Some(100), "https://x/p");
        assert_eq!(record.vendor(), Some("TestBrand"));

        record.brand = None;
        record.seller = Some("TiendaOficial".to_string());
        assert_eq!(record.vendor(), Some("TiendaOficial"));

        record.seller = None;
        assert_eq!(record.vendor(), None);
    }

    #[test]
    fn test_wire_field_names() {
        let record = make_record("Mouse", Some(100), "https://x/p");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"priceText\""));
        assert!(json.contains("\"originalIndex\""));
        assert!(json.contains("\"site\":\"falabella\""));

        let parsed: ProductRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.title, record.title);
        assert_eq!(parsed.price, record.price);
    }
}
