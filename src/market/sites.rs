//! Supported e-commerce sites and their per-site constants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sites the crawler knows how to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    #[default]
    Falabella,
    MercadoLibre,
}

impl Site {
    /// Returns the origin used to resolve relative hrefs.
    pub fn origin(&self) -> &'static str {
        match self {
            Site::Falabella => "https://www.falabella.com.pe",
            Site::MercadoLibre => "https://listado.mercadolibre.com.pe",
        }
    }

    /// Builds the search-results URL for a keyword.
    ///
    /// Falabella takes the keyword as an `Ntt` query parameter; MercadoLibre
    /// takes it dash-joined in the path.
    pub fn search_url(&self, keyword: &str) -> String {
        match self {
            Site::Falabella => format!(
                "{}/falabella-pe/search?Ntt={}",
                self.origin(),
                urlencoding::encode(keyword)
            ),
            Site::MercadoLibre => {
                let dashed = keyword.split_whitespace().collect::<Vec<_>>().join("-");
                format!("{}/{}", self.origin(), urlencoding::encode(&dashed))
            }
        }
    }

    /// Hard cap on result pages walked per job.
    pub fn max_pages(&self) -> u32 {
        match self {
            Site::Falabella => 3,
            Site::MercadoLibre => 5,
        }
    }

    /// Advisory minimum record count for a full walk. Shortfalls are logged,
    /// never treated as failures.
    pub fn min_expected_records(&self) -> usize {
        match self {
            Site::Falabella => 60,
            Site::MercadoLibre => 100,
        }
    }

    /// Returns all supported sites.
    pub fn all() -> &'static [Site] {
        &[Site::Falabella, Site::MercadoLibre]
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Site::Falabella => "falabella",
            Site::MercadoLibre => "mercadolibre",
        };
        write!(f, "{}", code)
    }
}

/// Error returned when a site name cannot be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown site: {0}. Use: falabella, mercadolibre")]
pub struct SiteParseError(String);

impl FromStr for Site {
    type Err = SiteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "falabella" | "fb" => Ok(Site::Falabella),
            "mercadolibre" | "mercado libre" | "meli" | "ml" => Ok(Site::MercadoLibre),
            other => Err(SiteParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url_falabella() {
        let url = Site::Falabella.search_url("mouse gamer");
        assert_eq!(
            url,
            "https://www.falabella.com.pe/falabella-pe/search?Ntt=mouse%20gamer"
        );
    }

    #[test]
    fn test_search_url_mercadolibre_dashes() {
        let url = Site::MercadoLibre.search_url("mouse  gamer inalambrico");
        assert_eq!(
            url,
            "https://listado.mercadolibre.com.pe/mouse-gamer-inalambrico"
        );
    }

    #[test]
    fn test_page_caps() {
        assert_eq!(Site::Falabella.max_pages(), 3);
        assert_eq!(Site::MercadoLibre.max_pages(), 5);
    }

    #[test]
    fn test_advisory_minimums() {
        assert_eq!(Site::Falabella.min_expected_records(), 60);
        assert_eq!(Site::MercadoLibre.min_expected_records(), 100);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("falabella".parse::<Site>().unwrap(), Site::Falabella);
        assert_eq!("FB".parse::<Site>().unwrap(), Site::Falabella);
        assert_eq!("mercadolibre".parse::<Site>().unwrap(), Site::MercadoLibre);
        assert_eq!("meli".parse::<Site>().unwrap(), Site::MercadoLibre);
        assert_eq!("ML".parse::<Site>().unwrap(), Site::MercadoLibre);

        let err = "amazon".parse::<Site>().unwrap_err();
        assert!(err.to_string().contains("unknown site"));
    }

    #[test]
    fn test_display_roundtrip() {
        for site in Site::all() {
            assert_eq!(site.to_string().parse::<Site>().unwrap(), *site);
        }
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Site::MercadoLibre).unwrap(), "\"mercadolibre\"");
        let parsed: Site = serde_json::from_str("\"falabella\"").unwrap();
        assert_eq!(parsed, Site::Falabella);
    }
}
