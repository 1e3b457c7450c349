//! Site knowledge: identities, selector chains, price normalization, and
//! results-page parsing.

pub mod models;
pub mod parser;
pub mod price;
pub mod selectors;
pub mod sites;

pub use models::ProductRecord;
pub use parser::{extract_record, scan_page, PageScan};
pub use selectors::SiteSelectors;
pub use sites::{Site, SiteParseError};
