//! pe-crawler - Product search scraper for Peruvian e-commerce sites
//!
//! Scrapes Falabella and MercadoLibre search results through emulated browser
//! tabs: a supervisor owns the job and tab registries, and per-tab worker
//! sessions walk the paginated results with cooperative cancellation.

pub mod commands;
pub mod config;
pub mod format;
pub mod host;
pub mod market;
pub mod protocol;
pub mod session;
pub mod store;
pub mod supervisor;
pub mod walker;

pub use config::Config;
pub use market::{ProductRecord, Site};
pub use protocol::{ControlCommand, Event, JobKey};
pub use supervisor::{Supervisor, SupervisorHandle};
