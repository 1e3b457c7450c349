//! Search command implementation.
//!
//! Drives one scrape job end to end: submits the start command, streams
//! progress, persists the outcome, and formats the final result set. Ctrl-C
//! turns into a cancel command rather than killing the job mid-page.

use crate::config::Config;
use crate::format::Formatter;
use crate::host::{HttpHost, TabHost};
use crate::market::models::ProductRecord;
use crate::market::sites::Site;
use crate::protocol::{Event, JobKey};
use crate::store::{self, KeyValueStore, ScrapingState};
use crate::supervisor::Supervisor;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Executes a product search on one site.
pub struct SearchCommand {
    config: Config,
}

enum Outcome {
    Completed(Vec<ProductRecord>),
    Cancelled,
    Failed(String),
}

impl SearchCommand {
    /// Creates a new search command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Executes the search and returns formatted output.
    pub async fn execute(
        &self,
        keyword: &str,
        site: Site,
        store: &dyn KeyValueStore,
    ) -> Result<String> {
        let host = Arc::new(HttpHost::new(&self.config).context("Failed to create HTTP host")?);
        self.execute_with_host(host, keyword, site, store).await
    }

    /// Executes the search with a provided tab host (for testing).
    pub async fn execute_with_host<H: TabHost>(
        &self,
        host: Arc<H>,
        keyword: &str,
        site: Site,
        store: &dyn KeyValueStore,
    ) -> Result<String> {
        let key = JobKey::new(keyword, site);
        info!("Searching {} for: {}", site, keyword);

        store::remember_keyword(store, keyword)?;
        store::set_scraping_state(store, &ScrapingState::active(&key))?;

        let handle = Supervisor::spawn(host, self.config.timing());
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        handle.attach_control(events_tx);
        handle.start(&key);

        let interrupt_handle = handle.clone();
        let interrupt_key = key.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling {}", interrupt_key);
                interrupt_handle.cancel(&interrupt_key);
            }
        });

        let mut outcome = Outcome::Failed("supervisor closed the event stream".to_string());
        while let Some(event) = events_rx.recv().await {
            match event {
                Event::Progress { count, .. } => {
                    info!("Extracted {} products so far", count);
                }
                Event::Result { data, .. } => {
                    outcome = Outcome::Completed(data);
                    break;
                }
                Event::Cancelled { .. } => {
                    outcome = Outcome::Cancelled;
                    break;
                }
                Event::Error { error, .. } => {
                    outcome = Outcome::Failed(error);
                    break;
                }
                Event::Connected { .. } | Event::Pong { .. } => {}
            }
        }

        interrupt.abort();
        handle.shutdown();
        store::set_scraping_state(store, &ScrapingState::idle())?;

        match outcome {
            Outcome::Completed(records) => {
                info!("Scrape finished with {} products", records.len());
                store::record_result(store, &key, &records)?;
                let formatter = Formatter::new(self.config.format);
                Ok(formatter.format_records(&records))
            }
            Outcome::Cancelled => Ok("Scrape cancelled.".to_string()),
            Outcome::Failed(error) => anyhow::bail!("Scrape failed: {}", error),
        }
    }
}
