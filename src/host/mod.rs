//! Tab hosting seams.
//!
//! The browser primitives the supervisor consumes - open a tab at a URL, wait
//! for it to load, navigate it, close it - are opaque async facilities behind
//! these traits. Production uses [`http::HttpHost`]; tests substitute fixture
//! hosts serving canned documents.

pub mod http;

use crate::protocol::TabId;
use anyhow::Result;
use async_trait::async_trait;

pub use http::{HttpHost, HttpTab};

/// One live tab showing a results page.
#[async_trait]
pub trait PageTab: Send + 'static {
    /// Returns the current document's HTML.
    async fn document(&mut self) -> Result<String>;

    /// Navigates the tab to `url` and waits for the new document.
    async fn navigate(&mut self, url: &str) -> Result<()>;
}

/// Creates and destroys tabs.
#[async_trait]
pub trait TabHost: Send + Sync + 'static {
    type Tab: PageTab;

    /// Opens a tab at `url` and begins loading it.
    async fn open_tab(&self, url: &str) -> Result<(TabId, Self::Tab)>;

    /// Resolves once the tab has finished loading. Callers bound the wait
    /// with a timeout and proceed regardless; implementations may pend
    /// forever for pages that never report completion.
    async fn wait_for_load(&self, tab: TabId);

    /// Closes a tab. Closing an already-gone tab is not an error.
    async fn close_tab(&self, tab: TabId);
}
