//! Message contract between the control surface, the supervisor, and the
//! per-tab workers.
//!
//! The shapes are wire-compatible with the JSON the browser-extension
//! incarnation of this protocol exchanged over its ports: commands are tagged
//! with `type`, worker instructions with `action`, and events relayed to the
//! control surface may carry the originating `tabId`.

use crate::market::models::ProductRecord;
use crate::market::sites::Site;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one scraping tab.
pub type TabId = u32;

/// Millisecond timestamp used on every event.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Identifies one logical scrape request: at most one job runs per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub keyword: String,
    pub site: Site,
}

impl JobKey {
    pub fn new(keyword: impl Into<String>, site: Site) -> Self {
        Self { keyword: keyword.into(), site }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.keyword, self.site)
    }
}

/// Commands from the control surface to the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlCommand {
    Start { keyword: String, site: Site, timestamp: i64 },
    Cancel { keyword: String, site: Site },
    Ping,
}

/// Instructions from the supervisor to a worker session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WorkerCommand {
    StartScraping { keyword: String, site: Site, url: String, timestamp: i64 },
    CancelScraping,
}

/// Events flowing from workers to the supervisor and on to the control
/// surface. Workers emit them untagged; the supervisor sets `tabId` on relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Connected {
        timestamp: i64,
    },
    Pong {
        timestamp: i64,
    },
    Progress {
        keyword: String,
        site: Site,
        count: usize,
        timestamp: i64,
        #[serde(rename = "tabId", skip_serializing_if = "Option::is_none", default)]
        tab_id: Option<TabId>,
    },
    Result {
        keyword: String,
        site: Site,
        data: Vec<ProductRecord>,
        count: usize,
        timestamp: i64,
        #[serde(rename = "tabId", skip_serializing_if = "Option::is_none", default)]
        tab_id: Option<TabId>,
    },
    Error {
        keyword: String,
        site: Site,
        error: String,
        timestamp: i64,
        #[serde(rename = "tabId", skip_serializing_if = "Option::is_none", default)]
        tab_id: Option<TabId>,
    },
    Cancelled {
        keyword: String,
        site: Site,
        timestamp: i64,
        #[serde(rename = "tabId", skip_serializing_if = "Option::is_none", default)]
        tab_id: Option<TabId>,
    },
}

impl Event {
    pub fn connected() -> Self {
        Event::Connected { timestamp: now_ms() }
    }

    pub fn pong() -> Self {
        Event::Pong { timestamp: now_ms() }
    }

    pub fn progress(key: &JobKey, count: usize) -> Self {
        Event::Progress {
            keyword: key.keyword.clone(),
            site: key.site,
            count,
            timestamp: now_ms(),
            tab_id: None,
        }
    }

    pub fn result(key: &JobKey, data: Vec<ProductRecord>) -> Self {
        let count = data.len();
        Event::Result {
            keyword: key.keyword.clone(),
            site: key.site,
            data,
            count,
            timestamp: now_ms(),
            tab_id: None,
        }
    }

    pub fn error(key: &JobKey, error: impl Into<String>) -> Self {
        Event::Error {
            keyword: key.keyword.clone(),
            site: key.site,
            error: error.into(),
            timestamp: now_ms(),
            tab_id: None,
        }
    }

    pub fn cancelled(key: &JobKey) -> Self {
        Event::Cancelled {
            keyword: key.keyword.clone(),
            site: key.site,
            timestamp: now_ms(),
            tab_id: None,
        }
    }

    /// Stamps the originating tab onto a relayed event.
    pub fn with_tab(mut self, tab: TabId) -> Self {
        match &mut self {
            Event::Progress { tab_id, .. }
            | Event::Result { tab_id, .. }
            | Event::Error { tab_id, .. }
            | Event::Cancelled { tab_id, .. } => *tab_id = Some(tab),
            Event::Connected { .. } | Event::Pong { .. } => {}
        }
        self
    }

    /// True for the events that end a job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Result { .. } | Event::Error { .. } | Event::Cancelled { .. }
        )
    }

    /// The job this event belongs to, when it carries one.
    pub fn job_key(&self) -> Option<JobKey> {
        match self {
            Event::Progress { keyword, site, .. }
            | Event::Result { keyword, site, .. }
            | Event::Error { keyword, site, .. }
            | Event::Cancelled { keyword, site, .. } => Some(JobKey::new(keyword.clone(), *site)),
            Event::Connected { .. } | Event::Pong { .. } => None,
        }
    }
}
