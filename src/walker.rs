//! The pagination loop driving one scrape across result pages.

use crate::config::Timing;
use crate::host::PageTab;
use crate::market::models::ProductRecord;
use crate::market::parser;
use crate::market::sites::Site;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag, checked at the top of each page iteration.
/// Flipped at most once per job by the owning session; never reset.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How one walk ended.
#[derive(Debug)]
pub enum WalkOutcome {
    /// Natural termination: page cap reached or no next control. Carries the
    /// deduplicated, validity-filtered, re-positioned record sequence.
    Completed(Vec<ProductRecord>),
    /// The cancellation token was observed; nothing is carried out.
    Cancelled,
    /// A navigation or document fault aborted the walk; accumulated records
    /// are discarded.
    Failed(String),
}

/// Mutable state of one walk. Mutated only by the walker driving it.
#[derive(Debug)]
pub struct WalkState {
    pub keyword: String,
    pub site: Site,
    pub current_page: u32,
    pub max_pages: u32,
    pub records: Vec<ProductRecord>,
}

impl WalkState {
    fn new(keyword: &str, site: Site) -> Self {
        Self {
            keyword: keyword.to_string(),
            site,
            current_page: 1,
            max_pages: site.max_pages(),
            records: Vec::new(),
        }
    }
}

/// Walks one site's paginated result set: extract, report progress, advance,
/// until cancellation, the page cap, or page exhaustion.
pub async fn walk<T: PageTab>(
    tab: &mut T,
    site: Site,
    keyword: &str,
    token: CancelToken,
    timing: Timing,
    progress: mpsc::UnboundedSender<usize>,
) -> WalkOutcome {
    let mut state = WalkState::new(keyword, site);

    match drive(tab, &mut state, &token, timing, &progress).await {
        Ok(true) => {
            let records = finalize(std::mem::take(&mut state.records));
            let minimum = site.min_expected_records();
            if records.len() < minimum {
                warn!(
                    "Only {} records for \"{}\" on {} (advisory minimum: {})",
                    records.len(),
                    keyword,
                    site,
                    minimum
                );
            }
            info!("Walk complete: {} records over {} page(s)", records.len(), state.current_page);
            WalkOutcome::Completed(records)
        }
        Ok(false) => {
            debug!("Walk observed cancellation on page {}", state.current_page);
            WalkOutcome::Cancelled
        }
        Err(e) => {
            warn!("Walk failed on page {}: {:#}", state.current_page, e);
            WalkOutcome::Failed(format!("{:#}", e))
        }
    }
}

/// Runs the page loop. Returns Ok(true) on natural termination, Ok(false)
/// when the token was observed.
async fn drive<T: PageTab>(
    tab: &mut T,
    state: &mut WalkState,
    token: &CancelToken,
    timing: Timing,
    progress: &mpsc::UnboundedSender<usize>,
) -> Result<bool> {
    loop {
        // Cancellation outranks the page limits
        if token.is_cancelled() {
            return Ok(false);
        }

        debug!("Processing page {}", state.current_page);
        let html = tab.document().await?;
        let scan = parser::scan_page(&html, state.site, &state.keyword);
        state.records.extend(scan.records);
        let _ = progress.send(state.records.len());

        if state.current_page >= state.max_pages {
            debug!("Page cap reached ({})", state.max_pages);
            return Ok(true);
        }

        let Some(next_url) = scan.next_page else {
            debug!("No next-page control, result set exhausted");
            return Ok(true);
        };

        tab.navigate(&next_url).await?;
        state.current_page += 1;
        // Client-rendered pages need to settle before selectors are reliable
        tokio::time::sleep(timing.page_gap_delay).await;
    }
}

/// Validity-filters, deduplicates, and re-positions the accumulated records.
fn finalize(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    let mut out: Vec<ProductRecord> = Vec::new();

    for mut record in records {
        if !record.is_valid() {
            continue;
        }
        if !seen.insert(record.fingerprint()) {
            continue;
        }
        record.position = out.len() + 1;
        out.push(record);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Tab over canned documents keyed by URL.
    struct FakeTab {
        pages: HashMap<String, String>,
        url: String,
        navigations: Vec<String>,
    }

    impl FakeTab {
        fn new(start: &str, pages: Vec<(&str, String)>) -> Self {
            Self {
                pages: pages.into_iter().map(|(u, h)| (u.to_string(), h)).collect(),
                url: start.to_string(),
                navigations: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PageTab for FakeTab {
        async fn document(&mut self) -> Result<String> {
            self.pages
                .get(&self.url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("navigation failed: no document at {}", self.url))
        }

        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.navigations.push(url.to_string());
            self.url = url.to_string();
            Ok(())
        }
    }

    fn pod(title: &str, price: &str, path: &str) -> String {
        format!(
            r#"<div class="pod">
                <a href="{}"><b class="pod-subTitle">{}</b></a>
                <li class="price-0"><span>{}</span></li>
            </div>"#,
            path, title, price
        )
    }

    fn page(pods: &[String], next: Option<&str>) -> String {
        let next_html = next
            .map(|href| format!(r#"<a title="Siguiente" href="{}">Siguiente</a>"#, href))
            .unwrap_or_default();
        format!("<html><body>{}{}</body></html>", pods.join(""), next_html)
    }

    fn progress_channel() -> (mpsc::UnboundedSender<usize>, mpsc::UnboundedReceiver<usize>) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<usize>) -> Vec<usize> {
        let mut counts = Vec::new();
        while let Ok(count) = rx.try_recv() {
            counts.push(count);
        }
        counts
    }

    #[tokio::test]
    async fn test_two_page_walk() {
        let page1 = page(
            &[
                pod("Mouse A", "S/ 100", "/p/a"),
                pod("Mouse B", "S/ 200", "/p/b"),
                pod("Mouse C", "S/ 300", "/p/c"),
                // Invalid: no price
                r#"<div class="pod"><b class="pod-subTitle">Sin precio</b></div>"#.to_string(),
            ],
            Some("/search?page=2"),
        );
        let page2 = page(
            &[pod("Mouse D", "S/ 400", "/p/d"), pod("Mouse E", "S/ 500", "/p/e")],
            None,
        );

        let mut tab = FakeTab::new(
            "start",
            vec![
                ("start", page1),
                ("https://www.falabella.com.pe/search?page=2", page2),
            ],
        );

        let (tx, mut rx) = progress_channel();
        let outcome = walk(
            &mut tab,
            Site::Falabella,
            "mouse",
            CancelToken::new(),
            Timing::immediate(),
            tx,
        )
        .await;

        let WalkOutcome::Completed(records) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(records.len(), 5);
        let positions: Vec<usize> = records.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
        assert_eq!(records[3].title, "Mouse D");
        assert_eq!(drain(&mut rx), vec![3, 5]);
    }

    #[tokio::test]
    async fn test_page_cap_stops_walk() {
        // Every page links to the next; the cap (3 for Falabella) must stop us
        let mut pages = Vec::new();
        for n in 1..=10 {
            let html = page(
                &[pod(&format!("Mouse {}", n), "S/ 100", &format!("/p/{}", n))],
                Some(&format!("/search?page={}", n + 1)),
            );
            let url = if n == 1 {
                "start".to_string()
            } else {
                format!("https://www.falabella.com.pe/search?page={}", n)
            };
            pages.push((url, html));
        }
        let mut tab = FakeTab::new(
            "start",
            pages.iter().map(|(u, h)| (u.as_str(), h.clone())).collect(),
        );

        let (tx, mut rx) = progress_channel();
        let outcome = walk(
            &mut tab,
            Site::Falabella,
            "mouse",
            CancelToken::new(),
            Timing::immediate(),
            tx,
        )
        .await;

        let WalkOutcome::Completed(records) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(records.len(), 3);
        assert_eq!(tab.navigations.len(), 2);
        assert_eq!(drain(&mut rx), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_walk_emits_nothing() {
        let mut tab = FakeTab::new("start", vec![("start", page(&[pod("A", "S/ 1", "/a")], None))]);
        let token = CancelToken::new();
        token.cancel();

        let (tx, mut rx) = progress_channel();
        let outcome = walk(
            &mut tab,
            Site::Falabella,
            "mouse",
            token,
            Timing::immediate(),
            tx,
        )
        .await;

        assert!(matches!(outcome, WalkOutcome::Cancelled));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_navigation_fault_fails_walk() {
        let page1 = page(&[pod("Mouse A", "S/ 100", "/p/a")], Some("/search?page=2"));
        // Page 2 has no document: the navigate succeeds but the next
        // extraction cannot read the tab
        let mut tab = FakeTab::new("start", vec![("start", page1)]);

        let (tx, mut rx) = progress_channel();
        let outcome = walk(
            &mut tab,
            Site::Falabella,
            "mouse",
            CancelToken::new(),
            Timing::immediate(),
            tx,
        )
        .await;

        let WalkOutcome::Failed(message) = outcome else {
            panic!("expected failure");
        };
        assert!(message.contains("navigation failed"));
        // Progress for page 1 was still reported before the fault
        assert_eq!(drain(&mut rx), vec![1]);
    }

    #[tokio::test]
    async fn test_empty_page_degrades_to_zero_records() {
        let mut tab =
            FakeTab::new("start", vec![("start", "<html><body>vacio</body></html>".to_string())]);

        let (tx, mut rx) = progress_channel();
        let outcome = walk(
            &mut tab,
            Site::Falabella,
            "mouse",
            CancelToken::new(),
            Timing::immediate(),
            tx,
        )
        .await;

        let WalkOutcome::Completed(records) = outcome else {
            panic!("expected completion");
        };
        assert!(records.is_empty());
        assert_eq!(drain(&mut rx), vec![0]);
    }

    #[tokio::test]
    async fn test_duplicates_collapse_across_pages() {
        // Page 2 repeats a product from page 1
        let page1 = page(
            &[pod("Mouse A", "S/ 100", "/p/a"), pod("Mouse B", "S/ 200", "/p/b")],
            Some("/search?page=2"),
        );
        let page2 = page(
            &[pod("Mouse A", "S/ 100", "/p/a"), pod("Mouse C", "S/ 300", "/p/c")],
            None,
        );
        let mut tab = FakeTab::new(
            "start",
            vec![
                ("start", page1),
                ("https://www.falabella.com.pe/search?page=2", page2),
            ],
        );

        let (tx, _rx) = progress_channel();
        let outcome = walk(
            &mut tab,
            Site::Falabella,
            "mouse",
            CancelToken::new(),
            Timing::immediate(),
            tx,
        )
        .await;

        let WalkOutcome::Completed(records) = outcome else {
            panic!("expected completion");
        };
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Mouse A", "Mouse B", "Mouse C"]);
        assert_eq!(records[2].position, 3);
    }
}
