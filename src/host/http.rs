//! HTTP-backed tab host using wreq for TLS fingerprint emulation.
//!
//! A "tab" here is a fetched document plus the client state (cookies, TLS
//! session) needed to follow pagination links the way a browser tab would.

use crate::config::Config;
use crate::host::{PageTab, TabHost};
use crate::protocol::TabId;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::RngExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Shared request plumbing: browser impersonation, politeness delay, and the
/// anti-bot response checks.
#[derive(Clone)]
struct Fetcher {
    client: Client,
    delay_ms: u64,
    delay_jitter_ms: u64,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("delay_ms", &self.delay_ms)
            .field("delay_jitter_ms", &self.delay_jitter_ms)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    async fn get(&self, url: &str) -> Result<String> {
        self.delay().await;

        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", "es-PE,es;q=0.9,en;q=0.8")
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Ch-Ua", "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"")
            .header("Sec-Ch-Ua-Mobile", "?0")
            .header("Sec-Ch-Ua-Platform", "\"macOS\"")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == 503 {
            warn!("Rate limited (503). Consider using a proxy or increasing delay.");
            anyhow::bail!("Rate limited. Try increasing --delay or using a proxy.");
        }

        if !status.is_success() {
            anyhow::bail!("Request failed with status: {}", status);
        }

        response.text().await.context("Failed to read response body")
    }

    /// Adds a random delay to mimic human behavior.
    async fn delay(&self) {
        if self.delay_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }
}

/// Tab host over plain HTTP fetches.
pub struct HttpHost {
    fetcher: Fetcher,
    next_id: AtomicU32,
}

impl HttpHost {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self {
            fetcher: Fetcher {
                client,
                delay_ms: config.delay_ms,
                delay_jitter_ms: config.delay_jitter_ms,
            },
            next_id: AtomicU32::new(1),
        })
    }
}

#[async_trait]
impl TabHost for HttpHost {
    type Tab = HttpTab;

    async fn open_tab(&self, url: &str) -> Result<(TabId, HttpTab)> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let html = self.fetcher.get(url).await?;
        Ok((id, HttpTab { fetcher: self.fetcher.clone(), html }))
    }

    // The document is fetched before open_tab returns, so the tab is already
    // loaded
    async fn wait_for_load(&self, _tab: TabId) {}

    async fn close_tab(&self, tab: TabId) {
        debug!("Closing tab {}", tab);
    }
}

/// One fetched document, navigable to follow-up pages.
#[derive(Debug)]
pub struct HttpTab {
    fetcher: Fetcher,
    html: String,
}

#[async_trait]
impl PageTab for HttpTab {
    async fn document(&mut self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.html = self.fetcher.get(url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_test_config() -> Config {
        Config {
            delay_ms: 0,        // No delay for tests
            delay_jitter_ms: 0, // No jitter for tests
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_open_tab_fetches_document() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/buscar"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body>resultados</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let host = HttpHost::new(&make_test_config()).unwrap();
        let (id, mut tab) = host.open_tab(&format!("{}/buscar", mock_server.uri())).await.unwrap();
        assert_eq!(id, 1);

        let html = tab.document().await.unwrap();
        assert!(html.contains("resultados"));
    }

    #[tokio::test]
    async fn test_navigate_replaces_document() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>uno</html>"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>dos</html>"))
            .mount(&mock_server)
            .await;

        let host = HttpHost::new(&make_test_config()).unwrap();
        let (_, mut tab) = host.open_tab(&format!("{}/p1", mock_server.uri())).await.unwrap();

        tab.navigate(&format!("{}/p2", mock_server.uri())).await.unwrap();
        assert!(tab.document().await.unwrap().contains("dos"));
    }

    #[tokio::test]
    async fn test_rate_limited_503() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let host = HttpHost::new(&make_test_config()).unwrap();
        let result = host.open_tab(&format!("{}/buscar", mock_server.uri())).await;
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Rate limited"));
    }

    #[tokio::test]
    async fn test_http_error_404() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let host = HttpHost::new(&make_test_config()).unwrap();
        let result = host.open_tab(&format!("{}/nada", mock_server.uri())).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_tab_ids_increment() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;

        let host = HttpHost::new(&make_test_config()).unwrap();
        let url = format!("{}/buscar", mock_server.uri());
        let (first, _) = host.open_tab(&url).await.unwrap();
        let (second, _) = host.open_tab(&url).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_invalid_proxy_rejected() {
        let mut config = make_test_config();
        config.proxy = Some("not a proxy url".to_string());

        let result = HttpHost::new(&config);
        assert!(result.is_err());
    }
}
