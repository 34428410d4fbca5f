// src/services/source.rs

//! Results page sources.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::SourceConfig;
use crate::utils::http;

/// Something that yields the raw results markup.
///
/// `Ok(None)` means no source is configured; the cycle then runs with zero
/// scraped rows. Errors are transport or status failures.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self) -> Result<Option<String>>;
}

/// Fetches the configured URL over HTTP.
pub struct HttpSource {
    client: Client,
    url: Option<String>,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            url: config.url.clone().filter(|u| !u.trim().is_empty()),
        })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self) -> Result<Option<String>> {
        let Some(url) = &self.url else {
            return Ok(None);
        };
        log::debug!("Fetching {}", url);
        http::fetch_text(&self.client, url).await.map(Some)
    }
}

/// Serves fixed markup; used by `scrape --file` and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    markup: Option<String>,
}

impl StaticSource {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: Some(markup.into()),
        }
    }

    /// A source with nothing configured.
    pub fn unconfigured() -> Self {
        Self { markup: None }
    }
}

#[async_trait]
impl PageSource for StaticSource {
    async fn fetch(&self) -> Result<Option<String>> {
        Ok(self.markup.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Router, http::StatusCode, routing::get};
    use tokio::net::TcpListener;

    use super::*;
    use crate::error::AppError;

    const PAGE: &str = "<table><tr><td>7</td><td>Lee</td></tr></table>";

    /// Serve a small results site on an ephemeral port and return its base URL.
    async fn spawn_results_site() -> String {
        let app = Router::new()
            .route("/live", get(|| async { PAGE }))
            .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "late"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn source_for(url: String) -> HttpSource {
        let config = SourceConfig {
            url: Some(url),
            timeout_secs: 1,
            ..SourceConfig::default()
        };
        HttpSource::new(&config).unwrap()
    }

    #[tokio::test]
    async fn http_source_returns_page_body() {
        let base = spawn_results_site().await;
        let body = source_for(format!("{base}/live")).fetch().await.unwrap();
        assert_eq!(body.as_deref(), Some(PAGE));
    }

    #[tokio::test]
    async fn http_source_fails_on_error_status() {
        let base = spawn_results_site().await;
        match source_for(format!("{base}/down")).fetch().await {
            Err(err @ AppError::Status { status: 503, .. }) => {
                assert!(err.is_fetch_failure());
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_source_times_out() {
        let base = spawn_results_site().await;
        match source_for(format!("{base}/slow")).fetch().await {
            Err(err @ AppError::Http(_)) => {
                assert!(err.is_fetch_failure());
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_source_without_url_fetches_nothing() {
        let source = HttpSource::new(&SourceConfig::default()).unwrap();
        assert_eq!(source.fetch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn blank_url_counts_as_unconfigured() {
        let config = SourceConfig {
            url: Some("  ".to_string()),
            ..SourceConfig::default()
        };
        let source = HttpSource::new(&config).unwrap();
        assert_eq!(source.fetch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn static_source_returns_markup() {
        let source = StaticSource::new("<table></table>");
        assert_eq!(
            source.fetch().await.unwrap().as_deref(),
            Some("<table></table>")
        );
        assert_eq!(StaticSource::unconfigured().fetch().await.unwrap(), None);
    }
}
