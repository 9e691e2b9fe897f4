//! Web search via DuckDuckGo's HTML endpoint.
//!
//! DuckDuckGo has no free JSON API for full web results, so the HTML
//! results page is fetched and parsed with `scraper`. Only titles and
//! snippets are extracted; the output is a plain-text block suitable for
//! reading aloud or embedding in an email.

use crate::error::ToolError;
use scraper::{Html, Selector};
use std::time::Duration;

/// HTTP timeout for a search request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum HTML body size to download (512 KiB).
const MAX_HTML_BYTES: usize = 512 * 1024;

/// Number of results included in the output.
const MAX_RESULTS: usize = 5;

const SEARCH_BASE: &str = "https://html.duckduckgo.com";

/// DuckDuckGo search client.
#[derive(Debug, Clone)]
pub struct SearchService {
    http: reqwest::Client,
    base: String,
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchService {
    pub fn new() -> Self {
        Self::with_base(SEARCH_BASE)
    }

    /// Builds a service pointed at an alternate host.
    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .user_agent(concat!("aria-tools/", env!("CARGO_PKG_VERSION"), " (search)"))
                .build()
                .unwrap_or_default(),
            base: base.into(),
        }
    }

    /// Runs one search and returns the top results as a text block.
    pub async fn search(&self, query: &str) -> Result<String, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("query is required".to_string()));
        }

        let url = format!("{}/html/", self.base);
        let response = self.http.get(&url).query(&[("q", query)]).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Upstream {
                service: "duckduckgo",
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_HTML_BYTES {
            return Err(ToolError::Parse(format!(
                "results page too large: {} bytes (limit {})",
                bytes.len(),
                MAX_HTML_BYTES
            )));
        }

        let html = String::from_utf8_lossy(&bytes);
        let results = parse_results(&html);
        if results.is_empty() {
            return Ok(format!("No results found for '{}'.", query));
        }

        tracing::info!(query = %query, count = results.len(), "search completed");
        Ok(results.join("\n"))
    }
}

/// Extracts `title — snippet` lines from a DuckDuckGo HTML results page.
fn parse_results(html: &str) -> Vec<String> {
    // Selector literals are fixed at compile time; parse() cannot fail on them.
    let result_sel = Selector::parse(".result").expect("valid selector");
    let title_sel = Selector::parse(".result__title").expect("valid selector");
    let snippet_sel = Selector::parse(".result__snippet").expect("valid selector");

    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for result in document.select(&result_sel).take(MAX_RESULTS) {
        let title = result
            .select(&title_sel)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();

        if snippet.is_empty() {
            results.push(title);
        } else {
            results.push(format!("{} — {}", title, snippet));
        }
    }

    results
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, response::Html as AxumHtml, routing::get, Router};
    use std::collections::HashMap;
    use std::net::SocketAddr;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <div class="result">
            <h2 class="result__title"><a href="https://example.com/a">First   hit</a></h2>
            <a class="result__snippet">Something  useful about the query.</a>
          </div>
          <div class="result">
            <h2 class="result__title"><a href="https://example.com/b">Second hit</a></h2>
          </div>
          <div class="result"><span class="result__snippet">orphan snippet</span></div>
        </body></html>
    "#;

    async fn start_mock(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind listener");
        let addr = listener.local_addr().expect("failed to get local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server failed");
        });
        addr
    }

    #[test]
    fn parses_titles_and_snippets() {
        let results = parse_results(RESULTS_PAGE);
        assert_eq!(results.len(), 2, "titleless results are skipped");
        assert_eq!(results[0], "First hit — Something useful about the query.");
        assert_eq!(results[1], "Second hit");
    }

    #[tokio::test]
    async fn search_passes_query_and_joins_results() {
        let router = Router::new().route(
            "/html/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("q").map(String::as_str), Some("rust web servers"));
                AxumHtml(RESULTS_PAGE)
            }),
        );
        let addr = start_mock(router).await;
        let service = SearchService::with_base(format!("http://{}", addr));

        let text = service.search("rust web servers").await.expect("search failed");
        assert!(text.contains("First hit"));
        assert!(text.contains("Second hit"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn empty_results_page_yields_friendly_message() {
        let router = Router::new().route(
            "/html/",
            get(|| async { AxumHtml("<html><body></body></html>") }),
        );
        let addr = start_mock(router).await;
        let service = SearchService::with_base(format!("http://{}", addr));

        let text = service.search("nothing").await.expect("search failed");
        assert!(text.contains("No results found for 'nothing'"));
    }

    #[tokio::test]
    async fn upstream_failure_is_typed() {
        let router = Router::new().route(
            "/html/",
            get(|| async { axum::http::StatusCode::TOO_MANY_REQUESTS }),
        );
        let addr = start_mock(router).await;
        let service = SearchService::with_base(format!("http://{}", addr));

        let err = service.search("anything").await.expect_err("expected failure");
        assert!(matches!(
            err,
            ToolError::Upstream { service: "duckduckgo", status: 429 }
        ));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let service = SearchService::with_base("http://127.0.0.1:9");
        let err = service.search("  ").await.expect_err("expected failure");
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
