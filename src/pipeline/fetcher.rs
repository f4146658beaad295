//! Document fetcher — downloads a page and reduces it to plain text.
//!
//! Cleaning rules:
//! - `script`, `style`, `header`, `footer`, `nav` and `aside` subtrees are dropped
//! - every text node is split into lines, trimmed, and empty lines removed
//! - every `<img src>` in the document is collected, including stripped regions

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Browser-like user agent sent with every document request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/86.0.4240.111 Safari/537.36";

/// Elements whose text never reaches the cleaned output.
const STRIPPED_TAGS: [&str; 6] = ["script", "style", "header", "footer", "nav", "aside"];

/// Plain text and image references extracted from a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedDocument {
    pub content: String,
    pub images: Vec<String>,
}

/// Source of cleaned documents.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<CleanedDocument, FetchError>;
}

/// Fetches documents over HTTP with reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(url = url, status = status.as_u16(), "Failed to retrieve the page");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<CleanedDocument, FetchError> {
        let html = self.fetch_html(url).await?;
        let document = clean_html(&html);
        info!(
            url = url,
            html_len = html.len(),
            text_len = document.content.len(),
            images = document.images.len(),
            "Fetched and cleaned document"
        );
        Ok(document)
    }
}

/// Reduce an HTML page to cleaned text plus its image references.
pub fn clean_html(html: &str) -> CleanedDocument {
    let document = Html::parse_document(html);

    let mut images = Vec::new();
    if let Ok(selector) = Selector::parse("img") {
        for img in document.select(&selector) {
            match img.value().attr("src") {
                Some(src) => images.push(src.to_string()),
                None => debug!("Skipping <img> without src"),
            }
        }
    }

    let mut lines = Vec::new();
    collect_lines(document.root_element(), &mut lines);

    CleanedDocument {
        content: lines.join("\n"),
        images,
    }
}

fn collect_lines(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if STRIPPED_TAGS.contains(&child_element.value().name()) {
                continue;
            }
            collect_lines(child_element, lines);
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            lines.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }
    }
}
