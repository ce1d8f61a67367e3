//! Webpage fetching and main-content extraction.
//!
//! Selector priority: `article`, `main`, `[role=main]`, `.content`,
//! `.main-content`; body as fallback with scripts and styles skipped.
//! Extracted text is truncated to 5000 characters.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, WebError};

const MAX_CONTENT_CHARS: usize = 5000;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role='main']", ".content", ".main-content"];

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s\)\]\}]+").unwrap())
}

/// All unique HTTP(S) URLs in `text`, in order of first appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in url_pattern().find_iter(text) {
        let url = m.as_str().to_string();
        if !seen.contains(&url) {
            seen.push(url);
        }
    }
    seen
}

pub struct WebFetcher {
    http: reqwest::Client,
}

impl WebFetcher {
    pub fn new(timeout_seconds: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self { http }
    }

    /// Fetch `url` and return the page's main content as plain text.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let url = normalize_url(url)?;
        let resp = self.http.get(&url).send().await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(WebError::Status(status));
        }
        let body = resp.text().await?;
        let content = extract_main_content(&body);
        info!(url = %url, content_len = content.len(), "webpage fetched");
        Ok(content)
    }
}

/// Convenience wrapper used by the answer pipeline: fetch up to `max_urls`
/// pages, skipping failures.
pub async fn fetch_webpage(
    fetcher: &WebFetcher,
    urls: &[String],
    max_urls: usize,
) -> Vec<(String, String)> {
    let mut pages = Vec::new();
    for url in urls.iter().take(max_urls) {
        match fetcher.fetch(url).await {
            Ok(content) if !content.is_empty() => pages.push((url.clone(), content)),
            Ok(_) => debug!(url = %url, "page had no readable text"),
            Err(e) => debug!(url = %url, error = %e, "webpage fetch failed"),
        }
    }
    pages
}

fn normalize_url(url: &str) -> Result<String> {
    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    // Must at least have a host component.
    let after_scheme = url.split("://").nth(1).unwrap_or("");
    if after_scheme.split('/').next().unwrap_or("").is_empty() {
        return Err(WebError::InvalidUrl(url));
    }
    Ok(url)
}

/// Extract readable text from an HTML document, preferring content-rich
/// containers and never including script/style text.
pub fn extract_main_content(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = collect_text(element);
            if !text.trim().is_empty() {
                return truncate_content(&text);
            }
        }
    }

    // Fallback: whole body. scraper's text() traverses text nodes including
    // script bodies, so sweep the content-bearing elements instead.
    let mut paragraphs = Vec::new();
    if let Ok(body) = Selector::parse("body") {
        if let Some(body_el) = document.select(&body).next() {
            for tag in ["p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "td"] {
                let Ok(selector) = Selector::parse(tag) else {
                    continue;
                };
                for el in body_el.select(&selector) {
                    let text = collect_text(el);
                    if !text.is_empty() {
                        paragraphs.push(text);
                    }
                }
            }
        }
    }
    paragraphs.dedup();
    truncate_content(&paragraphs.join("\n"))
}

fn collect_text(element: scraper::ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    for piece in element.text() {
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    lines.join("\n")
}

fn truncate_content(text: &str) -> String {
    if text.chars().count() <= MAX_CONTENT_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_CONTENT_CHARS).collect();
    format!("{truncated}...[内容已截断]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_extracted_and_deduplicated() {
        let text = "看 https://example.com/a 和 https://example.com/b，再看 https://example.com/a";
        let urls = extract_urls(text);
        assert_eq!(
            urls,
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn url_stops_at_closing_bracket() {
        let urls = extract_urls("(见 https://example.com/page) 结束");
        assert_eq!(urls, vec!["https://example.com/page"]);
    }

    #[test]
    fn no_urls_means_empty() {
        assert!(extract_urls("没有链接").is_empty());
    }

    #[test]
    fn article_content_is_preferred() {
        let html = r#"<html><body>
            <nav>Navigation junk</nav>
            <article><p>Real content here.</p></article>
            <footer>Footer junk</footer>
        </body></html>"#;
        let content = extract_main_content(html);
        assert!(content.contains("Real content here."));
        assert!(!content.contains("Navigation junk"));
    }

    #[test]
    fn body_fallback_skips_scripts() {
        let html = r#"<html><body>
            <script>var secret = "do-not-leak";</script>
            <p>Visible paragraph.</p>
        </body></html>"#;
        let content = extract_main_content(html);
        assert!(content.contains("Visible paragraph."));
        assert!(!content.contains("do-not-leak"));
    }

    #[test]
    fn long_content_is_truncated() {
        let body = "字".repeat(6000);
        let html = format!("<html><body><article><p>{body}</p></article></body></html>");
        let content = extract_main_content(&html);
        assert!(content.chars().count() < 5100);
        assert!(content.ends_with("...[内容已截断]"));
    }

    #[test]
    fn scheme_is_added_when_missing() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com");
        assert!(normalize_url("https://").is_err());
    }
}
