//! SearXNG search client — one JSON call, snippets formatted for the prompt.

use serde_json::Value;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, WebError};

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl SearchClient {
    /// Returns `None` when no SearXNG instance is configured.
    pub fn new(base_url: &str, timeout_seconds: u64) -> Option<Self> {
        if base_url.is_empty() {
            return None;
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .unwrap_or_default();
        Some(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run a search and return the top snippets as a prompt-ready block.
    pub async fn search(&self, query: &str, num_results: usize) -> Result<String> {
        if query.trim().is_empty() {
            return Err(WebError::Empty);
        }

        let url = format!("{}/search", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("pageno", "1"),
                ("results", &num_results.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(WebError::Status(status));
        }

        let data: Value = resp.json().await?;
        let results = data
            .get("results")
            .and_then(Value::as_array)
            .filter(|r| !r.is_empty())
            .ok_or(WebError::Empty)?;

        info!(query = %query, results = results.len(), "search completed");
        Ok(format_results(results, num_results))
    }
}

pub(crate) fn format_results(results: &[Value], num_results: usize) -> String {
    results
        .iter()
        .take(num_results)
        .enumerate()
        .map(|(i, result)| {
            let title = result.get("title").and_then(Value::as_str).unwrap_or("");
            let url = result.get("url").and_then(Value::as_str).unwrap_or("");
            let snippet: String = result
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or("")
                .chars()
                .take(200)
                .collect();
            format!("{}. {title}\n   链接: {url}\n   摘要: {snippet}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn results_are_numbered_and_capped() {
        let results = vec![
            json!({"title": "One", "url": "https://a", "content": "first"}),
            json!({"title": "Two", "url": "https://b", "content": "second"}),
            json!({"title": "Three", "url": "https://c", "content": "third"}),
        ];
        let out = format_results(&results, 2);
        assert!(out.starts_with("1. One"));
        assert!(out.contains("2. Two"));
        assert!(!out.contains("Three"));
    }

    #[test]
    fn long_snippets_are_clipped() {
        let results = vec![json!({"title": "T", "url": "https://a", "content": "x".repeat(500)})];
        let out = format_results(&results, 1);
        assert!(out.len() < 300);
    }

    #[test]
    fn unconfigured_search_is_none() {
        assert!(SearchClient::new("", 10).is_none());
        assert!(SearchClient::new("http://searx.local", 10).is_some());
    }
}
