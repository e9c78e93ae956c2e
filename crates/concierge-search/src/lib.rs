//! DuckDuckGo Instant Answer adapter (search engine).

use serde_json::Value;

use concierge_core::{
    errors::Error,
    ports::{SearchPort, SearchResults},
    Result,
};

#[derive(Clone, Debug)]
pub struct DuckDuckGoClient {
    endpoint: String,
    http: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new(endpoint: impl Into<String>, timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");

        Self {
            endpoint: endpoint.into(),
            http,
        }
    }
}

fn map_request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::ServiceUnavailable("search request timed out".to_string());
    }
    Error::ServiceUnavailable(format!("search request error: {e}"))
}

/// Extract the abstract plus related links, preserving engine order.
fn parse_results(v: &Value) -> SearchResults {
    let summary = v
        .get("AbstractText")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut links = Vec::new();
    if let Some(topics) = v.get("RelatedTopics").and_then(Value::as_array) {
        for topic in topics {
            collect_links(topic, &mut links);
        }
    }

    SearchResults { summary, links }
}

/// `RelatedTopics` entries are either plain results or named groups holding a
/// nested `Topics` array.
fn collect_links(topic: &Value, links: &mut Vec<String>) {
    if let Some(url) = topic.get("FirstURL").and_then(Value::as_str) {
        links.push(url.to_string());
        return;
    }
    if let Some(nested) = topic.get("Topics").and_then(Value::as_array) {
        for t in nested {
            collect_links(t, links);
        }
    }
}

#[async_trait::async_trait]
impl SearchPort for DuckDuckGoClient {
    async fn search(&self, query: &str) -> Result<SearchResults> {
        if query.trim().is_empty() {
            // Rejected before any call goes out.
            return Err(Error::Validation("search query is empty".to_string()));
        }

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("no_redirect", "1"),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            return Err(Error::ServiceUnavailable(format!(
                "search engine returned {status}"
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("search json error: {e}")))?;

        Ok(parse_results(&v))
    }
}
