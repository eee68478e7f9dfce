//! Wire types for the search daemon's newline-framed JSON protocol

use serde::{Deserialize, Serialize};

fn default_page() -> usize {
    1
}

/// An incoming request. `t` selects the request type and defaults to a
/// page search.
#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(rename = "t", default)]
    pub request_type: String,

    #[serde(rename = "q", default)]
    pub query: String,

    #[serde(default = "default_page")]
    pub page: usize,

    /// image hash, for `getimg`
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageSearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(rename = "prank")]
    pub url_rank: f64,
    #[serde(rename = "hrank")]
    pub host_rank: f64,
    #[serde(rename = "score")]
    pub relevance: f64,
    pub content_type: String,
    pub content_size: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct PageSearchResponse {
    #[serde(rename = "n")]
    pub total_results: u64,
    pub results: Vec<PageSearchResult>,
    /// query duration in milliseconds
    pub duration: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub err: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSearchResult {
    #[serde(rename = "image_id")]
    pub image_hash: String,
    pub image: String,
    pub alt: String,
    #[serde(rename = "url")]
    pub source_url: String,
    pub fetch_time: i64,
    #[serde(rename = "score")]
    pub relevance: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct ImageSearchResponse {
    #[serde(rename = "n")]
    pub total_results: u64,
    pub results: Vec<ImageSearchResult>,
    /// query duration in milliseconds
    pub duration: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub err: String,
}
