//! Visitor: performs Gemini transactions for one shard queue
//!
//! Each visitor owns one inbound queue. Successful payloads are parsed
//! in place; every URL produces exactly one result on the shared results
//! queue. A one second pause after each URL caps per-host pressure.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use url::Url;

use crate::gemini::{Client, GeminiError, Response, StatusClass};
use crate::parse::parse_page;
use crate::{Engine, Result};

use super::{VisitResult, VISITOR_SLEEP};

pub async fn visitor(
    id: usize,
    engine: Arc<Engine>,
    mut queue: mpsc::Receiver<String>,
    results: mpsc::Sender<VisitResult>,
) -> Result<Vec<String>> {
    let client = Client::new(engine.certs.clone());
    let token = engine.shutdown.clone();

    loop {
        let url_str = tokio::select! {
            _ = token.cancelled() => break,
            received = queue.recv() => match received {
                Some(url) => url,
                None => break,
            },
        };

        tracing::debug!("[visitor {}] Processing {}", id, url_str);

        let result = tokio::select! {
            r = visit_url(&client, &url_str) => r,
            _ = token.cancelled() => break,
        };

        tokio::select! {
            _ = results.send(result) => {}
            _ = token.cancelled() => break,
        }

        tokio::select! {
            _ = tokio::time::sleep(VISITOR_SLEEP) => {}
            _ = token.cancelled() => break,
        }
    }

    // hand back whatever is still queued so it can be dumped
    let mut leftover = Vec::new();
    while let Ok(url) = queue.try_recv() {
        leftover.push(url);
    }

    tracing::debug!("[visitor {}] Exited", id);
    Ok(leftover)
}

async fn visit_url(client: &Client, url_str: &str) -> VisitResult {
    let parsed = match Url::parse(url_str) {
        Ok(u) => u,
        Err(e) => {
            return VisitResult::Temporary {
                url: url_str.to_string(),
                status_code: None,
                error: format!("Invalid URL: {}", e),
            }
        }
    };

    match client.fetch(&parsed).await {
        Ok((response, final_url)) => classify_response(url_str, response, &final_url),
        Err(e) => classify_error(url_str, e),
    }
}

/// Maps a terminal response onto its persistence class
pub fn classify_response(url_str: &str, response: Response, final_url: &Url) -> VisitResult {
    let url = url_str.to_string();
    let status_text = format!("STATUS: {} META: {}", response.code, response.meta);

    if response.is_slowdown() {
        return VisitResult::Slowdown {
            url,
            seconds: response.meta.trim().parse().ok(),
            error: status_text,
        };
    }

    match response.class() {
        Some(StatusClass::Success) => {
            match parse_page(&response.body, final_url, &response.meta) {
                Ok(page) => VisitResult::Success {
                    url,
                    status_code: response.code,
                    page,
                    contents: response.body,
                    content_type: response.meta,
                    visited_at: Utc::now().timestamp(),
                },
                Err(e) => {
                    tracing::debug!("Error parsing page {}: {}", url_str, e);
                    VisitResult::Temporary {
                        url,
                        status_code: Some(response.code),
                        error: e.to_string(),
                    }
                }
            }
        }
        Some(StatusClass::PermFailure) | Some(StatusClass::Input) => VisitResult::Permanent {
            url,
            status_code: Some(response.code),
            error: status_text,
        },
        _ => VisitResult::Temporary {
            url,
            status_code: Some(response.code),
            error: status_text,
        },
    }
}

/// Maps a transaction error onto its persistence class
pub fn classify_error(url_str: &str, error: GeminiError) -> VisitResult {
    let url = url_str.to_string();
    match &error {
        GeminiError::TooManyRedirects => VisitResult::Permanent {
            url,
            status_code: None,
            error: error.to_string(),
        },
        e if e.is_permanent() => VisitResult::Permanent {
            url,
            status_code: None,
            error: error.to_string(),
        },
        _ => VisitResult::Temporary {
            url,
            status_code: None,
            error: error.to_string(),
        },
    }
}
