//! Search daemon
//!
//! Listens on a local unix socket. Each connection carries one
//! newline-terminated JSON request and receives one newline-terminated
//! JSON response; malformed input gets an error object, never a crash.

mod query;
mod types;

pub use query::{search_images, search_pages, PAGE_SIZE};
pub use types::{
    ImageSearchResponse, ImageSearchResult, PageSearchResponse, PageSearchResult, Request,
};

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

use crate::storage::{ImageRecord, Store};
use crate::{Engine, Result};

pub async fn search(engine: Arc<Engine>) -> Result<()> {
    let store = Arc::new(Mutex::new(Store::open(Path::new(&engine.config.db.path))?));
    let token = engine.shutdown.clone();

    let socket_path = engine.config.search.socket_path.clone();
    cleanup_socket(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;
    tracing::info!("[search] Listening on {}", socket_path);

    loop {
        let accepted = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, _)) => {
                let engine = engine.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    handle_conn(engine, store, stream).await;
                });
            }
            Err(e) => {
                tracing::warn!("[search] Accept failed: {}", e);
            }
        }
    }

    cleanup_socket(&socket_path);
    tracing::info!("[search] Exited");
    Ok(())
}

fn cleanup_socket(path: &str) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("[search] Could not remove socket {}: {}", path, e);
        }
    }
}

async fn handle_conn(engine: Arc<Engine>, store: Arc<Mutex<Store>>, stream: UnixStream) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    if reader.read_line(&mut line).await.is_err() {
        return;
    }

    let reply = respond(&engine, &store, line.trim()).await;
    let _ = write_half.write_all(reply.as_bytes()).await;
    let _ = write_half.write_all(b"\n").await;
}

/// Answers one framed request with a JSON reply. Every failure path
/// produces an `{"err": …}` object.
pub async fn respond(engine: &Engine, store: &Mutex<Store>, line: &str) -> String {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(_) => return error_response("bad request"),
    };

    match request.request_type.as_str() {
        "" | "search" => {
            if request.query.is_empty() {
                return error_response("no query");
            }
            let live = match engine.alias.current() {
                Some(live) => live,
                None => return error_response("no index available"),
            };
            match search_pages(
                &live,
                &request.query,
                request.page,
                &engine.config.search.highlight_style,
            ) {
                Ok(response) => encode(&response),
                Err(e) => error_response(&e.to_string()),
            }
        }

        "searchimg" => {
            if request.query.is_empty() {
                return error_response("no query");
            }
            let live = match engine.alias.current() {
                Some(live) => live,
                None => return error_response("no index available"),
            };
            match search_images(&live, &request.query, request.page) {
                Ok(response) => encode(&response),
                Err(e) => error_response(&e.to_string()),
            }
        }

        "randimg" => match store.lock().await.random_image() {
            Ok(Some(record)) => encode(&image_result(record)),
            Ok(None) => error_response("no images"),
            Err(e) => {
                tracing::error!("[search] Database error: {}", e);
                error_response("internal error")
            }
        },

        "getimg" => {
            if request.id.is_empty() {
                return error_response("no id");
            }
            match store.lock().await.image_by_hash(&request.id) {
                Ok(Some(record)) => encode(&image_result(record)),
                Ok(None) => error_response("image not found"),
                Err(e) => {
                    tracing::error!("[search] Database error: {}", e);
                    error_response("internal error")
                }
            }
        }

        other => error_response(&format!("unknown request type: {}", other)),
    }
}

fn image_result(record: ImageRecord) -> ImageSearchResult {
    ImageSearchResult {
        image_hash: record.image_hash,
        image: record.image,
        alt: record.alt,
        source_url: record.url,
        fetch_time: record.fetch_time,
        relevance: 0.0,
    }
}

fn encode<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| error_response(&format!("error marshalling results: {}", e)))
}

fn error_response(message: &str) -> String {
    json!({ "err": message }).to_string()
}
