//! Flusher: serializes visit results into the store
//!
//! One database-mutating transaction per result. The persistence policy
//! lives in [`apply_result`]; the async loop only moves results from the
//! queue into it.

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::storage::{Store, SuccessfulVisit};
use crate::{Engine, Result};

use super::VisitResult;

pub async fn flusher(
    engine: Arc<Engine>,
    mut store: Store,
    mut results: mpsc::Receiver<VisitResult>,
) -> Result<()> {
    let token = engine.shutdown.clone();

    loop {
        let result = tokio::select! {
            _ = token.cancelled() => break,
            received = results.recv() => match received {
                Some(r) => r,
                None => break,
            },
        };

        apply_result(&mut store, result)?;
    }

    tracing::info!("[flusher] Exited");
    Ok(())
}

/// Applies one visit result to the store, per the persistence policy:
///
/// | class     | urls row                                         | side effects        |
/// |-----------|--------------------------------------------------|---------------------|
/// | success   | content upsert, error cleared, revisit interval  | links replaced      |
/// | slowdown  | temp-error update                                | host cooldown set   |
/// | permanent | error text, 1 month retry                        |                     |
/// | banned    | banned flag                                      |                     |
/// | temporary | error text, exponential retry                    |                     |
pub fn apply_result(store: &mut Store, result: VisitResult) -> Result<()> {
    let now = Store::now();

    match result {
        VisitResult::Success {
            url,
            status_code,
            page,
            contents,
            content_type,
            visited_at,
        } => {
            let (media_type, args) = parse_content_type(&content_type);
            store.record_successful_visit(&SuccessfulVisit {
                url,
                status_code,
                page,
                contents,
                content_type: media_type,
                content_type_args: args,
                visited_at,
            })
        }

        VisitResult::Banned { url } => store.record_banned(&url),

        VisitResult::Slowdown {
            url,
            seconds,
            error,
        } => {
            store.record_temp_error(&url, Some(44), &error, now)?;
            if let Some(seconds) = seconds {
                if let Some(host) = Url::parse(&url).ok().and_then(|u| {
                    u.host_str().map(str::to_string)
                }) {
                    store.set_host_slowdown(&host, now + seconds)?;
                }
            }
            Ok(())
        }

        VisitResult::Permanent {
            url,
            status_code,
            error,
        } => store.record_permanent_error(&url, status_code, &error, now),

        VisitResult::Temporary {
            url,
            status_code,
            error,
        } => store.record_temp_error(&url, status_code, &error, now),
    }
}

/// Splits a media type from its parameters: `text/gemini; lang=en`
/// becomes `("text/gemini", "lang=en")`
pub fn parse_content_type(meta: &str) -> (String, String) {
    match meta.split_once(';') {
        Some((media_type, args)) => (media_type.trim().to_string(), args.trim().to_string()),
        None => (meta.trim().to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Page;

    fn seeded(url: &str) -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store.seed_url(&Url::parse(url).unwrap()).unwrap();
        store
    }

    #[test]
    fn test_parse_content_type() {
        assert_eq!(
            parse_content_type("text/gemini; lang=en"),
            ("text/gemini".to_string(), "lang=en".to_string())
        );
        assert_eq!(
            parse_content_type("text/plain"),
            ("text/plain".to_string(), String::new())
        );
    }

    #[test]
    fn test_banned_result_persists_flag() {
        let mut store = seeded("gemini://example.org/priv/x");
        apply_result(
            &mut store,
            VisitResult::Banned {
                url: "gemini://example.org/priv/x".to_string(),
            },
        )
        .unwrap();

        let row = store.get_url("gemini://example.org/priv/x").unwrap().unwrap();
        assert!(row.banned);
        // banned urls are never due again
        assert!(store.due_urls(Store::now()).unwrap().is_empty());
    }

    #[test]
    fn test_success_result_persists_everything() {
        let mut store = seeded("gemini://example.org/");
        apply_result(
            &mut store,
            VisitResult::Success {
                url: "gemini://example.org/".to_string(),
                status_code: 20,
                page: Page {
                    text: "Hello".to_string(),
                    title: "Hello".to_string(),
                    links: vec![crate::parse::Link {
                        url: "gemini://example.org/a".to_string(),
                        text: "Foo".to_string(),
                    }],
                    ..Page::default()
                },
                contents: b"Hello".to_vec(),
                content_type: "text/gemini; charset=utf-8".to_string(),
                visited_at: Store::now(),
            },
        )
        .unwrap();

        assert_eq!(store.url_count().unwrap(), 2);
        assert_eq!(store.content_count().unwrap(), 1);
        assert_eq!(store.link_count().unwrap(), 1);
    }

    #[test]
    fn test_slowdown_sets_host_cooldown() {
        let mut store = seeded("gemini://example.org/");
        apply_result(
            &mut store,
            VisitResult::Slowdown {
                url: "gemini://example.org/".to_string(),
                seconds: Some(60),
                error: "STATUS: 44 META: 60".to_string(),
            },
        )
        .unwrap();

        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.status_code, Some(44));
        assert!(row.retry_time.is_some());

        // the whole host is deferred while the cooldown lasts
        assert!(store.due_urls(Store::now()).unwrap().is_empty());
        assert!(!store.due_urls(Store::now() + 3600 * 24 * 2).unwrap().is_empty());
    }

    #[test]
    fn test_permanent_result() {
        let mut store = seeded("gemini://example.org/");
        apply_result(
            &mut store,
            VisitResult::Permanent {
                url: "gemini://example.org/".to_string(),
                status_code: Some(51),
                error: "STATUS: 51 META: gone".to_string(),
            },
        )
        .unwrap();

        let row = store.get_url("gemini://example.org/").unwrap().unwrap();
        assert_eq!(row.retry_time, Some(crate::storage::PERMANENT_ERROR_RETRY));
    }
}
