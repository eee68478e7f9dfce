//! Cleaner: garbage-collects content rows nothing references
//!
//! Runs every 15 minutes. The delete can be long on a large store, so a
//! watcher interrupts the statement on shutdown and the interruption is
//! treated as cancellation, not failure.

use std::sync::Arc;
use std::time::Instant;

use rusqlite::ffi;

use crate::storage::Store;
use crate::{Engine, GemplexError, Result};

use super::CLEANER_PERIOD;

pub async fn cleaner(engine: Arc<Engine>, mut store: Store) -> Result<()> {
    let token = engine.shutdown.clone();

    let interrupt = store.interrupt_handle();
    let watcher = tokio::spawn({
        let token = token.clone();
        async move {
            token.cancelled().await;
            interrupt.interrupt();
        }
    });

    loop {
        if token.is_cancelled() {
            break;
        }

        let started = Instant::now();
        match store.delete_orphan_contents() {
            Ok(0) => {
                tracing::debug!(
                    "[cleaner] No dangling content rows (query took {:?})",
                    started.elapsed()
                );
            }
            Ok(removed) => {
                tracing::info!(
                    "[cleaner] Removed {} dangling content rows in {:?}",
                    removed,
                    started.elapsed()
                );
            }
            Err(e) if is_interrupted(&e) => break,
            Err(e) => {
                watcher.abort();
                return Err(e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(CLEANER_PERIOD) => {}
            _ = token.cancelled() => break,
        }
    }

    watcher.abort();
    tracing::info!("[cleaner] Exited");
    Ok(())
}

fn is_interrupted(error: &GemplexError) -> bool {
    matches!(
        error,
        GemplexError::Database(rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::OperationInterrupted,
                ..
            },
            _,
        ))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_detection() {
        let err = GemplexError::Database(rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: rusqlite::ErrorCode::OperationInterrupted,
                extended_code: ffi::SQLITE_INTERRUPT,
            },
            None,
        ));
        assert!(is_interrupted(&err));

        let other = GemplexError::Database(rusqlite::Error::QueryReturnedNoRows);
        assert!(!is_interrupted(&other));
    }
}
