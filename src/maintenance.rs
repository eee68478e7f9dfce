//! Maintenance operations over the store
//!
//! These run on demand rather than as daemons: purging a host out of the
//! corpus, and re-deriving titles after parser changes.

use std::collections::HashMap;

use url::Url;

use crate::parse::parse_page;
use crate::storage::Store;
use crate::Result;

/// Re-parses every stored content blob and writes back titles that came
/// out different. Useful after title extraction changes, so existing
/// pages pick up the new behavior without a recrawl. Returns the number
/// of titles updated.
pub fn refresh_titles(store: &mut Store) -> Result<usize> {
    let mut changes: HashMap<i64, String> = HashMap::new();

    store.for_each_stored_document(|doc| {
        let base = match Url::parse(&doc.url) {
            Ok(u) => u,
            Err(_) => return true,
        };
        if let Ok(page) = parse_page(&doc.content, &base, &doc.content_type) {
            if page.title != doc.title {
                tracing::debug!("'{}' => '{}'  {}", doc.title, page.title, doc.url);
                changes.insert(doc.content_id, page.title);
            }
        }
        true
    })?;

    tracing::info!("Applying {} title changes", changes.len());
    for (content_id, title) in &changes {
        store.update_content_title(*content_id, title)?;
    }

    Ok(changes.len())
}
