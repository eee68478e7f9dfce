//! Index building: streams store rows into a tantivy index in batches

use tantivy::{doc, Index, IndexWriter, TantivyError};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::crawler::Blacklist;
use crate::storage::Store;
use crate::Result;

use super::schema::IndexFields;

/// Heap given to the index writer
const WRITER_MEMORY: usize = 50_000_000;

/// Streams every rankable page and every captioned image into the
/// index, committing after each `batch_size` documents. Returns the
/// number of documents written, or None when cancelled mid-build (the
/// caller must not swap a half-built index in).
pub fn build_index(
    store: &Store,
    index: &Index,
    fields: &IndexFields,
    batch_size: usize,
    blacklist: &Blacklist,
    token: &CancellationToken,
) -> Result<Option<u64>> {
    let mut writer: IndexWriter = index.writer(WRITER_MEMORY)?;

    let mut total: u64 = 0;
    let mut pending: usize = 0;
    let mut failure: Option<TantivyError> = None;

    tracing::info!("Indexing pages...");
    store.for_each_indexable_page(|page| {
        if token.is_cancelled() {
            return false;
        }

        // pages crawled before a blacklist rule was added still sit in
        // the store; they must not reach the index
        match Url::parse(&page.url) {
            Ok(parsed) => {
                if blacklist.is_blacklisted(&parsed, &page.url) {
                    return true;
                }
            }
            Err(e) => {
                tracing::warn!("Stored URL cannot be parsed: {} ({})", page.url, e);
                return true;
            }
        }

        let document = doc!(
            fields.url => page.url,
            fields.title => page.title,
            fields.content => page.text,
            fields.lang => page.lang,
            fields.kind => page.kind,
            fields.content_type => page.content_type,
            fields.content_size => page.size,
            fields.links => page.links,
            fields.url_rank => page.url_rank,
            fields.host_rank => page.host_rank,
        );

        if let Err(e) = writer.add_document(document) {
            failure = Some(e);
            return false;
        }

        total += 1;
        pending += 1;
        if pending >= batch_size {
            pending = 0;
            if let Err(e) = writer.commit() {
                failure = Some(e);
                return false;
            }
            tracing::info!("Indexing progress: {} documents so far", total);
        }
        true
    })?;

    if let Some(e) = failure {
        return Err(e.into());
    }
    if token.is_cancelled() {
        return Ok(None);
    }

    tracing::info!("Indexing images...");
    store.for_each_indexable_image(|image| {
        if token.is_cancelled() {
            return false;
        }

        let document = doc!(
            fields.image_hash => image.image_hash,
            fields.image => image.image,
            fields.alt => image.alt,
            fields.image_url => image.url,
            fields.fetch_time => image.fetch_time,
        );

        if let Err(e) = writer.add_document(document) {
            failure = Some(e);
            return false;
        }

        total += 1;
        pending += 1;
        if pending >= batch_size {
            pending = 0;
            if let Err(e) = writer.commit() {
                failure = Some(e);
                return false;
            }
        }
        true
    })?;

    if let Some(e) = failure {
        return Err(e.into());
    }
    if token.is_cancelled() {
        return Ok(None);
    }

    writer.commit()?;
    tracing::info!("Finished indexing: {} documents", total);
    Ok(Some(total))
}
