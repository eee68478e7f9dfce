//! Typed access to the relational store
//!
//! Every worker opens its own [`Store`] handle; SQLite in WAL mode
//! arbitrates concurrent readers and the single writer at a time.

mod schema;
mod store;

pub use schema::initialize_schema;
pub use store::Store;

/// Retry interval after permanent errors (5x, 1x, dead hosts): 1 month
pub const PERMANENT_ERROR_RETRY: i64 = 30 * 24 * 3600;

/// Starting retry interval for temporary errors: 1 day
pub const TEMP_ERROR_MIN_RETRY: i64 = 24 * 3600;

/// Revisit interval growth when a page's content did not change: 2 days
pub const REVISIT_INCREMENT_NO_CHANGE: i64 = 2 * 24 * 3600;

/// Revisit interval after a page's content changed: 2 days
pub const REVISIT_AFTER_CHANGE: i64 = 2 * 24 * 3600;

/// Ceiling for every retry/revisit interval: 1 month
pub const MAX_REVISIT_TIME: i64 = 30 * 24 * 3600;

/// How long fetched robots prefixes stay valid: 1 day
pub const ROBOTS_VALIDITY: i64 = 24 * 3600;

/// A successful visit ready to be persisted
#[derive(Debug)]
pub struct SuccessfulVisit {
    pub url: String,
    pub status_code: u16,
    pub page: crate::parse::Page,
    pub contents: Vec<u8>,
    pub content_type: String,
    pub content_type_args: String,
    pub visited_at: i64,
}

/// Outcome of a robots prefix lookup against the store
#[derive(Debug, PartialEq)]
pub enum RobotsLookup {
    /// No usable entry; the caller should fetch the robots file
    Missing,
    /// The host is in robots-backoff; defer its URLs silently
    Backoff,
    /// Stored prefixes, valid until the given time
    Prefixes {
        prefixes: Vec<String>,
        valid_until: i64,
    },
}

/// One page streamed to the indexer
#[derive(Debug, Clone)]
pub struct IndexablePage {
    pub url: String,
    pub title: String,
    pub text: String,
    pub size: u64,
    pub content_type: String,
    pub lang: String,
    pub kind: String,
    pub links: String,
    pub url_rank: f64,
    pub host_rank: f64,
}

/// A stored image row
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub image_hash: String,
    pub image: String,
    pub alt: String,
    pub fetch_time: i64,
    pub url: String,
}

/// A stored content row joined with one URL referencing it
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub content_id: i64,
    pub content: Vec<u8>,
    pub title: String,
    pub content_type: String,
    pub url: String,
}

/// Snapshot of a URL row, used by tests and diagnostics
#[derive(Debug, Clone)]
pub struct UrlRow {
    pub id: i64,
    pub url: String,
    pub hostname: String,
    pub last_visited: Option<i64>,
    pub content_id: Option<i64>,
    pub error: Option<String>,
    pub status_code: Option<i64>,
    pub retry_time: Option<i64>,
    pub banned: bool,
    pub rank: Option<f64>,
}
