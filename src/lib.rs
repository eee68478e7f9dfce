//! Gemplex: a search engine for the Gemini hypertext space
//!
//! This crate implements a single-process engine hosting four cooperating
//! daemons: a polite sharded crawler, a link-graph ranker, a ping-pong
//! full-text indexer, and a search daemon answering queries over a local
//! socket. All durable state lives in a shared SQLite store.

pub mod config;
pub mod crawler;
pub mod gemini;
pub mod index;
pub mod maintenance;
pub mod parse;
pub mod rank;
pub mod robots;
pub mod search;
pub mod storage;
pub mod url;

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Main error type for Gemplex operations
#[derive(Debug, Error)]
pub enum GemplexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Gemini transaction error: {0}")]
    Gemini(#[from] gemini::GeminiError),

    #[error("Index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("Index directory error: {0}")]
    IndexDir(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Gemplex operations
pub type Result<T> = std::result::Result<T, GemplexError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Shared engine context.
///
/// Holds the state every daemon needs: the loaded configuration, the
/// compiled blacklist, the per-host certificate store used for
/// trust-on-first-use, the live index alias the indexer swaps and the
/// search daemon reads through, and the shutdown token observed by every
/// worker. Constructed once in `main` before any worker starts.
pub struct Engine {
    pub config: config::Config,
    pub blacklist: crawler::Blacklist,
    pub certs: gemini::CertStore,
    pub alias: index::IndexAlias,
    pub shutdown: CancellationToken,
}

impl Engine {
    pub fn new(config: config::Config) -> Self {
        let blacklist = crawler::Blacklist::from_config(&config.blacklist);
        Self {
            config,
            blacklist,
            certs: gemini::CertStore::new(),
            alias: index::IndexAlias::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shared(config: config::Config) -> Arc<Self> {
        Arc::new(Self::new(config))
    }
}

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::parse::{parse_page, Page};
pub use crate::url::normalize_url;
