use serde::Deserialize;

/// Main configuration structure for the engine
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
    pub crawl: CrawlConfig,
    pub blacklist: BlacklistConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Path to the SQLite database file
    pub path: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: "gemplex.db".to_string(),
        }
    }
}

/// Full-text index configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the ping/pong index slots
    pub path: String,

    /// Number of documents per indexing batch. Higher values speed up
    /// index builds at the cost of memory.
    #[serde(rename = "batch-size")]
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
            batch_size: 200,
        }
    }
}

/// Search daemon configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Path of the unix socket the search daemon listens on
    #[serde(rename = "socket-path")]
    pub socket_path: String,

    /// Highlight style used for snippets ("gem" brackets matches with
    /// `[[` and `]]`)
    #[serde(rename = "highlight-style")]
    pub highlight_style: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/gemplex-search.sock".to_string(),
            highlight_style: "gem".to_string(),
        }
    }
}

/// Crawler configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Number of visitor shards. Visits to one resolved IP are always
    /// serialized onto the same shard.
    pub fanout: usize,

    /// Capacity of each per-shard visitor queue; when a queue is full
    /// the coordinator drops the URL and the seeder re-observes it.
    #[serde(rename = "queue-size")]
    pub queue_size: usize,

    /// URLs inserted into the store at crawler startup
    pub seeds: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            fanout: 500,
            queue_size: 1000,
            seeds: Vec::new(),
        }
    }
}

/// Blacklist configuration: domains and URL prefixes never crawled or
/// indexed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    pub domains: Vec<String>,
    pub prefixes: Vec<String>,
}
