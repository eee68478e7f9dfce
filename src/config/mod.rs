//! Configuration loading and validation

mod parser;
mod types;

pub use parser::{load_config, DEFAULT_CONFIG_FILES};
pub use types::{
    BlacklistConfig, Config, CrawlConfig, DbConfig, IndexConfig, SearchConfig,
};
