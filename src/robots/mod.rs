//! Robots exclusion handling for the Gemini companion robots.txt format
//!
//! A host's robots file is reduced to a list of disallowed path prefixes
//! that apply to this crawler. The parser lives in [`parser`], the
//! per-host in-memory TTL cache in [`cache`].

mod cache;
mod parser;

pub use cache::{CachedPrefixes, RobotsCache};
pub use parser::{is_banned, parse_robots, USER_AGENT_TOKENS};
