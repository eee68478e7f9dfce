//! Robots file parsing
//!
//! The grammar is line oriented: `#` starts a comment, a contiguous run
//! of `User-agent:` lines establishes the current user-agent set, and
//! `Disallow:` records a path prefix for that set. An empty disallow
//! value means nothing is disallowed. All other directives are ignored.

/// User-agent tokens this crawler identifies with
pub const USER_AGENT_TOKENS: &[&str] = &["*", "gemplex", "crawler", "indexer", "researcher"];

/// Parses robots file text into the list of disallowed path prefixes
/// that apply to this crawler.
pub fn parse_robots(text: &str) -> Vec<String> {
    let mut prefixes = Vec::new();

    // a disallow before any user-agent line applies to everyone
    let mut current_agents: Vec<String> = vec!["*".to_string()];
    let mut reading_agents = true;

    for line in text.lines() {
        if line.starts_with('#') {
            continue;
        }

        if let Some(value) = directive_value(line, "user-agent:") {
            if !reading_agents {
                current_agents.clear();
            }
            reading_agents = true;
            current_agents.push(value.to_string());
            continue;
        }

        if let Some(value) = directive_value(line, "disallow:") {
            reading_agents = false;
            if value.is_empty() {
                // an empty disallow means everything is allowed
                continue;
            }
            let applies = current_agents
                .iter()
                .any(|agent| USER_AGENT_TOKENS.contains(&agent.as_str()));
            if applies {
                prefixes.push(value.to_string());
            }
        }

        // everything else is ignored
    }

    prefixes
}

/// Returns whether a URL path is banned by the given prefix list
pub fn is_banned(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

/// Matches a directive name case-insensitively and returns its trimmed
/// value, or None when the line is not that directive or has no value.
fn directive_value<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    if line.len() <= directive.len() {
        return None;
    }
    if !line[..directive.len()].eq_ignore_ascii_case(directive) {
        return None;
    }
    Some(line[directive.len()..].trim())
}
