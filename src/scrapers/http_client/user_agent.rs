//! User agent handling for API requests and browser pages.

pub const USER_AGENT: &str = "labharvest/0.3 (race results research)";

/// Desktop Chrome user agents. The browser session drives Chrome, so it
/// only ever claims to be Chrome.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// Pick one of the impersonation user agents.
pub fn random_user_agent() -> &'static str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0);
    IMPERSONATE_USER_AGENTS[nanos % IMPERSONATE_USER_AGENTS.len()]
}

/// Resolve user agent from config value.
/// - None => `fallback`
/// - "impersonate" => random Chrome user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>, fallback: &str) -> String {
    match config {
        None => fallback.to_string(),
        Some("impersonate") => random_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_to_fallback() {
        assert_eq!(resolve_user_agent(None, USER_AGENT), USER_AGENT);
    }

    #[test]
    fn resolve_impersonate_picks_chrome() {
        let ua = resolve_user_agent(Some("impersonate"), USER_AGENT);
        assert!(ua.contains("Chrome/"));
        assert!(IMPERSONATE_USER_AGENTS.contains(&ua.as_str()));
    }

    #[test]
    fn resolve_custom() {
        assert_eq!(resolve_user_agent(Some("MyBot/1.0"), USER_AGENT), "MyBot/1.0");
    }
}
