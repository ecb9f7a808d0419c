use std::path::PathBuf;
use std::time::Duration;

/// Group the generator targets when no id is given on the command line.
pub const DEFAULT_GROUP_ID: &str = "713925";

/// Fixed pool of realistic browser identities. One is chosen per request so
/// repeated attempts do not present a uniform fingerprint.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0",
];

/// Immutable run configuration. Built once in `main` from the CLI arguments
/// and passed by reference; tests construct their own with deterministic
/// values (a fixed identity, millisecond delay units).
#[derive(Debug, Clone)]
pub struct Config {
    pub group_id: String,
    /// Directory the feed files are written into.
    pub out_dir: PathBuf,
    /// Cap applied independently to every result set.
    pub max_items: usize,
    /// Per-request network timeout.
    pub timeout: Duration,
    /// Total attempt budget per page, not extra retries after the first try.
    pub max_retries: u32,
    /// Range of the unconditional pre-attempt delay.
    pub throttle: (Duration, Duration),
    /// One backoff step; attempt n is followed by `backoff_unit * 2^n`.
    pub backoff_unit: Duration,
    pub user_agents: Vec<String>,
}

impl Config {
    pub fn discussion_url(&self) -> String {
        format!("https://www.douban.com/group/{}/discussion", self.group_id)
    }

    pub fn elite_url(&self) -> String {
        format!(
            "https://www.douban.com/group/{}/discussion?type=elite",
            self.group_id
        )
    }

    pub fn referer(&self) -> String {
        format!("https://www.douban.com/group/{}/", self.group_id)
    }

    /// Landing page of the group, used as the channel link.
    pub fn group_url(&self) -> String {
        format!("https://www.douban.com/group/{}", self.group_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_id: DEFAULT_GROUP_ID.to_string(),
            out_dir: PathBuf::from("."),
            max_items: 20,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            throttle: (Duration::from_secs(1), Duration::from_secs(3)),
            backoff_unit: Duration::from_secs(1),
            user_agents: USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
        }
    }
}
