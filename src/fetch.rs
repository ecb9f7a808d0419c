//! Resilient page fetching.
//!
//! Every attempt is preceded by a randomized throttle sleep and carries a
//! User-Agent drawn from the configured pool. Non-success statuses,
//! timeouts, and transport errors all consume one unit of the attempt
//! budget; between attempts the loop sleeps an exponentially growing
//! backoff. Only a 2xx response is ever returned to the caller.

use std::thread::sleep;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    /// Every attempt in the budget failed. Callers treat this as "no data
    /// for this page", not as a fatal condition.
    #[error("giving up on {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

/// One attempt's failure. Consumed by the retry loop, never surfaced.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("HTTP status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Successful response payload.
#[derive(Debug)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub body: String,
}

pub struct Fetcher {
    client: Client,
    referer: String,
    user_agents: Vec<String>,
    max_retries: u32,
    throttle: (Duration, Duration),
    backoff_unit: Duration,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            referer: config.referer(),
            user_agents: config.user_agents.clone(),
            max_retries: config.max_retries.max(1),
            throttle: config.throttle,
            backoff_unit: config.backoff_unit,
        })
    }

    /// Fetch `url`, retrying on any failure until the attempt budget runs
    /// out.
    pub fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        for attempt in 1..=self.max_retries {
            // Unconditional throttle, applied before the first attempt too.
            self.throttle_delay();
            info!(url, attempt, budget = self.max_retries, "requesting");

            match self.attempt(url) {
                Ok(page) => {
                    info!(url, status = %page.status, "request succeeded");
                    return Ok(page);
                }
                Err(AttemptError::Status(status)) => {
                    warn!(url, %status, attempt, "non-success status");
                }
                Err(AttemptError::Transport(e)) if e.is_timeout() => {
                    warn!(url, attempt, "request timed out");
                }
                Err(AttemptError::Transport(e)) => {
                    warn!(url, attempt, error = %e, "request error");
                }
            }

            let backoff = self.backoff_unit * 2u32.saturating_pow(attempt);
            debug!(url, backoff_ms = backoff.as_millis() as u64, "backing off");
            sleep(backoff);
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_retries,
        })
    }

    fn attempt(&self, url: &str) -> Result<FetchedPage, AttemptError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.pick_user_agent())
            .header(REFERER, self.referer.as_str())
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .header(CONNECTION, "keep-alive")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        let body = response.text()?;
        Ok(FetchedPage { status, body })
    }

    fn pick_user_agent(&self) -> String {
        let mut rng = thread_rng();
        self.user_agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default()
    }

    fn throttle_delay(&self) {
        let (min, max) = self.throttle;
        if max.is_zero() {
            return;
        }
        let secs = thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
        sleep(Duration::from_secs_f64(secs));
    }
}
