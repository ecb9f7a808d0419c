use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use tracing::{error, info, warn};

mod config;
mod extract;
mod fetch;
mod rss;
mod text;
mod timeparse;

use config::Config;
use extract::Post;
use fetch::Fetcher;
use rss::FeedKind;

/// douban2rss - turn a Douban group's discussion listings into RSS feeds
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Douban group id to scrape
    #[arg(default_value = config::DEFAULT_GROUP_ID)]
    group_id: String,

    /// Directory the feed files are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Maximum number of items per feed
    #[arg(short = 'n', long, default_value_t = 20)]
    max_items: usize,

    /// Timeout in milliseconds for network requests
    #[arg(short = 't', long = "timeout-ms", default_value_t = 15_000)]
    timeout_ms: u64,

    /// Attempt budget per page fetch
    #[arg(short, long, default_value_t = 3)]
    retries: u32,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            group_id: self.group_id,
            out_dir: self.out_dir,
            max_items: self.max_items,
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.retries,
            ..Config::default()
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Args::parse().into_config();
    info!(group = %config.group_id, out_dir = %config.out_dir.display(), "starting feed generation");

    if let Err(e) = run(&config) {
        let cause = format!("{e:#}");
        error!(error = %cause, "run failed, writing placeholder feeds");
        write_placeholder_feeds(&config, &e);
    }
}

fn run(config: &Config) -> Result<()> {
    let fetcher = Fetcher::new(config)?;
    let now = Local::now().naive_local();

    let discussion = fetch_posts(&fetcher, &config.discussion_url(), now, false);
    let elite = fetch_posts(&fetcher, &config.elite_url(), now, true);
    info!(
        discussion = discussion.len(),
        elite = elite.len(),
        "extraction finished"
    );

    rss::write_feed(
        config,
        FeedKind::Newest,
        &extract::newest(discussion.clone(), config.max_items),
    )?;
    rss::write_feed(
        config,
        FeedKind::MostReplied,
        &extract::most_replied(discussion, config.max_items),
    )?;
    rss::write_feed(
        config,
        FeedKind::Elite,
        &extract::curated(elite, config.max_items),
    )?;
    Ok(())
}

/// Fetch and extract one listing page. Retry exhaustion means "no data for
/// this page", not a failed run.
fn fetch_posts(fetcher: &Fetcher, url: &str, now: NaiveDateTime, elite: bool) -> Vec<Post> {
    match fetcher.fetch(url) {
        Ok(page) => extract::parse_listing(&page.body, url, now, elite),
        Err(e) => {
            warn!(url, error = %e, "page unavailable, continuing with an empty set");
            Vec::new()
        }
    }
}

/// Last-resort output: every expected file gets a minimal feed so readers
/// never see a missing document.
fn write_placeholder_feeds(config: &Config, cause: &anyhow::Error) {
    let note = format!("Feed generation failed: {cause:#}. Check the logs.");
    for kind in FeedKind::ALL {
        if let Err(e) = rss::write_error_feed(config, kind, &note) {
            let cause = format!("{e:#}");
            error!(error = %cause, ?kind, "failed to write placeholder feed");
        }
    }
}
