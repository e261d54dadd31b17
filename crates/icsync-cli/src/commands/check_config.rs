//! Validates the configuration and lists the resolved feeds.

use icsync_core::{FeedConfig, parse_feed_list};
use url::Url;

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// One entry of the feed list after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCheck {
    /// Position in the feed list.
    pub index: usize,
    /// The resolved feed, or `None` when the entry has no URL.
    pub feed: Option<FeedConfig>,
    /// Tags every event of the feed receives.
    pub tags: Vec<String>,
    /// Why the entry will not sync, if it won't.
    pub problem: Option<String>,
}

/// Resolves every feed entry and reports problems.
///
/// A feed list that is not a JSON array is an error. Mistyped entries are
/// reported as problems.
pub fn check(config: &AppConfig) -> CliResult<Vec<FeedCheck>> {
    let entries =
        parse_feed_list(&config.sync.feeds).map_err(|e| CliError::Config(e.to_string()))?;
    let defaults = config.sync.feed_defaults();

    Ok(entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    return FeedCheck {
                        index,
                        feed: None,
                        tags: Vec::new(),
                        problem: Some(format!("{}, entry is skipped", e)),
                    };
                }
            };
            match FeedConfig::resolve(entry, &defaults) {
                Some(feed) => FeedCheck {
                    index,
                    tags: config.sync.tags_for(&feed),
                    problem: url_problem(&feed.url),
                    feed: Some(feed),
                },
                None => FeedCheck {
                    index,
                    feed: None,
                    tags: Vec::new(),
                    problem: Some("missing url, entry is skipped".to_string()),
                },
            }
        })
        .collect())
}

fn url_problem(url: &str) -> Option<String> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => None,
        Ok(parsed) => Some(format!("unsupported scheme {:?}", parsed.scheme())),
        Err(e) => Some(format!("invalid url: {}", e)),
    }
}

/// Prints the resolved feeds. Fails when any entry has a problem.
pub fn run(config: &AppConfig) -> CliResult<()> {
    let checks = check(config)?;
    let sync = &config.sync;

    println!(
        "sync: {}",
        if sync.enabled { "enabled" } else { "disabled" }
    );
    println!("interval: {} min", sync.fetch_interval_mins);
    println!("timezone: {}", sync.site_timezone().unwrap_or("(none)"));
    println!("state: {}", config.storage.state_path().display());
    println!("records: {}", config.storage.records_path().display());
    println!("feeds: {}", checks.len());

    let mut problems = 0;
    for check in &checks {
        match &check.feed {
            Some(feed) => {
                println!();
                println!("[{}] {}", check.index, feed.key);
                println!("  url: {}", feed.url);
                match feed.category_id {
                    Some(id) => println!("  category: {}", id),
                    None => println!("  category: (none)"),
                }
                println!("  tags: {}", check.tags.join(", "));
            }
            None => {
                println!();
                println!("[{}] (unusable)", check.index);
            }
        }
        if let Some(problem) = &check.problem {
            problems += 1;
            println!("  problem: {}", problem);
        }
    }

    if problems > 0 {
        return Err(CliError::Config(format!(
            "{} feed entr{} with problems",
            problems,
            if problems == 1 { "y" } else { "ies" }
        )));
    }
    Ok(())
}
