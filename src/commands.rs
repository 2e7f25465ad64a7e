use background_service::{spawn_shutdown_listener, BackgroundService};
use reddit_client::{FeedInfo, RedditClient};
use redditfeed_core::{mask_secret, AppConfig, CoreError};
use tokio_util::sync::CancellationToken;
use tracing::info;

const SUBREDDITS_SHOWN: usize = 10;

/// Print the config summary, authenticate and check the feed.
pub async fn validate(config: &AppConfig) -> Result<(), CoreError> {
    println!("Configuration OK");
    println!("  Feed path: {}", config.custom_feed.multipath);
    println!("  Owner:     {}", config.custom_feed.owner);
    println!("  Name:      {}", config.custom_feed.name);
    println!("  Client ID: {}", mask_secret(&config.reddit.auth.client_id));

    let client = RedditClient::from_config(config, CancellationToken::new())?;
    client.api().token_manager().access_token().await?;
    println!("Authentication OK");

    let feed = validate_feed(config, &client).await?;
    print_feed(&feed);
    Ok(())
}

/// One fetch → write → save cycle.
pub async fn once(config: &AppConfig) -> Result<(), CoreError> {
    let shutdown = CancellationToken::new();
    let client = RedditClient::from_config(config, shutdown.clone())?;
    validate_feed(config, &client).await?;

    let mut service =
        BackgroundService::from_config(config, client.fetcher().clone(), shutdown).await?;
    let report = service.run_cycle().await.map_err(|e| e.source)?;

    println!(
        "Fetched {} items, {} new, {} written",
        report.listed, report.new_posts, report.written
    );
    Ok(())
}

/// Poll until SIGINT/SIGTERM.
pub async fn run(config: &AppConfig) -> Result<(), CoreError> {
    let shutdown = CancellationToken::new();
    let listener = spawn_shutdown_listener(shutdown.clone());

    let result = run_until_shutdown(config, shutdown.clone()).await;

    shutdown.cancel();
    let _ = listener.await;
    result
}

async fn run_until_shutdown(
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<(), CoreError> {
    let client = RedditClient::from_config(config, shutdown.clone())?;
    validate_feed(config, &client).await?;

    let mut service =
        BackgroundService::from_config(config, client.fetcher().clone(), shutdown).await?;
    let summary = service.run().await?;

    info!(
        cycles = summary.cycles,
        failed_cycles = summary.failed_cycles,
        posts_written = summary.posts_written,
        records_purged = summary.records_purged,
        "Run finished"
    );
    Ok(())
}

async fn validate_feed(config: &AppConfig, client: &RedditClient) -> Result<FeedInfo, CoreError> {
    let feed = client
        .validator()
        .validate(&config.custom_feed.multipath, &config.custom_feed.owner)
        .await?;
    info!(
        "Custom feed '{}' is accessible ({} subreddits)",
        feed.display_name,
        feed.subreddits.len()
    );
    Ok(feed)
}

fn print_feed(feed: &FeedInfo) {
    println!("Feed OK");
    println!("  Display name: {}", feed.display_name);
    println!("  Visibility:   {}", feed.visibility);
    println!("  Subreddits:   {}", feed.subreddits.len());
    for line in subreddit_lines(&feed.subreddits) {
        println!("    {}", line);
    }
}

fn subreddit_lines(subreddits: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = subreddits
        .iter()
        .take(SUBREDDITS_SHOWN)
        .map(|name| format!("r/{}", name))
        .collect();
    if subreddits.len() > SUBREDDITS_SHOWN {
        lines.push(format!(
            "... and {} more",
            subreddits.len() - SUBREDDITS_SHOWN
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subreddit_lines_truncated_after_ten() {
        let names: Vec<String> = (0..13).map(|i| format!("sub{}", i)).collect();
        let lines = subreddit_lines(&names);
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "r/sub0");
        assert_eq!(lines[9], "r/sub9");
        assert_eq!(lines[10], "... and 3 more");
    }

    #[test]
    fn test_subreddit_lines_short_list() {
        let names = vec!["rust".to_string(), "golang".to_string()];
        assert_eq!(subreddit_lines(&names), vec!["r/rust", "r/golang"]);
        assert!(subreddit_lines(&[]).is_empty());
    }
}
