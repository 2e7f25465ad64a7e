use crate::api::{RedditApiClient, RedditListing};
use chrono::Utc;
use redditfeed_core::{AppConfig, CommentsConfig, CoreError, ErrorExt, ListingItem, Post, SeenSet};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Reddit accepts at most 100 fullnames per `/api/info` call.
pub const MAX_IDS_PER_INFO_REQUEST: usize = 100;

/// What the fetcher pulls for each cycle.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// `{multipath}/{sort}`
    pub listing_endpoint: String,
    pub limit: u32,
    pub fetch_post_detail: bool,
    pub fetch_comments: bool,
    pub comments: CommentsConfig,
}

impl FetchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            listing_endpoint: config.listing_endpoint(),
            limit: config.fetch.listing.limit,
            fetch_post_detail: config.fetch.per_post.fetch_post_detail,
            fetch_comments: config.fetch.per_post.fetch_comments,
            comments: config.fetch.per_post.comments.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: RedditApiClient,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(client: RedditApiClient, options: FetchOptions) -> Self {
        Self { client, options }
    }

    /// Fetch one page of the feed listing, server order preserved.
    pub async fn fetch_listing(&self) -> Result<Vec<ListingItem>, CoreError> {
        let endpoint = &self.options.listing_endpoint;
        info!(
            "Fetching listing from {} (limit={})",
            endpoint, self.options.limit
        );

        let response = self
            .client
            .get(endpoint, &[("limit", self.options.limit.to_string())])
            .await?;
        let children = RedditListing::from_value(response, endpoint)?.into_children();

        info!("Fetched {} items from listing", children.len());
        Ok(children)
    }

    /// Fetch full post objects for `fullnames` in chunks of
    /// `MAX_IDS_PER_INFO_REQUEST`, keyed by fullname.
    pub async fn fetch_details_batch(
        &self,
        fullnames: &[String],
    ) -> Result<HashMap<String, ListingItem>, CoreError> {
        let mut details = HashMap::with_capacity(fullnames.len());
        if fullnames.is_empty() {
            return Ok(details);
        }

        info!("Fetching details for {} posts", fullnames.len());

        for chunk in fullnames.chunks(MAX_IDS_PER_INFO_REQUEST) {
            debug!("Fetching batch of {} post details", chunk.len());
            let response = self
                .client
                .get("/api/info", &[("id", chunk.join(","))])
                .await?;

            for item in RedditListing::from_value(response, "/api/info")?.into_children() {
                if let Some(fullname) = item.fullname().map(str::to_string) {
                    details.insert(fullname, item);
                }
            }
        }

        info!("Fetched details for {} posts", details.len());
        Ok(details)
    }

    /// Fetch the comment tree of one post. The `[link, comments]` pair is
    /// returned untouched; any other shape is returned as received.
    pub async fn fetch_comments(&self, post_id: &str) -> Result<Value, CoreError> {
        let comments = &self.options.comments;
        let params = [
            ("limit", comments.limit.to_string()),
            ("depth", comments.depth.to_string()),
            ("sort", comments.sort.clone()),
            ("truncate", comments.truncate.to_string()),
        ];

        debug!("Fetching comments for post {}", post_id);
        let response = self
            .client
            .get(&format!("/comments/{}", post_id), &params)
            .await?;

        match response.as_array() {
            Some(parts) if parts.len() >= 2 => {
                let top_level = parts[1]
                    .pointer("/data/children")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or(0);
                debug!("Fetched {} top-level comments for {}", top_level, post_id);
            }
            _ => warn!("Unexpected comments response format for {}", post_id),
        }

        Ok(response)
    }

    /// Filter, enrich and build posts for everything in `items` not already
    /// in `seen`. A comment failure leaves that post's comments unset.
    pub async fn process_new_posts(
        &self,
        items: Vec<ListingItem>,
        seen: &SeenSet,
    ) -> Result<Vec<Post>, CoreError> {
        let new_items = filter_new(items, seen);
        if new_items.is_empty() {
            info!("No new posts to process");
            return Ok(Vec::new());
        }

        let mut details = if self.options.fetch_post_detail {
            let fullnames: Vec<String> = new_items
                .iter()
                .filter_map(|item| item.fullname().map(str::to_string))
                .collect();
            self.fetch_details_batch(&fullnames).await?
        } else {
            HashMap::new()
        };

        let mut posts = Vec::with_capacity(new_items.len());
        for item in new_items {
            let detail = item.fullname().and_then(|fullname| details.remove(fullname));
            let post_id = item.id().map(str::to_string);

            let mut post = Post::from_listing(item, detail, Utc::now());

            if self.options.fetch_comments {
                if let Some(post_id) = post_id {
                    post.comments = self.comments_best_effort(&post_id).await?;
                }
            }

            info!(
                "Processed post: {} - {}",
                post.fullname,
                post.title.chars().take(50).collect::<String>()
            );
            posts.push(post);
        }

        Ok(posts)
    }

    async fn comments_best_effort(&self, post_id: &str) -> Result<Option<Value>, CoreError> {
        match self.fetch_comments(post_id).await {
            Ok(comments) => Ok(Some(comments)),
            Err(CoreError::Cancelled) => Err(CoreError::Cancelled),
            Err(e) => {
                warn!(
                    code = %e.error_code(),
                    "Failed to fetch comments for {}: {}", post_id, e
                );
                Ok(None)
            }
        }
    }
}

/// Items whose fullname is present and unseen, in listing order.
pub fn filter_new(items: Vec<ListingItem>, seen: &SeenSet) -> Vec<ListingItem> {
    let total = items.len();
    let new_items: Vec<ListingItem> = items
        .into_iter()
        .filter(|item| match item.fullname() {
            Some(fullname) if !seen.contains(fullname) => true,
            other => {
                debug!("Skipping already seen post: {}", other.unwrap_or("<missing>"));
                false
            }
        })
        .collect();

    info!("Found {} new posts out of {}", new_items.len(), total);
    new_items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(fullname: &str) -> ListingItem {
        ListingItem::new(
            "t3",
            json!({"name": fullname, "id": fullname.trim_start_matches("t3_")}),
        )
    }

    #[test]
    fn test_filter_new_preserves_order() {
        let mut seen = SeenSet::new(10);
        seen.insert("t3_b");

        let items = vec![item("t3_a"), item("t3_b"), item("t3_c"), item("t3_d")];
        let names: Vec<String> = filter_new(items, &seen)
            .iter()
            .filter_map(|i| i.fullname().map(str::to_string))
            .collect();

        assert_eq!(names, vec!["t3_a", "t3_c", "t3_d"]);
    }

    #[test]
    fn test_filter_new_drops_items_without_fullname() {
        let seen = SeenSet::new(10);
        let items = vec![
            ListingItem::new("t3", json!({"id": "x"})),
            ListingItem::new("t3", json!({"name": ""})),
            item("t3_ok"),
        ];

        let result = filter_new(items, &seen);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].fullname(), Some("t3_ok"));
    }

    #[test]
    fn test_filter_new_everything_seen() {
        let seen = SeenSet::from_ordered(["t3_a".to_string(), "t3_b".to_string()], 10);
        assert!(filter_new(vec![item("t3_a"), item("t3_b")], &seen).is_empty());
    }
}
