use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Separator used when a post carries more than one removal reason.
pub const REMOVAL_REASON_SEPARATOR: &str = "|";

const DELETED_MARKER: &str = "[deleted]";
const REMOVED_MARKER: &str = "[removed]";

/// One child of a Reddit listing: a kind discriminator (`t3`, `t1`, ...) plus
/// its raw data payload. Kept as raw JSON so the stored record is exactly what
/// the server returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingItem {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl ListingItem {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// The type-prefixed identifier (`t3_abc123`), if present and non-empty.
    pub fn fullname(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// The bare id36 (`abc123`), if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Any value that does not fit `T`, null included, becomes `T::default()`.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// The subset of a post payload the pipeline relies on. Each field defaults
/// on its own when missing, null or of the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostFields {
    #[serde(deserialize_with = "lenient")]
    pub id: String,
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub created_utc: f64,
    #[serde(deserialize_with = "lenient")]
    pub subreddit: String,
    #[serde(deserialize_with = "lenient")]
    pub author: String,
    #[serde(deserialize_with = "lenient")]
    pub title: String,
    #[serde(deserialize_with = "lenient")]
    pub selftext: String,
    #[serde(deserialize_with = "lenient")]
    pub url: String,
    #[serde(deserialize_with = "lenient")]
    pub permalink: String,
    #[serde(deserialize_with = "lenient")]
    pub is_self: bool,
    #[serde(deserialize_with = "lenient")]
    pub over_18: bool,
    #[serde(deserialize_with = "lenient")]
    pub score: i64,
    #[serde(deserialize_with = "lenient")]
    pub num_comments: u64,
    #[serde(deserialize_with = "lenient")]
    pub removed_by_category: Option<String>,
}

impl PostFields {
    pub fn from_data(data: &Value) -> Self {
        PostFields::deserialize(data).unwrap_or_else(|e| {
            warn!("Post payload is not an object, using defaults: {}", e);
            PostFields::default()
        })
    }
}

/// Classify a post as deleted/removed from its own fields.
///
/// Returns the `|`-joined reasons, or `None` for a normal post.
pub fn detect_removal(fields: &PostFields) -> Option<String> {
    let mut reasons = Vec::new();

    if fields.author == DELETED_MARKER {
        reasons.push("author_deleted".to_string());
    }
    if fields.selftext == DELETED_MARKER {
        reasons.push("text_deleted".to_string());
    }
    if fields.selftext == REMOVED_MARKER {
        reasons.push("text_removed".to_string());
    }
    if let Some(category) = fields
        .removed_by_category
        .as_deref()
        .filter(|category| !category.is_empty())
    {
        reasons.push(format!("removed_by_{}", category));
    }

    if reasons.is_empty() {
        None
    } else {
        Some(reasons.join(REMOVAL_REASON_SEPARATOR))
    }
}

/// Overlay the detail payload on the listing payload; detail wins on overlap.
fn merge_data(listing: &ListingItem, detail: Option<&ListingItem>) -> Value {
    let mut merged = match &listing.data {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    if let Some(Value::Object(detail_map)) = detail.map(|d| &d.data) {
        for (key, value) in detail_map {
            merged.insert(key.clone(), value.clone());
        }
    }

    Value::Object(merged)
}

/// A processed post, one line of the output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub fullname: String,
    pub created_utc: f64,
    pub subreddit: String,
    pub author: String,
    pub title: String,
    pub selftext: String,
    pub url: String,
    pub permalink: String,
    pub is_self: bool,
    #[serde(rename = "over_18")]
    pub is_adult: bool,
    pub score: i64,
    pub num_comments: u64,
    pub raw_listing_item: ListingItem,
    pub detail: Option<ListingItem>,
    pub comments: Option<Value>,
    pub fetched_at_utc: f64,
    #[serde(rename = "is_deleted_or_removed")]
    pub is_removed: bool,
    #[serde(rename = "removed_hint")]
    pub removed_reason: Option<String>,
}

impl Post {
    pub fn from_listing(
        item: ListingItem,
        detail: Option<ListingItem>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let merged = merge_data(&item, detail.as_ref());
        let fields = PostFields::from_data(&merged);
        let removed_reason = detect_removal(&fields);

        if let Some(reason) = &removed_reason {
            debug!("Post {} flagged as removed: {}", fields.name, reason);
        }

        Self {
            id: fields.id,
            fullname: fields.name,
            created_utc: fields.created_utc,
            subreddit: fields.subreddit,
            author: fields.author,
            title: fields.title,
            selftext: fields.selftext,
            url: fields.url,
            permalink: fields.permalink,
            is_self: fields.is_self,
            is_adult: fields.over_18,
            score: fields.score,
            num_comments: fields.num_comments,
            raw_listing_item: item,
            detail,
            comments: None,
            fetched_at_utc: epoch_seconds(fetched_at),
            is_removed: removed_reason.is_some(),
            removed_reason,
        }
    }
}

pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

/// Bounded set of already-processed fullnames.
///
/// Membership is a hash lookup; insertion order is kept alongside so the
/// oldest entries are evicted first once `max_keep` is exceeded.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    order: VecDeque<String>,
    members: HashSet<String>,
    max_keep: usize,
}

impl SeenSet {
    pub fn new(max_keep: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            max_keep,
        }
    }

    /// Rebuild from a persisted ordered list (oldest first), dropping
    /// duplicates and trimming to `max_keep`.
    pub fn from_ordered<I>(fullnames: I, max_keep: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = Self::new(max_keep);
        seen.extend(fullnames);
        seen
    }

    pub fn contains(&self, fullname: &str) -> bool {
        self.members.contains(fullname)
    }

    /// Record one fullname; returns false if it was already present.
    pub fn insert(&mut self, fullname: impl Into<String>) -> bool {
        let added = self.push(fullname.into());
        self.trim();
        added
    }

    pub fn extend<I>(&mut self, fullnames: I)
    where
        I: IntoIterator<Item = String>,
    {
        for fullname in fullnames {
            self.push(fullname);
        }
        self.trim();
    }

    fn push(&mut self, fullname: String) -> bool {
        if self.members.contains(&fullname) {
            return false;
        }
        self.members.insert(fullname.clone());
        self.order.push_back(fullname);
        true
    }

    fn trim(&mut self) {
        let excess = self.order.len().saturating_sub(self.max_keep);
        for _ in 0..excess {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        if excess > 0 {
            debug!("Trimmed {} old entries from seen set", excess);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Fullnames in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(data: Value) -> ListingItem {
        ListingItem::new("t3", data)
    }

    #[test]
    fn test_normal_post_is_not_removed() {
        let item = listing(json!({
            "id": "abc",
            "name": "t3_abc",
            "author": "someone",
            "selftext": "hello",
            "removed_by_category": null
        }));

        let post = Post::from_listing(item, None, Utc::now());
        assert!(!post.is_removed);
        assert_eq!(post.removed_reason, None);
    }

    #[test]
    fn test_deleted_author_is_flagged() {
        let item = listing(json!({"id": "abc", "name": "t3_abc", "author": "[deleted]"}));

        let post = Post::from_listing(item, None, Utc::now());
        assert!(post.is_removed);
        assert_eq!(post.removed_reason.as_deref(), Some("author_deleted"));
    }

    #[test]
    fn test_multiple_reasons_are_joined() {
        let fields = PostFields {
            author: "[deleted]".to_string(),
            selftext: "[removed]".to_string(),
            removed_by_category: Some("moderator".to_string()),
            ..Default::default()
        };

        assert_eq!(
            detect_removal(&fields).as_deref(),
            Some("author_deleted|text_removed|removed_by_moderator")
        );
    }

    #[test]
    fn test_empty_removal_category_is_ignored() {
        let fields = PostFields {
            removed_by_category: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(detect_removal(&fields), None);
    }

    #[test]
    fn test_detail_overrides_listing_fields() {
        let item = listing(json!({"id": "abc", "name": "t3_abc", "score": 1, "title": "old"}));
        let detail = listing(json!({"name": "t3_abc", "score": 42, "selftext": "[deleted]"}));

        let post = Post::from_listing(item.clone(), Some(detail.clone()), Utc::now());
        assert_eq!(post.score, 42);
        assert_eq!(post.title, "old");
        assert_eq!(post.removed_reason.as_deref(), Some("text_deleted"));
        assert_eq!(post.raw_listing_item, item);
        assert_eq!(post.detail, Some(detail));
    }

    #[test]
    fn test_missing_and_null_fields_default() {
        let item = listing(json!({"name": "t3_x", "selftext": null, "score": null}));

        let post = Post::from_listing(item, None, Utc::now());
        assert_eq!(post.fullname, "t3_x");
        assert_eq!(post.selftext, "");
        assert_eq!(post.score, 0);
        assert!(!post.is_self);
    }

    #[test]
    fn test_mistyped_field_keeps_the_rest() {
        let item = listing(json!({
            "id": "abc",
            "name": "t3_abc",
            "title": "Rust 2.0 released",
            "url": "https://example.com/rust",
            "subreddit": "rust",
            "created_utc": 1700000000,
            "score": {"up": 3},
            "num_comments": "many",
            "removed_by_category": 7
        }));

        let post = Post::from_listing(item, None, Utc::now());
        assert_eq!(post.fullname, "t3_abc");
        assert_eq!(post.title, "Rust 2.0 released");
        assert_eq!(post.url, "https://example.com/rust");
        assert_eq!(post.subreddit, "rust");
        assert_eq!(post.created_utc, 1700000000.0);
        assert_eq!(post.score, 0);
        assert_eq!(post.num_comments, 0);
        assert!(!post.is_removed);
    }

    #[test]
    fn test_post_record_field_names() {
        let item = listing(json!({"id": "abc", "name": "t3_abc", "over_18": true}));
        let post = Post::from_listing(item, None, Utc::now());

        let record = serde_json::to_value(&post).unwrap();
        assert_eq!(record["over_18"], json!(true));
        assert_eq!(record["is_deleted_or_removed"], json!(false));
        assert!(record["removed_hint"].is_null());
        assert!(record.get("raw_listing_item").is_some());
    }

    #[test]
    fn test_listing_item_fullname_requires_non_empty() {
        assert_eq!(listing(json!({"name": ""})).fullname(), None);
        assert_eq!(listing(json!({})).fullname(), None);
        assert_eq!(listing(json!({"name": "t3_a"})).fullname(), Some("t3_a"));
    }

    #[test]
    fn test_seen_set_evicts_oldest_first() {
        let mut seen = SeenSet::new(3);
        seen.extend(["a", "b", "c", "d", "e"].map(String::from));

        assert_eq!(seen.len(), 3);
        let kept: Vec<_> = seen.iter().cloned().collect();
        assert_eq!(kept, vec!["c", "d", "e"]);
        assert!(!seen.contains("a"));
        assert!(!seen.contains("b"));
        assert!(seen.contains("e"));
    }

    #[test]
    fn test_seen_set_ignores_duplicates() {
        let mut seen = SeenSet::new(10);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
        seen.extend(["b", "a", "c"].map(String::from));

        let kept: Vec<_> = seen.iter().cloned().collect();
        assert_eq!(kept, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_seen_set_from_ordered_trims() {
        let seen = SeenSet::from_ordered((0..10).map(|i| format!("t3_{}", i)), 4);
        let kept: Vec<_> = seen.iter().cloned().collect();
        assert_eq!(kept, vec!["t3_6", "t3_7", "t3_8", "t3_9"]);
    }
}
