//! Engineering-blog aggregator client
//!
//! Fetches the latest posts, optionally filtered by topic and source tags,
//! and normalizes them into `Post` records with a human "time ago" string
//! and an estimated read time. Also lists the available topics and sources
//! for the reference-data cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{clamp_count, Fetched, UpstreamClient};
use crate::cache::{ReferenceEntry, ReferenceKind, ReferenceSource};
use crate::error::FetchError;
use crate::store::Settings;

/// Base URL for the aggregator API
pub const AGGREGATOR_BASE_URL: &str = "https://api.engblogs.dev/v1";

const MIN_COUNT: usize = 5;
const MAX_COUNT: usize = 20;
const DEFAULT_COUNT: usize = 10;

/// Reading speed used when the provider has no read time
const WORDS_PER_MINUTE: u32 = 200;

/// Tag value meaning "no filter"
const ALL_SENTINEL: &str = "all";

const SERVICE: &str = "Aggregator";

/// Normalized aggregator post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    /// Canonical link on the aggregator
    pub link: String,
    /// Link to the original blog post
    pub external_link: String,
    pub source: String,
    pub time_ago: String,
    /// Estimated read time in minutes
    pub read_time: u32,
    pub topics: Vec<String>,
}

/// Client for the aggregator widget
#[derive(Debug, Clone)]
pub struct AggregatorClient {
    client: Client,
    base_url: String,
}

impl AggregatorClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, AGGREGATOR_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetches the first page of posts matching the filters
    ///
    /// # Arguments
    /// * `count` - Page size
    /// * `topics` - Topic tags; empty means all topics
    /// * `sources` - Source tags; empty means all sources
    pub async fn fetch_posts(
        &self,
        count: usize,
        topics: &[String],
        sources: &[String],
    ) -> Result<Vec<Post>, FetchError> {
        let mut query = vec![("page", "1".to_string()), ("per_page", count.to_string())];
        if !topics.is_empty() {
            query.push(("topics", topics.join(",")));
        }
        if !sources.is_empty() {
            query.push(("sources", sources.join(",")));
        }

        let response = self
            .client
            .get(format!("{}/posts", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::UpstreamError(
                "Failed to fetch aggregator posts".to_string(),
            ));
        }

        let page: Page<PostRecord> = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        let now = Utc::now();
        Ok(page
            .items
            .into_iter()
            .take(count)
            .map(|record| normalize(record, now))
            .collect())
    }
}

#[async_trait]
impl UpstreamClient for AggregatorClient {
    async fn fetch(&self, settings: &Settings) -> Result<Fetched, FetchError> {
        let count = clamp_count(settings, MIN_COUNT, MAX_COUNT, DEFAULT_COUNT);
        let topics = parse_tags(settings.get("topics"));
        let sources = parse_tags(settings.get("sources"));

        let posts = self.fetch_posts(count, &topics, &sources).await?;
        Fetched::from_serialize(&posts)
    }

    fn fetch_keys(&self) -> &'static [&'static str] {
        &["topics", "sources", "count"]
    }
}

#[async_trait]
impl ReferenceSource for AggregatorClient {
    async fn list(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntry>, FetchError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, kind.path()))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::UpstreamError(format!(
                "Failed to fetch aggregator {}",
                kind.path()
            )));
        }

        let page: Page<ReferenceEntry> = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;
        Ok(page.items)
    }
}

/// Splits a comma-separated tag setting
///
/// Returns an empty list (no filter) when the setting is missing, blank, or
/// contains the `all` sentinel.
pub fn parse_tags(value: Option<&str>) -> Vec<String> {
    let tags: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if tags.iter().any(|t| t.eq_ignore_ascii_case(ALL_SENTINEL)) {
        Vec::new()
    } else {
        tags
    }
}

/// Formats how long ago `published` was, relative to `now`
///
/// <60 min → "N min ago", <24h → hours, <7d → days, <30d → whole weeks,
/// otherwise whole 30-day months. Future timestamps count as 0 minutes.
pub fn time_ago(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - published).num_minutes().max(0);
    if minutes < 60 {
        return format!("{} min ago", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }

    let days = hours / 24;
    if days < 7 {
        plural(days, "day")
    } else if days < 30 {
        plural(days / 7, "week")
    } else {
        plural(days / 30, "month")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{} {} ago", n, unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// Provider read time, or an estimate from the word count
fn estimate_read_time(reading_time: Option<u32>, word_count: Option<u32>) -> u32 {
    reading_time
        .filter(|m| *m > 0)
        .unwrap_or_else(|| word_count.unwrap_or(0).div_ceil(WORDS_PER_MINUTE))
        .max(1)
}

fn normalize(record: PostRecord, now: DateTime<Utc>) -> Post {
    Post {
        link: record.permalink.unwrap_or_else(|| record.url.clone()),
        external_link: record.url,
        title: record.title,
        source: record.source.name,
        time_ago: time_ago(record.published_at, now),
        read_time: estimate_read_time(record.reading_time, record.word_count),
        topics: record.topics,
    }
}

/// Paginated list envelope used by every aggregator endpoint
#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

/// A post as returned by the aggregator API
#[derive(Debug, Deserialize)]
struct PostRecord {
    title: String,
    permalink: Option<String>,
    url: String,
    source: SourceRef,
    published_at: DateTime<Utc>,
    reading_time: Option<u32>,
    word_count: Option<u32>,
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SourceRef {
    name: String,
}
