//! Hacker News style headline-list client
//!
//! Fetches the top-story id list, truncates it to the widget's count and
//! then fetches every item concurrently.
//!
//! Partial failure is part of the contract: an item that fails to load, or
//! that the provider returns as `null`, is dropped from the list instead of
//! failing the whole widget. Only a failed id-list request fails the fetch.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{clamp_count, Fetched, UpstreamClient};
use crate::error::FetchError;
use crate::store::Settings;

/// Base URL for the Hacker News Firebase API
pub const HACKER_NEWS_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

const MIN_COUNT: usize = 5;
const MAX_COUNT: usize = 25;
const DEFAULT_COUNT: usize = 10;

const SERVICE: &str = "Headline";

/// A single headline item as returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,
    pub title: Option<String>,
    pub url: Option<String>,
    pub score: Option<i64>,
    pub by: Option<String>,
    /// Unix seconds
    pub time: Option<i64>,
    /// Comment count
    pub descendants: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Client for the headline-list widget
#[derive(Debug, Clone)]
pub struct HeadlineClient {
    client: Client,
    base_url: String,
}

impl HeadlineClient {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, HACKER_NEWS_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetches up to `count` stories in the provider's ranking order
    pub async fn fetch_stories(&self, count: usize) -> Result<Vec<Story>, FetchError> {
        let response = self
            .client
            .get(format!("{}/topstories.json", self.base_url))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::UpstreamError(
                "Failed to fetch headline list".to_string(),
            ));
        }

        let ids: Vec<u64> = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;
        let ids = &ids[..ids.len().min(count)];

        // join_all yields results in input order, so zipping with `ids`
        // keeps the provider's ranking regardless of completion order.
        let items = join_all(ids.iter().map(|id| self.fetch_item(*id))).await;

        Ok(ids
            .iter()
            .zip(items)
            .filter_map(|(id, item)| match item {
                Ok(Some(story)) => Some(story),
                Ok(None) => {
                    debug!(id, "headline item is null, dropping");
                    None
                }
                Err(e) => {
                    debug!(id, error = %e, "headline item failed, dropping");
                    None
                }
            })
            .collect())
    }

    async fn fetch_item(&self, id: u64) -> Result<Option<Story>, FetchError> {
        let response = self
            .client
            .get(format!("{}/item/{}.json", self.base_url, id))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))?;

        if !response.status().is_success() {
            return Err(FetchError::UpstreamError(format!(
                "Item {} returned {}",
                id,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(SERVICE, &e))
    }
}

#[async_trait]
impl UpstreamClient for HeadlineClient {
    async fn fetch(&self, settings: &Settings) -> Result<Fetched, FetchError> {
        let count = clamp_count(settings, MIN_COUNT, MAX_COUNT, DEFAULT_COUNT);
        let stories = self.fetch_stories(count).await?;
        Fetched::from_serialize(&stories)
    }

    fn fetch_keys(&self) -> &'static [&'static str] {
        &["count"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn story_json(id: u64) -> String {
        format!(
            r#"{{"id": {id}, "title": "Story {id}", "url": "https://example.com/{id}", "score": 10, "by": "pg", "time": 1700000000, "descendants": 3, "type": "story"}}"#
        )
    }

    async fn mount_ids(server: &MockServer, ids: &str) {
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ids))
            .mount(server)
            .await;
    }

    async fn mount_item(server: &MockServer, id: u64, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{}.json", id)))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_story() {
        let story: Story = serde_json::from_str(&story_json(7)).expect("Failed to parse story");
        assert_eq!(story.id, 7);
        assert_eq!(story.title.as_deref(), Some("Story 7"));
        assert_eq!(story.kind.as_deref(), Some("story"));
    }

    #[test]
    fn test_parse_story_with_missing_fields() {
        let story: Story = serde_json::from_str(r#"{"id": 3}"#).expect("Failed to parse story");
        assert_eq!(story.id, 3);
        assert!(story.url.is_none());
    }

    #[tokio::test]
    async fn test_failed_item_is_dropped_and_order_preserved() {
        let server = MockServer::start().await;
        mount_ids(&server, "[1, 2, 3]").await;
        mount_item(&server, 1, ResponseTemplate::new(200).set_body_string(story_json(1))).await;
        mount_item(&server, 2, ResponseTemplate::new(500)).await;
        mount_item(
            &server,
            3,
            ResponseTemplate::new(200).set_body_string(story_json(3)),
        )
        .await;

        let client = HeadlineClient::with_base_url(Client::new(), server.uri());
        let stories = client.fetch_stories(10).await.expect("Fetch should succeed");

        assert_eq!(stories.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_null_items_are_filtered() {
        let server = MockServer::start().await;
        mount_ids(&server, "[4, 5]").await;
        mount_item(&server, 4, ResponseTemplate::new(200).set_body_string("null")).await;
        mount_item(&server, 5, ResponseTemplate::new(200).set_body_string(story_json(5))).await;

        let client = HeadlineClient::with_base_url(Client::new(), server.uri());
        let stories = client.fetch_stories(10).await.expect("Fetch should succeed");

        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id, 5);
    }

    #[tokio::test]
    async fn test_slow_item_does_not_reorder() {
        let server = MockServer::start().await;
        mount_ids(&server, "[10, 11]").await;
        mount_item(
            &server,
            10,
            ResponseTemplate::new(200)
                .set_body_string(story_json(10))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .await;
        mount_item(&server, 11, ResponseTemplate::new(200).set_body_string(story_json(11))).await;

        let client = HeadlineClient::with_base_url(Client::new(), server.uri());
        let stories = client.fetch_stories(10).await.expect("Fetch should succeed");

        assert_eq!(stories.iter().map(|s| s.id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[tokio::test]
    async fn test_fetch_truncates_to_clamped_count() {
        let server = MockServer::start().await;
        let ids: Vec<u64> = (1..=30).collect();
        mount_ids(&server, &serde_json::to_string(&ids).unwrap()).await;
        for id in 1..=30 {
            mount_item(&server, id, ResponseTemplate::new(200).set_body_string(story_json(id)))
                .await;
        }

        let client = HeadlineClient::with_base_url(Client::new(), server.uri());
        let settings: Settings = [("count", "2")].into_iter().collect();
        let fetched = client.fetch(&settings).await.expect("Fetch should succeed");

        // 2 is below the minimum of 5
        assert_eq!(fetched.data.as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn test_id_list_failure_fails_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HeadlineClient::with_base_url(Client::new(), server.uri());
        let result = client.fetch(&Settings::new()).await;

        assert!(matches!(result, Err(FetchError::UpstreamError(_))));
    }
}
