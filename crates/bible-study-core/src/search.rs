use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

/// Domains whose content is accepted when source validation is enabled.
pub const TRUSTED_DOMAINS: &[&str] = &[
    "biblehub.com",
    "biblegateway.com",
    "biblestudytools.com",
    "gotquestions.org",
    "christianity.com",
    "bible.org",
];

/// A single normalized web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl SearchResult {
    /// True when the link's host is a trusted domain or one of its subdomains.
    pub fn is_trusted(&self) -> bool {
        let Some(host) = Url::parse(&self.link)
            .ok()
            .and_then(|url| url.host_str().map(str::to_lowercase))
        else {
            return false;
        };

        TRUSTED_DOMAINS.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .map_or(false, |prefix| prefix.ends_with('.'))
        })
    }
}

/// Keep only results from trusted scholarly and devotional sites.
pub fn filter_trusted(results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.into_iter().filter(SearchResult::is_trusted).collect()
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search API key is not configured")]
    MissingApiKey,

    #[error("Search failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Fixed-count retry with exponential backoff: `base_delay * 2^attempt`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    position: Option<u32>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

impl From<SerperOrganic> for SearchResult {
    fn from(raw: SerperOrganic) -> Self {
        Self {
            title: raw.title,
            link: raw.link,
            snippet: raw.snippet,
            position: raw.position,
            date: raw.date.filter(|d| !d.is_empty()),
        }
    }
}

/// Client for the Serper web search API.
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    retry: RetryPolicy,
}

impl SearchClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: config.serper_api_key.clone(),
            base_url: config.serper_api_base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Organic web results for `query`.
    pub async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let response = self.post_with_retry("search", query, num_results).await?;
        Ok(response.organic.into_iter().map(SearchResult::from).collect())
    }

    async fn post_with_retry(
        &self,
        endpoint: &str,
        query: &str,
        num_results: usize,
    ) -> Result<SerperResponse, SearchError> {
        let api_key = self.api_key.as_deref().ok_or(SearchError::MissingApiKey)?;
        let url = format!("{}/{}", self.base_url, endpoint);
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.post_once(&url, api_key, query, num_results).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, attempts, query, error = %e, "search attempt failed");
                    last_error = e.to_string();
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(SearchError::Exhausted { attempts, last_error })
    }

    async fn post_once(
        &self,
        url: &str,
        api_key: &str,
        query: &str,
        num_results: usize,
    ) -> Result<SerperResponse, reqwest::Error> {
        self.client
            .post(url)
            .header("X-API-KEY", api_key)
            .json(&SerperRequest { q: query, num: num_results })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn organic_body() -> serde_json::Value {
        serde_json::json!({
            "organic": [
                {
                    "title": "What does the Bible say about faith?",
                    "link": "https://www.gotquestions.org/faith.html",
                    "snippet": "Faith is the substance of things hoped for...",
                    "position": 1
                },
                {
                    "title": "Faith - Wikipedia",
                    "link": "https://en.wikipedia.org/wiki/Faith",
                    "snippet": "Faith is confidence or trust...",
                    "position": 2,
                    "date": ""
                }
            ]
        })
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_filter_trusted() {
        let results = vec![
            SearchResult {
                title: "a".into(),
                link: "https://BibleHub.com/john/3-16.htm".into(),
                snippet: String::new(),
                position: Some(1),
                date: None,
            },
            SearchResult {
                title: "b".into(),
                link: "https://example.com/faith".into(),
                snippet: String::new(),
                position: Some(2),
                date: None,
            },
        ];
        let trusted = filter_trusted(results);
        assert_eq!(trusted.len(), 1);
        assert_eq!(trusted[0].title, "a");
    }

    #[test]
    fn test_trusted_matches_host_not_substring() {
        let result = |link: &str| SearchResult {
            title: String::new(),
            link: link.to_string(),
            snippet: String::new(),
            position: None,
            date: None,
        };

        assert!(result("https://bible.org/article").is_trusted());
        assert!(result("https://www.gotquestions.org/faith.html").is_trusted());
        assert!(!result("https://bible.org.evil.net/").is_trusted());
        assert!(!result("https://notchristianity.com/").is_trusted());
        assert!(!result("https://example.com/?ref=biblehub.com").is_trusted());
        assert!(!result("not a url").is_trusted());
    }

    #[tokio::test]
    async fn test_search_parses_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "test-key"))
            .and(body_json(serde_json::json!({"q": "faith", "num": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new("test-key", &server.uri()).with_retry_policy(fast_retry());
        let results = client.search("faith", 5).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].position, Some(1));
        assert!(results[0].is_trusted());
        assert_eq!(results[1].date, None);
    }

    #[tokio::test]
    async fn test_search_single_call_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new("k", &server.uri()).with_retry_policy(fast_retry());
        client.search("hope", 3).await.unwrap();
        // Expectation of exactly one request is verified when the server drops.
    }

    #[tokio::test]
    async fn test_search_exhausts_after_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = SearchClient::new("k", &server.uri()).with_retry_policy(fast_retry());
        let err = client.search("grace", 5).await.unwrap_err();

        match err {
            SearchError::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_recovers_on_second_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(organic_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new("k", &server.uri()).with_retry_policy(fast_retry());
        let results = client.search("love", 5).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = SearchClient::from_config(&Config::new());
        assert!(matches!(
            client.search("faith", 5).await,
            Err(SearchError::MissingApiKey)
        ));
    }
}
