use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::config::Config;

/// Verses rotated through by the daily verse, indexed by day of year.
pub const COMMON_VERSES: &[&str] = &[
    "john 3:16",
    "philippians 4:13",
    "jeremiah 29:11",
    "romans 8:28",
    "psalms 23:1",
    "proverbs 3:5-6",
    "isaiah 40:31",
    "matthew 11:28",
];

const FALLBACK_TEXT: &str = "For God so loved the world, that he gave his only begotten Son, \
    that whosoever believeth in him should not perish, but have everlasting life.";
const FALLBACK_REFERENCE: &str = "John 3:16";
const FALLBACK_TRANSLATION: &str = "King James Version";

/// A scripture passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    pub text: String,
    pub reference: String,
    pub translation: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl Verse {
    pub fn new(text: &str, reference: &str, translation: &str) -> Self {
        Self {
            text: text.to_string(),
            reference: reference.to_string(),
            translation: translation.to_string(),
            tags: BTreeSet::new(),
            created_at: Utc::now(),
            is_favorite: false,
        }
    }

    /// The verse returned when scripture lookup fails.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_TEXT, FALLBACK_REFERENCE, FALLBACK_TRANSLATION)
    }

    pub fn is_fallback(&self) -> bool {
        self.reference == FALLBACK_REFERENCE && self.text == FALLBACK_TEXT
    }

    /// Returns true if the tag was not already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.tags.insert(tag.trim().to_lowercase())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(&tag.trim().to_lowercase())
    }

    pub fn mark_favorite(&mut self, favorite: bool) {
        self.is_favorite = favorite;
    }
}

impl fmt::Display for Verse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} - {})", self.text, self.reference, self.translation)
    }
}

#[derive(Debug, Error)]
pub enum VerseError {
    #[error("Passage not found: {reference}")]
    NotFound { reference: String },

    #[error("Scripture API returned status {status}")]
    Status { status: StatusCode },

    #[error("Malformed scripture response: {0}")]
    Malformed(String),

    #[error("Invalid scripture API URL: {0}")]
    InvalidUrl(String),

    #[error("Scripture request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct BibleApiResponse {
    reference: Option<String>,
    text: Option<String>,
    translation_name: Option<String>,
    error: Option<String>,
}

/// Client for the scripture text API.
#[derive(Clone)]
pub struct VerseSource {
    client: Client,
    base_url: String,
    translation: String,
    api_key: Option<String>,
}

impl VerseSource {
    pub fn new(base_url: &str, translation: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            translation: translation.to_string(),
            api_key: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.bible_api_base_url.trim_end_matches('/').to_string(),
            translation: config.bible_translation.clone(),
            api_key: config.bible_api_key.clone(),
        }
    }

    /// Fetch a passage, substituting the fallback verse on any failure.
    pub async fn fetch(&self, reference: &str) -> Verse {
        match self.lookup(reference).await {
            Ok(verse) => verse,
            Err(e) => {
                tracing::warn!(reference, error = %e, "verse lookup failed, using fallback verse");
                Verse::fallback()
            }
        }
    }

    /// Fetch today's verse from the rotation.
    pub async fn fetch_daily(&self, date: NaiveDate) -> Verse {
        self.fetch(daily_reference(date)).await
    }

    /// Fetch a passage, retrying once with normalized book names on "not found".
    pub async fn lookup(&self, reference: &str) -> Result<Verse, VerseError> {
        match self.request(reference).await {
            Err(VerseError::NotFound { .. }) => match normalize_reference(reference) {
                Some(alternate) => {
                    tracing::debug!(reference, %alternate, "retrying with normalized reference");
                    self.request(&alternate).await
                }
                None => Err(VerseError::NotFound {
                    reference: reference.to_string(),
                }),
            },
            other => other,
        }
    }

    async fn request(&self, reference: &str) -> Result<Verse, VerseError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(VerseError::NotFound {
                reference: String::new(),
            });
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| VerseError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| VerseError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(reference);
        url.query_pairs_mut()
            .append_pair("translation", &self.translation);

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(VerseError::NotFound {
                reference: reference.to_string(),
            });
        }
        if !status.is_success() {
            return Err(VerseError::Status { status });
        }

        let body: BibleApiResponse = response
            .json()
            .await
            .map_err(|e| VerseError::Malformed(e.to_string()))?;

        if body.error.is_some() {
            return Err(VerseError::NotFound {
                reference: reference.to_string(),
            });
        }

        let text = body
            .text
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VerseError::Malformed("missing verse text".to_string()))?;

        Ok(Verse::new(
            &text,
            body.reference.as_deref().unwrap_or(reference),
            body.translation_name.as_deref().unwrap_or("KJV"),
        ))
    }
}

/// The rotation entry for a given day.
pub fn daily_reference(date: NaiveDate) -> &'static str {
    COMMON_VERSES[date.ordinal0() as usize % COMMON_VERSES.len()]
}

const BOOK_ALIASES: &[(&str, &str)] = &[
    ("psalm", "psalms"),
    ("ps", "psalms"),
    ("psa", "psalms"),
    ("song of songs", "song of solomon"),
    ("canticles", "song of solomon"),
    ("revelations", "revelation"),
    ("rev", "revelation"),
    ("gen", "genesis"),
    ("ex", "exodus"),
    ("prov", "proverbs"),
    ("isa", "isaiah"),
    ("jer", "jeremiah"),
    ("mt", "matthew"),
    ("matt", "matthew"),
    ("mk", "mark"),
    ("lk", "luke"),
    ("jn", "john"),
    ("rom", "romans"),
    ("phil", "philippians"),
    ("heb", "hebrews"),
];

fn book_regex() -> &'static Regex {
    static BOOK: OnceLock<Regex> = OnceLock::new();
    // Leading book name (with optional ordinal), then the rest of the reference.
    BOOK.get_or_init(|| {
        Regex::new(r"^\s*((?:[1-3]\s*)?[A-Za-z]+(?:\s+of\s+[A-Za-z]+)?)\.?(.*)$")
            .expect("book regex is valid")
    })
}

/// Rewrite common book-name spellings and abbreviations to the API's names.
/// Returns `None` when nothing would change.
pub fn normalize_reference(reference: &str) -> Option<String> {
    let caps = book_regex().captures(reference)?;
    let book = caps.get(1)?.as_str();
    let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let collapsed = book.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let (ordinal, name) = match collapsed.split_once(' ') {
        Some((n, name)) if n.chars().all(|c| c.is_ascii_digit()) => (Some(n), name),
        _ => (None, collapsed.as_str()),
    };

    let canonical = BOOK_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)?;

    let rest = rest.trim();
    let mut normalized = match ordinal {
        Some(n) => format!("{} {}", n, canonical),
        None => canonical.to_string(),
    };
    if !rest.is_empty() {
        normalized.push(' ');
        normalized.push_str(rest);
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn john_body() -> serde_json::Value {
        serde_json::json!({
            "reference": "John 3:16",
            "text": "For God so loved the world,\nthat he gave his only begotten Son...\n",
            "translation_id": "kjv",
            "translation_name": "King James Version"
        })
    }

    #[test]
    fn test_normalize_psalm() {
        assert_eq!(normalize_reference("psalm 23:1").as_deref(), Some("psalms 23:1"));
        assert_eq!(normalize_reference("Ps. 91").as_deref(), Some("psalms 91"));
    }

    #[test]
    fn test_normalize_multi_word_and_ordinal() {
        assert_eq!(
            normalize_reference("Song of Songs 2:4").as_deref(),
            Some("song of solomon 2:4")
        );
        assert_eq!(normalize_reference("1 jn 4:8").as_deref(), Some("1 john 4:8"));
    }

    #[test]
    fn test_normalize_leaves_known_books_alone() {
        assert_eq!(normalize_reference("john 3:16"), None);
        assert_eq!(normalize_reference("psalms 23"), None);
        assert_eq!(normalize_reference(""), None);
    }

    #[test]
    fn test_daily_reference_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(daily_reference(date), "john 3:16");
        assert_eq!(daily_reference(date), daily_reference(date));
        let next = date.succ_opt().unwrap();
        assert_eq!(daily_reference(next), "philippians 4:13");
    }

    #[test]
    fn test_verse_tags() {
        let mut verse = Verse::fallback();
        assert!(verse.add_tag("Love"));
        assert!(!verse.add_tag("love"));
        assert_eq!(verse.tags.len(), 1);
        assert!(verse.remove_tag("LOVE"));
        assert!(verse.tags.is_empty());
        verse.mark_favorite(true);
        assert!(verse.is_favorite);
    }

    #[test]
    fn test_verse_display() {
        let verse = Verse::new("Jesus wept.", "John 11:35", "KJV");
        assert_eq!(verse.to_string(), "Jesus wept. (John 11:35 - KJV)");
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/john"))
            .and(query_param("translation", "kjv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(john_body()))
            .expect(1)
            .mount(&server)
            .await;

        let source = VerseSource::new(&server.uri(), "kjv");
        let verse = source.fetch("john 3:16").await;

        assert_eq!(verse.reference, "John 3:16");
        assert_eq!(verse.translation, "King James Version");
        assert!(!verse.text.contains('\n'));
        assert!(!verse.is_fallback());
    }

    #[tokio::test]
    async fn test_not_found_retries_with_normalized_book() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/psalm%20"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"error": "not found"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex("^/psalms%20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "reference": "Psalms 23:1",
                "text": "The LORD is my shepherd; I shall not want.",
                "translation_name": "King James Version"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = VerseSource::new(&server.uri(), "kjv");
        let verse = source.lookup("psalm 23:1").await.unwrap();
        assert_eq!(verse.reference, "Psalms 23:1");
    }

    #[tokio::test]
    async fn test_fetch_never_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = VerseSource::new(&server.uri(), "kjv");
        for reference in ["john 3:16", "not a book 99:99", "", "psalm 23:1"] {
            let verse = source.fetch(reference).await;
            assert!(verse.is_fallback());
        }
    }

    #[tokio::test]
    async fn test_fetch_malformed_payload_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let source = VerseSource::new(&server.uri(), "kjv");
        assert!(matches!(
            source.lookup("john 3:16").await,
            Err(VerseError::Malformed(_))
        ));
        assert!(source.fetch("john 3:16").await.is_fallback());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_falls_back() {
        let source = VerseSource::new("http://127.0.0.1:9", "kjv");
        assert!(source.fetch("john 3:16").await.is_fallback());
    }
}
