//! Study operations: each builds a prompt, generates with backend fallback,
//! and appends the result to the session.

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::Config;
use crate::prompts;
use crate::provider::{Backend, Task};
use crate::search::{filter_trusted, SearchClient, SearchError, SearchResult};
use crate::selector::{ModelSelector, SelectionContext};
use crate::session::{resolve_export_path, SearchRecord, StudySession, TeachingRecord};
use crate::verse::{Verse, VerseSource};

/// Sources kept with a teaching or search record.
const MAX_SOURCES: usize = 3;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("No language model backend is available")]
    NoBackendAvailable,

    #[error("Every backend failed the {task} request: {last_error}")]
    AllBackendsFailed { task: Task, last_error: String },

    #[error("Please provide a {what}")]
    EmptyInput { what: &'static str },

    #[error("No verse yet. Fetch one with `verse` or `analyze <reference>` first")]
    NoCurrentVerse,

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Failed to export session: {0}")]
    Export(#[from] std::io::Error),
}

/// Text produced by one backend.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub backend: Backend,
    pub latency: Duration,
}

#[derive(Debug, Clone)]
pub struct DailyVerse {
    pub verse: Verse,
    /// Absent when no backend could produce one.
    pub thought: Option<String>,
    pub backend: Option<Backend>,
}

#[derive(Debug, Clone)]
pub struct Teaching {
    pub topic: String,
    pub content: String,
    pub backend: Backend,
    pub references: Vec<SearchResult>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SearchInsight {
    pub query: String,
    pub analysis: String,
    pub sources: Vec<SearchResult>,
    /// References the model relates to the query; empty if it suggested none.
    pub related_verses: Vec<String>,
    pub backend: Backend,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub passage: String,
    /// The looked-up passage; `None` when the input was analysed as free text.
    pub verse: Option<Verse>,
    pub content: String,
    pub backend: Backend,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Reflection {
    pub subject: String,
    pub verse: Option<Verse>,
    pub content: String,
    pub backend: Backend,
    pub created_at: DateTime<Utc>,
}

/// The study assistant. Owns its selector and session; nothing is shared
/// between agents.
pub struct Agent {
    config: Config,
    verses: VerseSource,
    search: SearchClient,
    selector: ModelSelector,
    session: StudySession,
}

impl Agent {
    pub fn new(config: Config) -> Self {
        let verses = VerseSource::from_config(&config);
        let search = SearchClient::from_config(&config);
        let selector = ModelSelector::from_config(&config);
        Self::with_parts(config, verses, search, selector)
    }

    pub fn with_parts(
        config: Config,
        verses: VerseSource,
        search: SearchClient,
        selector: ModelSelector,
    ) -> Self {
        Self {
            config,
            verses,
            search,
            selector,
            session: StudySession::new(),
        }
    }

    pub fn session(&self) -> &StudySession {
        &self.session
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    /// Today's verse from the rotation, with a short devotional thought.
    pub async fn daily_verse(&mut self) -> DailyVerse {
        let today = Local::now().date_naive();
        let verse = self.verses.fetch_daily(today).await;
        self.session.add_verse(verse.clone());

        let context = context(&[("verse", verse.text.as_str())]);
        match self
            .generate(Task::Reflection, &context, &prompts::daily_thought(&verse))
            .await
        {
            Ok(generation) => {
                self.session.add_teaching(TeachingRecord {
                    kind: Task::Reflection,
                    subject: format!("Daily thought on {}", verse.reference),
                    content: generation.text.clone(),
                    backend: generation.backend,
                    references: Vec::new(),
                    created_at: Utc::now(),
                });
                DailyVerse {
                    verse,
                    thought: Some(generation.text),
                    backend: Some(generation.backend),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "no devotional thought for the daily verse");
                DailyVerse {
                    verse,
                    thought: None,
                    backend: None,
                }
            }
        }
    }

    /// What Jesus taught about `topic`, with supporting web references.
    pub async fn teach(&mut self, topic: &str) -> Result<Teaching, AgentError> {
        let topic = topic.trim();
        let context = context(&[("topic", topic)]);
        let generation = self
            .generate(Task::Teaching, &context, &prompts::teaching(topic))
            .await?;

        let query = if topic.is_empty() {
            "Jesus main teachings".to_string()
        } else {
            format!("Jesus teachings {}", topic)
        };
        let references = match self.search.search(&query, self.config.search_results).await {
            Ok(results) => self.apply_source_policy(results),
            Err(e) => {
                tracing::warn!(error = %e, "teaching references unavailable");
                Vec::new()
            }
        };

        let subject = if topic.is_empty() { "Jesus' teachings" } else { topic };
        let teaching = Teaching {
            topic: subject.to_string(),
            content: generation.text,
            backend: generation.backend,
            references,
            created_at: Utc::now(),
        };

        self.session.add_teaching(TeachingRecord {
            kind: Task::Teaching,
            subject: teaching.topic.clone(),
            content: teaching.content.clone(),
            backend: teaching.backend,
            references: teaching.references.clone(),
            created_at: teaching.created_at,
        });
        Ok(teaching)
    }

    /// Web search plus the model's analysis of what was found. Search
    /// failures are returned to the caller.
    pub async fn search_insights(&mut self, query: &str) -> Result<SearchInsight, AgentError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::EmptyInput { what: "search query" });
        }

        let results = self
            .search
            .search(
                &format!("bible {} meaning interpretation", query),
                self.config.search_results,
            )
            .await?;
        let mut sources = if self.config.validate_sources {
            filter_trusted(results)
        } else {
            results
        };

        let snippets: Vec<&str> = sources.iter().map(|s| s.snippet.as_str()).collect();
        let joined = snippets.join("\n");
        let context = context(&[("query", query), ("sources", joined.as_str())]);
        let generation = self
            .generate(Task::Search, &context, &prompts::search_insights(query, &sources))
            .await?;

        let related_verses = match self.related_verses(query).await {
            Ok(references) => references,
            Err(e) => {
                tracing::warn!(error = %e, "no related verses for search");
                Vec::new()
            }
        };

        sources.truncate(MAX_SOURCES);
        let insight = SearchInsight {
            query: query.to_string(),
            analysis: generation.text,
            sources,
            related_verses,
            backend: generation.backend,
            created_at: Utc::now(),
        };

        self.session.add_search(SearchRecord {
            query: insight.query.clone(),
            analysis: insight.analysis.clone(),
            sources: insight.sources.clone(),
            related_verses: insight.related_verses.clone(),
            backend: insight.backend,
            created_at: insight.created_at,
        });
        Ok(insight)
    }

    /// Analyse a passage. A reference is looked up first; anything that is
    /// not a known reference is analysed as free text.
    pub async fn analyze(&mut self, passage: &str) -> Result<Analysis, AgentError> {
        let passage = passage.trim();
        if passage.is_empty() {
            return Err(AgentError::EmptyInput { what: "passage" });
        }

        let verse = match self.verses.lookup(passage).await {
            Ok(verse) => Some(verse),
            Err(e) => {
                tracing::debug!(passage, error = %e, "analysing input as free text");
                None
            }
        };

        let prompt = prompts::analysis(
            verse.as_ref().map_or(passage, |v| v.reference.as_str()),
            verse.as_ref().map(|v| v.text.as_str()),
        );
        let text = verse.as_ref().map_or(passage, |v| v.text.as_str());
        let context = context(&[("passage", text)]);
        let generation = self.generate(Task::Analysis, &context, &prompt).await?;

        if let Some(verse) = &verse {
            self.session.add_verse(verse.clone());
        }

        let analysis = Analysis {
            passage: verse.as_ref().map_or_else(|| passage.to_string(), |v| v.reference.clone()),
            verse,
            content: generation.text,
            backend: generation.backend,
            created_at: Utc::now(),
        };

        self.session.add_teaching(TeachingRecord {
            kind: Task::Analysis,
            subject: analysis.passage.clone(),
            content: analysis.content.clone(),
            backend: analysis.backend,
            references: Vec::new(),
            created_at: analysis.created_at,
        });
        Ok(analysis)
    }

    /// Reflect on a topic or a verse reference. With no input, reflects on
    /// the current verse, fetching today's verse if there is none yet.
    pub async fn reflect(&mut self, topic_or_verse: &str) -> Result<Reflection, AgentError> {
        let input = topic_or_verse.trim();

        let verse = if input.is_empty() {
            match self.session.current_verse() {
                Some(verse) => Some(verse.clone()),
                None => {
                    let verse = self.verses.fetch_daily(Local::now().date_naive()).await;
                    self.session.add_verse(verse.clone());
                    Some(verse)
                }
            }
        } else if looks_like_reference(input) {
            match self.verses.lookup(input).await {
                Ok(verse) => {
                    self.session.add_verse(verse.clone());
                    Some(verse)
                }
                Err(e) => {
                    tracing::debug!(input, error = %e, "reflecting on input as a topic");
                    None
                }
            }
        } else {
            None
        };

        let (subject, prompt, context) = match &verse {
            Some(verse) => (
                verse.reference.clone(),
                prompts::reflection_on_verse(verse),
                context(&[("verse", verse.text.as_str())]),
            ),
            None => (
                input.to_string(),
                prompts::reflection_on_topic(input),
                context(&[("topic", input)]),
            ),
        };

        let generation = self.generate(Task::Reflection, &context, &prompt).await?;
        let reflection = Reflection {
            subject,
            verse,
            content: generation.text,
            backend: generation.backend,
            created_at: Utc::now(),
        };

        self.session.add_teaching(TeachingRecord {
            kind: Task::Reflection,
            subject: reflection.subject.clone(),
            content: reflection.content.clone(),
            backend: reflection.backend,
            references: Vec::new(),
            created_at: reflection.created_at,
        });
        Ok(reflection)
    }

    /// Up to three verse references the model relates to `topic`.
    pub async fn related_verses(&mut self, topic: &str) -> Result<Vec<String>, AgentError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(AgentError::EmptyInput { what: "topic" });
        }

        let context = context(&[("topic", topic)]);
        let generation = self
            .generate(Task::Search, &context, &prompts::related_verses(topic))
            .await?;

        Ok(generation
            .text
            .lines()
            .map(|line| line.trim().trim_start_matches(|c: char| c == '-' || c == '*' || c == '•').trim())
            .filter(|line| looks_like_reference(line))
            .take(MAX_SOURCES)
            .map(str::to_string)
            .collect())
    }

    /// Mark or unmark the current verse as a favorite.
    pub fn favorite_current_verse(&mut self, favorite: bool) -> Result<&Verse, AgentError> {
        let verse = self.session.current_verse_mut().ok_or(AgentError::NoCurrentVerse)?;
        verse.mark_favorite(favorite);
        Ok(&*verse)
    }

    /// Add (or with `add == false`, remove) a tag on the current verse.
    /// Returns whether the tags changed.
    pub fn tag_current_verse(&mut self, tag: &str, add: bool) -> Result<(bool, &Verse), AgentError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(AgentError::EmptyInput { what: "tag" });
        }
        let verse = self.session.current_verse_mut().ok_or(AgentError::NoCurrentVerse)?;
        let changed = if add { verse.add_tag(tag) } else { verse.remove_tag(tag) };
        Ok((changed, &*verse))
    }

    /// Write the session as Markdown and return the path written.
    pub fn export(&self, filename: Option<&str>) -> Result<PathBuf, AgentError> {
        let path = resolve_export_path(&self.config.export_dir, filename, Local::now());
        self.session.export(&path)?;
        Ok(path)
    }

    /// Generate on the selected backend, then on the remaining backends in
    /// declaration order. Every attempt is recorded in the selector.
    pub async fn generate(
        &mut self,
        task: Task,
        context: &SelectionContext,
        prompt: &str,
    ) -> Result<Generation, AgentError> {
        let first = match self.selector.select_and_get(task, Some(context)).await {
            Some((backend, _)) => backend,
            // Failed constructions are now remembered, so this picks among the rest.
            None => self.selector.select(task, Some(context)),
        };

        let mut last_error: Option<String> = None;
        let mut attempted = false;

        for backend in ModelSelector::fallback_order(first) {
            let instance = match self.selector.get_or_create(backend).await {
                Ok(instance) => instance,
                Err(_) => continue,
            };

            attempted = true;
            let started = Instant::now();
            match instance.generate(prompt).await {
                Ok(text) => {
                    let latency = started.elapsed();
                    self.selector.update_performance(backend, true, latency);
                    tracing::debug!(task = %task, backend = backend.as_str(), ?latency, "generation succeeded");
                    return Ok(Generation { text, backend, latency });
                }
                Err(e) => {
                    self.selector.update_performance(backend, false, started.elapsed());
                    tracing::warn!(task = %task, backend = backend.as_str(), error = %e, "generation failed, trying next backend");
                    last_error = Some(e.to_string());
                }
            }
        }

        if !attempted {
            return Err(AgentError::NoBackendAvailable);
        }
        Err(AgentError::AllBackendsFailed {
            task,
            last_error: last_error.unwrap_or_default(),
        })
    }

    fn apply_source_policy(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut results = if self.config.validate_sources {
            filter_trusted(results)
        } else {
            results
        };
        results.truncate(MAX_SOURCES);
        results
    }
}

fn context(pairs: &[(&str, &str)]) -> SelectionContext {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// True for inputs like `John 3:16` or `1 Cor 13:4-7`.
fn looks_like_reference(input: &str) -> bool {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    REFERENCE
        .get_or_init(|| {
            Regex::new(r"^(?:[1-3]\s*)?[A-Za-z][A-Za-z .]*\s+\d+(?::\d+(?:-\d+)?)?$")
                .expect("reference regex is valid")
        })
        .is_match(input.trim())
}
