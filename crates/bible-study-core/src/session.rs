//! In-memory study session log and Markdown export.
//!
//! Records are only ever appended. Export writes each section in append order.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::provider::{Backend, Task};
use crate::search::SearchResult;
use crate::verse::Verse;

/// A generated teaching, analysis or reflection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingRecord {
    pub kind: Task,
    pub subject: String,
    pub content: String,
    pub backend: Backend,
    #[serde(default)]
    pub references: Vec<SearchResult>,
    pub created_at: DateTime<Utc>,
}

/// A web search and the model's analysis of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query: String,
    pub analysis: String,
    pub sources: Vec<SearchResult>,
    #[serde(default)]
    pub related_verses: Vec<String>,
    pub backend: Backend,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub verses: Vec<Verse>,
    pub teachings: Vec<TeachingRecord>,
    pub searches: Vec<SearchRecord>,
    pub created_at: DateTime<Utc>,
}

impl Default for StudySession {
    fn default() -> Self {
        Self::new()
    }
}

impl StudySession {
    pub fn new() -> Self {
        Self {
            verses: Vec::new(),
            teachings: Vec::new(),
            searches: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn add_verse(&mut self, verse: Verse) {
        self.verses.push(verse);
    }

    pub fn add_teaching(&mut self, record: TeachingRecord) {
        self.teachings.push(record);
    }

    pub fn add_search(&mut self, record: SearchRecord) {
        self.searches.push(record);
    }

    /// The most recently fetched verse.
    pub fn current_verse(&self) -> Option<&Verse> {
        self.verses.last()
    }

    pub fn current_verse_mut(&mut self) -> Option<&mut Verse> {
        self.verses.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty() && self.teachings.is_empty() && self.searches.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let started = self.created_at.with_timezone(&Local);

        let _ = writeln!(md, "# Scripture Study - {}\n", started.format("%Y-%m-%d"));
        let _ = writeln!(md, "*Session started {}*\n", started.format("%Y-%m-%d %H:%M"));

        if self.is_empty() {
            md.push_str("_Nothing recorded in this session._\n");
            return md;
        }

        if !self.verses.is_empty() {
            md.push_str("## 📖 Verses\n\n");
            for verse in &self.verses {
                write_verse(&mut md, verse);
            }
        }

        if !self.teachings.is_empty() {
            md.push_str("## 🎯 Teachings\n\n");
            for record in &self.teachings {
                write_teaching(&mut md, record);
            }
        }

        if !self.searches.is_empty() {
            md.push_str("## 🔍 Searches\n\n");
            for record in &self.searches {
                write_search(&mut md, record);
            }
        }

        md
    }

    /// Write the session as Markdown to `path`, creating parent directories.
    pub fn export(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_markdown())?;
        tracing::info!(path = %path.display(), "session exported");
        Ok(())
    }
}

/// `bible_study_<timestamp>.md`
pub fn default_export_filename(now: DateTime<Local>) -> String {
    format!("bible_study_{}.md", now.format("%Y%m%d_%H%M%S"))
}

/// Where an export goes: the user's filename (with `.md` ensured) or a
/// timestamped name in `export_dir`.
pub fn resolve_export_path(export_dir: &Path, filename: Option<&str>, now: DateTime<Local>) -> PathBuf {
    match filename.map(str::trim).filter(|f| !f.is_empty()) {
        Some(name) => {
            let path = PathBuf::from(name);
            if path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("md")) {
                path
            } else {
                PathBuf::from(format!("{}.md", name))
            }
        }
        None => export_dir.join(default_export_filename(now)),
    }
}

fn write_verse(md: &mut String, verse: &Verse) {
    let _ = writeln!(md, "> {}\n", verse.text);
    let _ = writeln!(md, "**Reference**: {}  ", verse.reference);
    let _ = writeln!(md, "**Translation**: {}", verse.translation);
    if !verse.tags.is_empty() {
        let tags: Vec<&str> = verse.tags.iter().map(String::as_str).collect();
        let _ = writeln!(md, "**Tags**: {}", tags.join(", "));
    }
    if verse.is_favorite {
        md.push_str("**★ Favorite**\n");
    }
    md.push_str("\n---\n\n");
}

fn write_teaching(md: &mut String, record: &TeachingRecord) {
    let _ = writeln!(md, "### {}: {}\n", record.kind.display_name(), record.subject);
    let _ = writeln!(md, "{}\n", record.content.trim());
    write_sources(md, "References", &record.references);
    let _ = writeln!(
        md,
        "*Generated using {} at {}*\n",
        record.backend.display_name(),
        record.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    md.push_str("---\n\n");
}

fn write_search(md: &mut String, record: &SearchRecord) {
    let _ = writeln!(md, "### Biblical Insights: \"{}\"\n", record.query);
    md.push_str("#### AI Analysis\n\n");
    let _ = writeln!(md, "{}\n", record.analysis.trim());
    write_sources(md, "Online Sources", &record.sources);
    if !record.related_verses.is_empty() {
        md.push_str("#### Related Verses\n\n");
        for reference in &record.related_verses {
            let _ = writeln!(md, "- {}", reference);
        }
        md.push('\n');
    }
    let _ = writeln!(
        md,
        "*Generated using {} at {}*\n",
        record.backend.display_name(),
        record.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    md.push_str("---\n\n");
}

fn write_sources(md: &mut String, heading: &str, sources: &[SearchResult]) {
    if sources.is_empty() {
        return;
    }
    let _ = writeln!(md, "#### {}\n", heading);
    for source in sources {
        let _ = writeln!(md, "- [{}]({})", source.title, source.link);
    }
    md.push('\n');
}
