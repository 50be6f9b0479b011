use colored::*;
use std::fmt::Display;
use std::path::Path;

use bible_study_core::search::SearchResult;
use bible_study_core::{
    Analysis, Backend, DailyVerse, ModelSelector, Reflection, SearchInsight, Task, Teaching, Verse,
};

use crate::commands::HELP;

pub fn print_welcome() {
    println!("\n{}", "📖 Bible Study Assistant".bold().blue());
    println!("{}", "=".repeat(40).dimmed());
    println!("Type {} for commands, {} to leave.\n", "help".bold(), "quit".bold());
}

pub fn print_help() {
    println!("\n{}", "Commands".bold().blue());
    for (usage, description) in HELP {
        println!("  {:<24} {}", usage.green(), description);
    }
    println!();
}

pub fn print_verse(verse: &Verse) {
    println!("\n{}", verse.text.italic());
    println!("  {} {}", verse.reference.bold().yellow(), format!("({})", verse.translation).dimmed());
}

/// The current verse with its favorite mark and tags.
pub fn print_verse_annotations(verse: &Verse) {
    let star = if verse.is_favorite { "★ ".yellow() } else { "".normal() };
    println!("{}{}", star, verse.reference.bold());
    if verse.tags.is_empty() {
        println!("  {}", "no tags".dimmed());
    } else {
        let tags: Vec<&str> = verse.tags.iter().map(String::as_str).collect();
        println!("  tags: {}", tags.join(", ").green());
    }
}

pub fn print_daily_verse(daily: &DailyVerse) {
    println!("\n{}", "📖 Verse of the Day".bold().green());
    print_verse(&daily.verse);
    match (&daily.thought, daily.backend) {
        (Some(thought), Some(backend)) => {
            println!("\n{}", "💭 Thought".bold().blue());
            println!("{}", thought.trim());
            print_backend(backend);
        }
        _ => println!("\n{}", "No devotional thought available right now.".dimmed()),
    }
}

pub fn print_teaching(teaching: &Teaching) {
    println!("\n{}", format!("🎯 Teaching: {}", teaching.topic).bold().green());
    println!("{}", teaching.content.trim());
    print_sources("References", &teaching.references);
    print_backend(teaching.backend);
}

pub fn print_search_insight(insight: &SearchInsight) {
    println!("\n{}", format!("🔍 Insights: {}", insight.query).bold().green());
    println!("{}", insight.analysis.trim());
    print_sources("Sources", &insight.sources);
    if !insight.related_verses.is_empty() {
        println!("\n{}", "Related Verses".bold().blue());
        for reference in &insight.related_verses {
            println!("• {}", reference.yellow());
        }
    }
    print_backend(insight.backend);
}

pub fn print_analysis(analysis: &Analysis) {
    println!("\n{}", format!("📜 Analysis: {}", analysis.passage).bold().green());
    if let Some(verse) = &analysis.verse {
        print_verse(verse);
        println!();
    }
    println!("{}", analysis.content.trim());
    print_backend(analysis.backend);
}

pub fn print_reflection(reflection: &Reflection) {
    println!("\n{}", format!("🙏 Reflection: {}", reflection.subject).bold().green());
    if let Some(verse) = &reflection.verse {
        print_verse(verse);
        println!();
    }
    println!("{}", reflection.content.trim());
    print_backend(reflection.backend);
}

pub fn print_stats(selector: &ModelSelector) {
    println!("\n{}", "🤖 Model Selection".bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    for backend in Backend::all() {
        let metrics = selector.metrics(backend);
        let status = if selector.is_available(backend) {
            "available".green()
        } else {
            "unavailable".red()
        };
        println!("\n{} [{}]", backend.display_name().bold(), status);
        if let Some(reason) = selector.unavailable_reason(backend) {
            println!("  {}", reason.to_string().dimmed());
        }
        println!(
            "  successes {}  failures {}  success rate {:.2}",
            metrics.success_count, metrics.fail_count, metrics.success_rate()
        );
        if let Some(latency) = metrics.decayed_latency() {
            println!("  latency {:.2}s", latency);
        }
    }

    println!("\n{}", "Scores by task".bold());
    for task in Task::all() {
        let chosen = selector.select(task, None);
        let scores: Vec<String> = selector
            .scores(task, None)
            .iter()
            .map(|s| format!("{} {:.3}", s.backend.as_str(), s.total))
            .collect();
        println!(
            "  {:<12} {}  -> {}",
            task.display_name(),
            scores.join("  ").dimmed(),
            chosen.as_str().yellow()
        );
    }
    println!();
}

pub fn print_exported(path: &Path) {
    println!("{} {}", "✅ Session exported to".green(), path.display().to_string().bold());
}

pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

pub fn print_error(error: &dyn Display) {
    println!("{}: {}", "Error".red(), error);
}

fn print_sources(heading: &str, sources: &[SearchResult]) {
    if sources.is_empty() {
        return;
    }
    println!("\n{}", heading.bold().blue());
    for source in sources {
        println!("• {} {}", source.title.yellow(), source.link.dimmed());
    }
}

fn print_backend(backend: Backend) {
    println!("\n{}", format!("Generated using {}", backend.display_name()).dimmed());
}
