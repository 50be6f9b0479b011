use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bible_study_core::{Agent, Config};

mod commands;
mod display;
mod repl;

#[derive(Parser)]
#[command(name = "bible-study")]
#[command(version, about = "Bible study assistant with hosted and local language models")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's verse with a short devotional thought
    Verse {
        /// Export the session to this file afterwards
        #[arg(short, long)]
        export: Option<String>,
    },
    /// Learn what Jesus taught about a topic
    Teach {
        topic: String,
        #[arg(short, long)]
        export: Option<String>,
    },
    /// Search the web for biblical insights
    Search {
        query: String,
        #[arg(short, long)]
        export: Option<String>,
    },
    /// Analyze a passage or reference
    Analyze {
        passage: String,
        #[arg(short, long)]
        export: Option<String>,
    },
    /// Reflect on a topic or verse (defaults to the current verse)
    Reflect {
        topic: Option<String>,
        #[arg(short, long)]
        export: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", "Failed to load configuration".red(), e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, config).await {
        eprintln!("{}: {:#}", "Error".red(), e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let mut agent = Agent::new(config);

    match cli.command {
        Some(command) => {
            run_once(&mut agent, command).await;
            Ok(())
        }
        None => repl::run(&mut agent).await,
    }
}

/// Run one subcommand, then export if asked. Failures are reported, not
/// fatal: only startup exits non-zero. Returns the exported path.
async fn run_once(agent: &mut Agent, command: Commands) -> Option<PathBuf> {
    let export = match command {
        Commands::Verse { export } => {
            let daily = agent.daily_verse().await;
            display::print_daily_verse(&daily);
            export
        }
        Commands::Teach { topic, export } => {
            match agent.teach(&topic).await {
                Ok(teaching) => display::print_teaching(&teaching),
                Err(e) => display::print_error(&e),
            }
            export
        }
        Commands::Search { query, export } => {
            match agent.search_insights(&query).await {
                Ok(insight) => display::print_search_insight(&insight),
                Err(e) => display::print_error(&e),
            }
            export
        }
        Commands::Analyze { passage, export } => {
            match agent.analyze(&passage).await {
                Ok(analysis) => display::print_analysis(&analysis),
                Err(e) => display::print_error(&e),
            }
            export
        }
        Commands::Reflect { topic, export } => {
            match agent.reflect(topic.as_deref().unwrap_or("")).await {
                Ok(reflection) => display::print_reflection(&reflection),
                Err(e) => display::print_error(&e),
            }
            export
        }
    };

    let filename = export?;
    match agent.export(Some(&filename)) {
        Ok(path) => {
            display::print_exported(&path);
            Some(path)
        }
        Err(e) => {
            display::print_error(&e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bible_study_core::ai::{BackendError, BackendFactory, GenerationError, LlmBackend};
    use bible_study_core::search::RetryPolicy;
    use bible_study_core::{Backend, ModelSelector, SearchClient, VerseSource};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    // Nothing listens on the discard port, so scripture and search calls fail fast.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    struct CannedBackend(Backend);

    #[async_trait]
    impl LlmBackend for CannedBackend {
        fn backend(&self) -> Backend {
            self.0
        }

        fn model(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("Grace abounds.\n- Romans 5:20".to_string())
        }
    }

    struct CannedFactory;

    #[async_trait]
    impl BackendFactory for CannedFactory {
        async fn create(&self, backend: Backend) -> Result<Arc<dyn LlmBackend>, BackendError> {
            Ok(Arc::new(CannedBackend(backend)))
        }
    }

    fn agent() -> Agent {
        let search = SearchClient::new("k", UNREACHABLE).with_retry_policy(RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
        });
        Agent::with_parts(
            Config::new(),
            VerseSource::new(UNREACHABLE, "kjv"),
            search,
            ModelSelector::new(Box::new(CannedFactory)),
        )
    }

    #[tokio::test]
    async fn test_teach_with_export_writes_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("grace");
        let mut agent = agent();

        let path = run_once(
            &mut agent,
            Commands::Teach {
                topic: "grace".to_string(),
                export: Some(target.to_string_lossy().into_owned()),
            },
        )
        .await
        .unwrap();

        assert_eq!(path, dir.path().join("grace.md"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("### Teaching: grace"));
        assert!(contents.contains("Grace abounds."));
    }

    #[tokio::test]
    async fn test_failed_search_still_exports() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("empty.md");
        let mut agent = agent();

        let path = run_once(
            &mut agent,
            Commands::Search {
                query: "mercy".to_string(),
                export: Some(target.to_string_lossy().into_owned()),
            },
        )
        .await
        .unwrap();

        assert!(agent.session().searches.is_empty());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Nothing recorded"));
    }

    #[tokio::test]
    async fn test_verse_without_export() {
        let mut agent = agent();
        let exported = run_once(&mut agent, Commands::Verse { export: None }).await;

        assert!(exported.is_none());
        // The scripture API is unreachable, so the fallback verse is used.
        assert!(agent.session().current_verse().unwrap().is_fallback());
        assert_eq!(agent.session().teachings.len(), 1);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["bible-study", "reflect", "--export", "notes"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Reflect { topic: None, export: Some(ref f) }) if f == "notes"
        ));

        let cli = Cli::try_parse_from(["bible-study"]).unwrap();
        assert!(cli.command.is_none());
    }
}
