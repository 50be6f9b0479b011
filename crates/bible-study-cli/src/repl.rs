use anyhow::Result;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input};

use bible_study_core::Agent;

use crate::commands::Command;
use crate::display;

/// Interactive study loop. Command failures are printed and the loop
/// continues; only a broken terminal ends it with an error.
pub async fn run(agent: &mut Agent) -> Result<()> {
    display::print_welcome();
    let theme = ColorfulTheme::default();

    loop {
        let line: String = Input::with_theme(&theme)
            .with_prompt("📖")
            .allow_empty(true)
            .interact_text()?;

        let command = Command::parse(&line);
        tracing::debug!(?command, "repl command");

        match command {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => display::print_help(),
            Command::Verse => {
                let daily = agent.daily_verse().await;
                display::print_daily_verse(&daily);
            }
            Command::Teach(topic) => match agent.teach(&topic).await {
                Ok(teaching) => display::print_teaching(&teaching),
                Err(e) => display::print_error(&e),
            },
            Command::Search(query) => match agent.search_insights(&query).await {
                Ok(insight) => display::print_search_insight(&insight),
                Err(e) => display::print_error(&e),
            },
            Command::Reflect(topic) => match agent.reflect(&topic).await {
                Ok(reflection) => display::print_reflection(&reflection),
                Err(e) => display::print_error(&e),
            },
            Command::Analyze(passage) => match agent.analyze(&passage).await {
                Ok(analysis) => display::print_analysis(&analysis),
                Err(e) => display::print_error(&e),
            },
            Command::Export(filename) => {
                if agent.session().is_empty() {
                    display::print_warning("Nothing to export yet.");
                    continue;
                }
                match agent.export(filename.as_deref()) {
                    Ok(path) => display::print_exported(&path),
                    Err(e) => display::print_error(&e),
                }
            }
            Command::Favorite(favorite) => match agent.favorite_current_verse(favorite) {
                Ok(verse) => display::print_verse_annotations(verse),
                Err(e) => display::print_error(&e),
            },
            Command::Tag(tag) => match agent.tag_current_verse(&tag, true) {
                Ok((_, verse)) => display::print_verse_annotations(verse),
                Err(e) => display::print_error(&e),
            },
            Command::Untag(tag) => match agent.tag_current_verse(&tag, false) {
                Ok((true, verse)) => display::print_verse_annotations(verse),
                Ok((false, _)) => display::print_warning(&format!("The current verse has no tag '{}'.", tag)),
                Err(e) => display::print_error(&e),
            },
            Command::Stats => display::print_stats(agent.selector()),
            Command::MissingArgument { command, argument } => {
                display::print_warning(&format!("Usage: {} <{}>", command, argument));
            }
            Command::Unknown(word) => {
                display::print_warning(&format!(
                    "Unknown command '{}'. Type {} for the list of commands.",
                    word, "help"
                ));
            }
        }
    }

    println!("{}", "God bless your study! 🙏".bold().blue());
    Ok(())
}
