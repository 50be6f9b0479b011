//! Parsing of interactive commands.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Verse,
    Teach(String),
    Search(String),
    Reflect(String),
    Analyze(String),
    Export(Option<String>),
    /// Mark (`true`) or unmark the current verse as a favorite.
    Favorite(bool),
    Tag(String),
    Untag(String),
    Stats,
    Help,
    Quit,
    Empty,
    /// Unknown command word.
    Unknown(String),
    /// Known command missing its required argument.
    MissingArgument { command: &'static str, argument: &'static str },
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match word.to_lowercase().as_str() {
            "verse" | "v" => Command::Verse,
            "teach" | "t" => match arg {
                Some(topic) => Command::Teach(topic),
                None => Command::MissingArgument { command: "teach", argument: "topic" },
            },
            "search" | "s" => match arg {
                Some(query) => Command::Search(query),
                None => Command::MissingArgument { command: "search", argument: "query" },
            },
            "reflect" | "r" => Command::Reflect(rest.to_string()),
            "analyze" | "a" => match arg {
                Some(passage) => Command::Analyze(passage),
                None => Command::MissingArgument { command: "analyze", argument: "passage" },
            },
            "export" | "e" => Command::Export(arg),
            "favorite" | "f" => Command::Favorite(true),
            "unfavorite" => Command::Favorite(false),
            "tag" => match arg {
                Some(tag) => Command::Tag(tag),
                None => Command::MissingArgument { command: "tag", argument: "word" },
            },
            "untag" => match arg {
                Some(tag) => Command::Untag(tag),
                None => Command::MissingArgument { command: "untag", argument: "word" },
            },
            "stats" => Command::Stats,
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

pub const HELP: &[(&str, &str)] = &[
    ("verse, v", "Today's verse with a devotional thought"),
    ("teach, t <topic>", "What Jesus taught about a topic"),
    ("search, s <query>", "Web search with biblical insights"),
    ("reflect, r [topic]", "Reflect on a topic, or on the current verse"),
    ("analyze, a <passage>", "Analyze a passage or reference"),
    ("export, e [filename]", "Save the session as Markdown"),
    ("favorite, f", "Mark the current verse as a favorite"),
    ("unfavorite", "Remove the current verse from favorites"),
    ("tag <word>", "Tag the current verse"),
    ("untag <word>", "Remove a tag from the current verse"),
    ("stats", "Model selection scores and metrics"),
    ("help, h", "Show this help"),
    ("quit, q", "Leave the study session"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Command::parse("v"), Command::Verse);
        assert_eq!(Command::parse("VERSE"), Command::Verse);
        assert_eq!(Command::parse("t forgiveness"), Command::Teach("forgiveness".into()));
        assert_eq!(Command::parse("s  grace of God "), Command::Search("grace of God".into()));
        assert_eq!(Command::parse("a John 3:16"), Command::Analyze("John 3:16".into()));
        assert_eq!(Command::parse("h"), Command::Help);
        assert_eq!(Command::parse("q"), Command::Quit);
        assert_eq!(Command::parse("stats"), Command::Stats);
    }

    #[test]
    fn test_parse_optional_arguments() {
        assert_eq!(Command::parse("reflect"), Command::Reflect(String::new()));
        assert_eq!(Command::parse("r patience"), Command::Reflect("patience".into()));
        assert_eq!(Command::parse("e"), Command::Export(None));
        assert_eq!(Command::parse("export notes"), Command::Export(Some("notes".into())));
    }

    #[test]
    fn test_parse_verse_annotations() {
        assert_eq!(Command::parse("f"), Command::Favorite(true));
        assert_eq!(Command::parse("unfavorite"), Command::Favorite(false));
        assert_eq!(Command::parse("tag hope"), Command::Tag("hope".into()));
        assert_eq!(Command::parse("untag hope"), Command::Untag("hope".into()));
        assert_eq!(
            Command::parse("tag"),
            Command::MissingArgument { command: "tag", argument: "word" }
        );
    }

    #[test]
    fn test_parse_missing_and_unknown() {
        assert_eq!(
            Command::parse("teach"),
            Command::MissingArgument { command: "teach", argument: "topic" }
        );
        assert_eq!(Command::parse("pray now"), Command::Unknown("pray".into()));
        assert_eq!(Command::parse("   "), Command::Empty);
    }
}
