//! Prompt templates for each study task.

use crate::search::SearchResult;
use crate::verse::Verse;

const PERSONA: &str = "You are a biblical scholar and spiritual guide.";

pub fn teaching(topic: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        return format!(
            "{PERSONA}\n\nShare an important teaching of Jesus. Explain what He taught, \
             quote the key passages with their references, and describe how it applies today."
        );
    }
    format!(
        "{PERSONA}\n\nWhat did Jesus teach about {topic}?\n\n\
         Explain the teaching, quote the key passages with their references, \
         and describe how it applies to daily life."
    )
}

pub fn search_insights(query: &str, sources: &[SearchResult]) -> String {
    let mut prompt = format!(
        "{PERSONA}\n\nBased on these sources, provide biblical insights about {query}.\n\n"
    );

    if sources.is_empty() {
        prompt.push_str("No online sources were found; answer from Scripture alone.\n");
    } else {
        prompt.push_str("Sources:\n");
        for source in sources {
            prompt.push_str(&format!("- {}: {}\n", source.title, source.snippet));
        }
    }

    prompt.push_str(
        "\nGive a theological analysis, the key points, and the most relevant Bible references.",
    );
    prompt
}

pub fn analysis(passage: &str, text: Option<&str>) -> String {
    match text {
        Some(text) => format!(
            "{PERSONA}\n\nAnalyze this Bible passage and provide insights.\n\n\
             {passage}: {text}\n\n\
             Cover its historical context, key themes, and meaning for readers today."
        ),
        None => format!(
            "{PERSONA}\n\nAnalyze this biblical text and provide insights.\n\n\
             {passage}\n\n\
             Cover its context, key themes, and meaning for readers today."
        ),
    }
}

pub fn reflection_on_topic(topic: &str) -> String {
    format!(
        "{PERSONA}\n\nWrite a short devotional reflection on {topic}, \
         grounded in Scripture, ending with a question for personal meditation."
    )
}

pub fn reflection_on_verse(verse: &Verse) -> String {
    format!(
        "{PERSONA}\n\nProvide a deep spiritual reflection on this verse: {} ({})\n\n\
         Keep it to a few paragraphs and end with a question for personal meditation.",
        verse.text, verse.reference
    )
}

pub fn daily_thought(verse: &Verse) -> String {
    format!(
        "{PERSONA}\n\nIn two or three sentences, offer an encouraging thought for today \
         based on {}: \"{}\"",
        verse.reference, verse.text
    )
}

pub fn related_verses(topic: &str) -> String {
    format!(
        "{PERSONA}\n\nList 3 relevant Bible verses about {topic}. \
         Put each reference on its own line with no other text."
    )
}
