use serde::{Deserialize, Serialize};
use std::fmt;

/// The functional category of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Search,
    Teaching,
    Analysis,
    Reflection,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Search => "search",
            Task::Teaching => "teaching",
            Task::Analysis => "analysis",
            Task::Reflection => "reflection",
        }
    }

    pub fn all() -> Vec<Task> {
        vec![Task::Search, Task::Teaching, Task::Analysis, Task::Reflection]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Task::Search => "Search",
            Task::Teaching => "Teaching",
            Task::Analysis => "Analysis",
            Task::Reflection => "Reflection",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete text-generation provider.
///
/// Declaration order is significant: it breaks selection ties and is the
/// order in which fallback walks the remaining backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Hosted,
    Local,
}

impl Backend {
    /// Returned when no candidate clears the selection floor.
    pub const SAFE_DEFAULT: Backend = Backend::Local;

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Hosted => "hosted",
            Backend::Local => "local",
        }
    }

    pub fn all() -> Vec<Backend> {
        vec![Backend::Hosted, Backend::Local]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Hosted => "Gemini (Hosted)",
            Backend::Local => "Local Model (Ollama)",
        }
    }

    /// Static preference weight of this backend for a task.
    pub fn base_weight(&self, task: Task) -> f64 {
        match (self, task) {
            (Backend::Hosted, Task::Search) => 0.7,
            (Backend::Hosted, Task::Teaching) => 0.8,
            (Backend::Hosted, Task::Analysis) => 0.7,
            (Backend::Hosted, Task::Reflection) => 0.9,
            (Backend::Local, Task::Search) => 0.8,
            (Backend::Local, Task::Teaching) => 0.7,
            (Backend::Local, Task::Analysis) => 0.9,
            (Backend::Local, Task::Reflection) => 0.6,
        }
    }

    /// Tasks this backend declares as strengths.
    pub fn strengths(&self) -> &'static [Task] {
        match self {
            Backend::Hosted => &[Task::Teaching, Task::Reflection],
            Backend::Local => &[Task::Search, Task::Analysis],
        }
    }

    /// Rough input capacity in tokens.
    pub fn max_tokens(&self) -> usize {
        match self {
            Backend::Hosted => 30_720,
            Backend::Local => 2_048,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strengths_match_highest_weights() {
        for backend in Backend::all() {
            for task in backend.strengths() {
                assert!(backend.base_weight(*task) >= 0.8);
            }
        }
    }

    #[test]
    fn test_enumeration_order() {
        assert!(Backend::Hosted < Backend::Local);
        assert_eq!(Backend::all(), vec![Backend::Hosted, Backend::Local]);
    }
}
