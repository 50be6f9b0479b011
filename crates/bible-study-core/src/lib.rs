pub mod agent;
pub mod ai;
pub mod config;
pub mod prompts;
pub mod provider;
pub mod search;
pub mod selector;
pub mod session;
pub mod verse;

// Re-export main types for convenience
pub use agent::{Agent, AgentError, Analysis, DailyVerse, Reflection, SearchInsight, Teaching};
pub use ai::{GeminiClient, LlmBackend, LocalClient};
pub use config::Config;
pub use provider::{Backend, Task};
pub use search::{SearchClient, SearchError, SearchResult};
pub use selector::{BackendScore, ModelSelector, PerformanceMetrics, SelectionContext};
pub use session::StudySession;
pub use verse::{Verse, VerseSource};
