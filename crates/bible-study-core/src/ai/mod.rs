pub mod gemini;
pub mod local;
#[cfg(test)]
pub(crate) mod mock;

pub use gemini::GeminiClient;
pub use local::LocalClient;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::provider::Backend;

/// A generation attempt that produced nothing usable.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Request to {backend} failed: {message}")]
    Request { backend: Backend, message: String },

    #[error("{backend} returned no text")]
    Empty { backend: Backend },

    #[error("{backend} blocked the response: {reason}")]
    Blocked { backend: Backend, reason: String },
}

/// A backend that could not be constructed. The backend stays unavailable
/// for the rest of the run.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("{backend} is not configured: missing {setting}")]
    MissingCredentials { backend: Backend, setting: &'static str },

    #[error("{backend} is unreachable: {message}")]
    Unreachable { backend: Backend, message: String },

    #[error("Model {model} is not available on {backend}")]
    ModelNotFound { backend: Backend, model: String },
}

/// A text-generation provider. Each call is an independent prompt.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    fn backend(&self) -> Backend;

    /// Model identifier, for display.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Builds backend instances from the enum. Construction may be slow.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn create(&self, backend: Backend) -> Result<Arc<dyn LlmBackend>, BackendError>;
}

/// Builds the real HTTP clients from configuration.
pub struct HttpBackendFactory {
    config: Config,
}

impl HttpBackendFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BackendFactory for HttpBackendFactory {
    async fn create(&self, backend: Backend) -> Result<Arc<dyn LlmBackend>, BackendError> {
        match backend {
            Backend::Hosted => {
                let client = GeminiClient::from_config(&self.config)?;
                Ok(Arc::new(client))
            }
            Backend::Local => {
                let client = LocalClient::connect(&self.config).await?;
                Ok(Arc::new(client))
            }
        }
    }
}
