use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BackendError, GenerationError, LlmBackend};
use crate::config::Config;
use crate::provider::Backend;

#[derive(Serialize)]
struct DecodingOptions {
    temperature: f32,
    repeat_penalty: f32,
    repeat_last_n: i32,
    num_predict: i32,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: DecodingOptions,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

/// Generation through a model served by a local Ollama daemon.
#[derive(Clone)]
pub struct LocalClient {
    client: Client,
    base_url: String,
    model: String,
    /// Bounds the model listing only.
    probe_timeout: Duration,
}

impl LocalClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            // Local generation has no timeout; a slow model is allowed to finish.
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            probe_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Build a client and make sure the daemon is up and the model is pulled.
    pub async fn connect(config: &Config) -> Result<Self, BackendError> {
        let client = Self::new(&config.local_llm_url, &config.local_model_id)
            .with_probe_timeout(config.http_timeout());

        let models = client.list_models().await.map_err(|e| BackendError::Unreachable {
            backend: Backend::Local,
            message: format!("{}. Make sure Ollama is running with: ollama serve", e),
        })?;

        if !has_model(&models, &client.model) {
            return Err(BackendError::ModelNotFound {
                backend: Backend::Local,
                model: client.model.clone(),
            });
        }

        tracing::info!(model = %client.model, "local model ready");
        Ok(client)
    }

    pub async fn query(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: DecodingOptions {
                temperature: 0.7,
                repeat_penalty: 1.3,
                repeat_last_n: 3,
                num_predict: 512,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Request {
                backend: Backend::Local,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GenerationError::Request {
                backend: Backend::Local,
                message: format!("Ollama request failed with status: {}", response.status()),
            });
        }

        let ollama_response: OllamaResponse =
            response.json().await.map_err(|e| GenerationError::Request {
                backend: Backend::Local,
                message: e.to_string(),
            })?;

        let continuation = strip_prompt(prompt, &ollama_response.response);
        if continuation.is_empty() {
            return Err(GenerationError::Empty { backend: Backend::Local });
        }
        Ok(continuation.to_string())
    }

    pub async fn list_models(&self) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }
}

/// Ollama reports tags like `phi:latest`; a bare name matches its `latest` tag.
fn has_model(models: &[String], name: &str) -> bool {
    models
        .iter()
        .any(|m| m == name || (!name.contains(':') && m == &format!("{}:latest", name)))
}

/// Drop an echoed copy of the prompt from the start of the output.
fn strip_prompt<'a>(prompt: &str, output: &'a str) -> &'a str {
    output
        .strip_prefix(prompt)
        .or_else(|| output.trim_start().strip_prefix(prompt.trim()))
        .unwrap_or(output)
        .trim()
}

#[async_trait]
impl LlmBackend for LocalClient {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.query(prompt).await
    }
}
