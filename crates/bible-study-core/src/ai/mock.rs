//! Scripted backends for selector and agent tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::{BackendError, BackendFactory, GenerationError, LlmBackend};
use crate::provider::Backend;

#[derive(Default)]
struct Shared {
    constructions: HashMap<Backend, usize>,
    prompts: Vec<(Backend, String)>,
}

/// Factory whose backends either echo a canned answer or fail.
#[derive(Clone, Default)]
pub struct MockFactory {
    unconstructible: HashSet<Backend>,
    failing: HashSet<Backend>,
    shared: Arc<Mutex<Shared>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construction of `backend` fails.
    pub fn unconstructible(mut self, backend: Backend) -> Self {
        self.unconstructible.insert(backend);
        self
    }

    /// Every generation on `backend` fails.
    pub fn failing(mut self, backend: Backend) -> Self {
        self.failing.insert(backend);
        self
    }

    pub fn constructions(&self, backend: Backend) -> usize {
        let shared = self.shared.lock().unwrap();
        shared.constructions.get(&backend).copied().unwrap_or(0)
    }

    /// Backends called, in call order.
    pub fn calls(&self) -> Vec<Backend> {
        let shared = self.shared.lock().unwrap();
        shared.prompts.iter().map(|(b, _)| *b).collect()
    }

    pub fn prompts(&self) -> Vec<String> {
        let shared = self.shared.lock().unwrap();
        shared.prompts.iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl BackendFactory for MockFactory {
    async fn create(&self, backend: Backend) -> Result<Arc<dyn LlmBackend>, BackendError> {
        *self
            .shared
            .lock()
            .unwrap()
            .constructions
            .entry(backend)
            .or_insert(0) += 1;

        if self.unconstructible.contains(&backend) {
            return Err(BackendError::Unreachable {
                backend,
                message: "mock construction failure".to_string(),
            });
        }

        Ok(Arc::new(MockBackend {
            backend,
            fails: self.failing.contains(&backend),
            shared: Arc::clone(&self.shared),
        }))
    }
}

pub struct MockBackend {
    backend: Backend,
    fails: bool,
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.shared
            .lock()
            .unwrap()
            .prompts
            .push((self.backend, prompt.to_string()));

        if self.fails {
            return Err(GenerationError::Empty { backend: self.backend });
        }
        Ok(format!("{} answer\n- Romans 5:1\n- Hebrews 11:1\n- James 2:17", self.backend.as_str()))
    }
}
