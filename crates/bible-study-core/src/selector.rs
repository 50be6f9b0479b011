//! Backend selection and fallback.
//!
//! Each backend gets a blended score for a task:
//!
//! ```text
//! score = 0.35 * capability_match + 0.45 * performance + 0.20 * context_fit
//! ```
//!
//! Selection is deterministic for a given set of metrics. Ties go to the
//! backend declared first in [`Backend`].

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::ai::{BackendError, BackendFactory, HttpBackendFactory, LlmBackend};
use crate::config::Config;
use crate::provider::{Backend, Task};

/// Free-form inputs to a request (topic, passage text, ...). Only the total
/// size matters for scoring.
pub type SelectionContext = BTreeMap<String, String>;

pub const MAX_LATENCY_SAMPLES: usize = 100;

const CAPABILITY_WEIGHT: f64 = 0.35;
const PERFORMANCE_WEIGHT: f64 = 0.45;
const CONTEXT_WEIGHT: f64 = 0.20;

/// Fraction of the base weight granted for a task outside a backend's strengths.
const PARTIAL_CREDIT: f64 = 0.5;
const LATENCY_IMPORTANCE: f64 = 0.3;
/// Latency at which the latency term drops to one half.
const LATENCY_REFERENCE_SECS: f64 = 10.0;
/// Weight kept per step back in the latency window.
const LATENCY_DECAY: f64 = 0.9;
const NEUTRAL_SCORE: f64 = 0.5;
/// Below this, the safe default is chosen over the nominal best.
pub const SCORE_FLOOR: f64 = 0.40;
const CHARS_PER_TOKEN: usize = 4;

/// Rolling success and latency figures for one backend.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub success_count: u64,
    pub fail_count: u64,
    recent_latencies: VecDeque<f64>,
    pub last_used: Option<DateTime<Utc>>,
}

impl PerformanceMetrics {
    pub fn record(&mut self, success: bool, latency: Duration) {
        if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }

        self.recent_latencies.push_back(latency.as_secs_f64());
        while self.recent_latencies.len() > MAX_LATENCY_SAMPLES {
            self.recent_latencies.pop_front();
        }

        self.last_used = Some(Utc::now());
    }

    pub fn attempts(&self) -> u64 {
        self.success_count + self.fail_count
    }

    /// Ratio of successful attempts; 0.5 before the first attempt.
    pub fn success_rate(&self) -> f64 {
        match self.attempts() {
            0 => NEUTRAL_SCORE,
            n => self.success_count as f64 / n as f64,
        }
    }

    /// Latency samples in seconds, oldest first.
    pub fn recent_latencies(&self) -> &VecDeque<f64> {
        &self.recent_latencies
    }

    /// Average latency with older samples decaying geometrically.
    pub fn decayed_latency(&self) -> Option<f64> {
        if self.recent_latencies.is_empty() {
            return None;
        }

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        let mut weight = 1.0;
        for latency in self.recent_latencies.iter().rev() {
            weighted += latency * weight;
            total_weight += weight;
            weight *= LATENCY_DECAY;
        }

        Some(weighted / total_weight)
    }

    fn latency_score(&self) -> f64 {
        match self.decayed_latency() {
            Some(latency) => 1.0 / (1.0 + latency / LATENCY_REFERENCE_SECS),
            None => NEUTRAL_SCORE,
        }
    }

    pub fn performance_score(&self) -> f64 {
        self.success_rate() * (1.0 - LATENCY_IMPORTANCE) + self.latency_score() * LATENCY_IMPORTANCE
    }
}

/// Per-backend breakdown of a selection decision.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendScore {
    pub backend: Backend,
    pub capability: f64,
    pub performance: f64,
    pub context_fit: f64,
    pub total: f64,
    pub available: bool,
}

pub fn capability_match(backend: Backend, task: Task) -> f64 {
    if backend.strengths().contains(&task) {
        1.0
    } else {
        backend.base_weight(task) * PARTIAL_CREDIT
    }
}

/// 1.0 while the estimated input fits in half the backend's capacity, then
/// falling linearly to 0.0 at full capacity.
pub fn context_fit(backend: Backend, context: Option<&SelectionContext>) -> f64 {
    let chars: usize = context
        .map(|ctx| ctx.values().map(|v| v.chars().count()).sum())
        .unwrap_or(0);
    let tokens = (chars / CHARS_PER_TOKEN) as f64;
    let capacity = backend.max_tokens() as f64;
    let comfortable = capacity / 2.0;

    if tokens <= comfortable {
        1.0
    } else if tokens >= capacity {
        0.0
    } else {
        1.0 - (tokens - comfortable) / (capacity - comfortable)
    }
}

enum Slot {
    Ready(Arc<dyn LlmBackend>),
    Unavailable(BackendError),
}

/// Chooses a backend per task and keeps the process-lifetime backend instances.
pub struct ModelSelector {
    factory: Box<dyn BackendFactory>,
    metrics: HashMap<Backend, PerformanceMetrics>,
    instances: HashMap<Backend, Slot>,
}

impl ModelSelector {
    pub fn new(factory: Box<dyn BackendFactory>) -> Self {
        let metrics = Backend::all()
            .into_iter()
            .map(|backend| (backend, PerformanceMetrics::default()))
            .collect();

        Self {
            factory,
            metrics,
            instances: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Box::new(HttpBackendFactory::new(config.clone())))
    }

    /// False once construction of `backend` has failed.
    pub fn is_available(&self, backend: Backend) -> bool {
        !matches!(self.instances.get(&backend), Some(Slot::Unavailable(_)))
    }

    /// Why `backend` could not be constructed, if it could not.
    pub fn unavailable_reason(&self, backend: Backend) -> Option<&BackendError> {
        match self.instances.get(&backend) {
            Some(Slot::Unavailable(e)) => Some(e),
            _ => None,
        }
    }

    pub fn metrics(&self, backend: Backend) -> &PerformanceMetrics {
        // Every backend is seeded in `new`.
        &self.metrics[&backend]
    }

    /// Scores for every backend, in declaration order.
    pub fn scores(&self, task: Task, context: Option<&SelectionContext>) -> Vec<BackendScore> {
        Backend::all()
            .into_iter()
            .map(|backend| {
                let capability = capability_match(backend, task);
                let performance = self.metrics(backend).performance_score();
                let fit = context_fit(backend, context);
                BackendScore {
                    backend,
                    capability,
                    performance,
                    context_fit: fit,
                    total: capability * CAPABILITY_WEIGHT
                        + performance * PERFORMANCE_WEIGHT
                        + fit * CONTEXT_WEIGHT,
                    available: self.is_available(backend),
                }
            })
            .collect()
    }

    /// Pick a backend for `task`. Never fails.
    pub fn select(&self, task: Task, context: Option<&SelectionContext>) -> Backend {
        let mut best: Option<BackendScore> = None;
        for score in self.scores(task, context).into_iter().filter(|s| s.available) {
            // Strictly greater keeps the earlier backend on ties.
            if best.as_ref().map_or(true, |b| score.total > b.total) {
                best = Some(score);
            }
        }

        match best {
            Some(score) if score.total >= SCORE_FLOOR => {
                tracing::debug!(task = %task, backend = score.backend.as_str(), score = score.total, "backend selected");
                score.backend
            }
            Some(score) if self.is_available(Backend::SAFE_DEFAULT) => {
                tracing::debug!(
                    task = %task,
                    best = score.backend.as_str(),
                    score = score.total,
                    "no backend cleared the floor, using safe default"
                );
                Backend::SAFE_DEFAULT
            }
            // The safe default cannot be built; the best remaining backend is all there is.
            Some(score) => score.backend,
            None => Backend::SAFE_DEFAULT,
        }
    }

    /// The memoized instance for `backend`, constructing it on first use.
    /// A failed construction is remembered and never retried.
    pub async fn get_or_create(&mut self, backend: Backend) -> Result<Arc<dyn LlmBackend>, BackendError> {
        match self.instances.get(&backend) {
            Some(Slot::Ready(instance)) => return Ok(Arc::clone(instance)),
            Some(Slot::Unavailable(e)) => return Err(e.clone()),
            None => {}
        }

        match self.factory.create(backend).await {
            Ok(instance) => {
                tracing::info!(backend = backend.as_str(), model = instance.model(), "backend initialized");
                self.instances.insert(backend, Slot::Ready(Arc::clone(&instance)));
                Ok(instance)
            }
            Err(e) => {
                tracing::error!(backend = backend.as_str(), error = %e, "backend unavailable for this session");
                self.instances.insert(backend, Slot::Unavailable(e.clone()));
                Err(e)
            }
        }
    }

    /// Select a backend and get its instance, falling back to the safe
    /// default if the selected one cannot be constructed.
    pub async fn select_and_get(
        &mut self,
        task: Task,
        context: Option<&SelectionContext>,
    ) -> Option<(Backend, Arc<dyn LlmBackend>)> {
        let selected = self.select(task, context);
        if let Ok(instance) = self.get_or_create(selected).await {
            return Some((selected, instance));
        }

        if selected == Backend::SAFE_DEFAULT {
            return None;
        }

        self.get_or_create(Backend::SAFE_DEFAULT)
            .await
            .ok()
            .map(|instance| (Backend::SAFE_DEFAULT, instance))
    }

    pub fn update_performance(&mut self, backend: Backend, success: bool, latency: Duration) {
        self.metrics.entry(backend).or_default().record(success, latency);
    }

    /// `first`, then every other backend in declaration order.
    pub fn fallback_order(first: Backend) -> Vec<Backend> {
        std::iter::once(first)
            .chain(Backend::all().into_iter().filter(|b| *b != first))
            .collect()
    }
}
