//! Central adaptive testing engine.
//!
//! Serves the two inbound operations, `next_question` and `submit`, by
//! wiring the pure selector, estimator and finalizer to the collaborators.
//! All checks that can reject a request run before the first write.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CatError, StoreError};
use crate::estimation::{AbilityEstimator, EstimationMethod, EstimatorConfig};
use crate::model::{
    AbilityKey, Choice, Item, Observation, Response, ResponseEvent, SessionResult,
};
use crate::selection::{ItemSelector, DEFAULT_TOP_K};
use crate::session::{finalize, validate_alpha, DEFAULT_SMOOTHING_ALPHA};
use crate::traits::{AbilityStore, EventLog, ItemPool, ResultStore};

/// Configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the randomization band in item selection.
    pub top_k: usize,
    /// Smoothing weight used when a submission does not name one.
    pub smoothing_alpha: f64,
    /// Seed for item selection. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Attempts at the read-blend-write cycle before giving up on a contended key.
    pub max_swap_attempts: u32,
    pub estimator: EstimatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
            seed: None,
            max_swap_attempts: 5,
            estimator: EstimatorConfig::default(),
        }
    }
}

/// The collaborators the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub pool: Arc<dyn ItemPool>,
    pub abilities: Arc<dyn AbilityStore>,
    pub events: Arc<dyn EventLog>,
    pub results: Arc<dyn ResultStore>,
}

/// Request for the next item of a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextQuestionRequest {
    pub examinee_id: String,
    pub course_id: String,
    pub assignment_id: String,
    /// Items answered so far, in answer order.
    #[serde(default)]
    pub answered_item_ids: Vec<String>,
    /// Responses aligned with `answered_item_ids`; the last entry is the
    /// response just given. Empty when no re-estimation is wanted.
    #[serde(default)]
    pub responses: Vec<Response>,
    /// Running estimate held by the client; overrides the stored ability.
    #[serde(default)]
    pub current_theta: Option<f64>,
}

/// The item to present next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextQuestion {
    pub item_id: String,
    pub content: String,
    pub choices: Vec<Choice>,
    /// Ability estimate after the responses carried by the request.
    pub temp_theta: f64,
}

/// Request to close a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub examinee_id: String,
    pub course_id: String,
    pub assignment_id: String,
    pub answered_item_ids: Vec<String>,
    pub responses: Vec<Response>,
    #[serde(default = "default_alpha")]
    pub smoothing_alpha: f64,
}

fn default_alpha() -> f64 {
    DEFAULT_SMOOTHING_ALPHA
}

/// Outcome of a submitted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub result_id: Uuid,
    pub final_theta: f64,
    pub updated_stored_theta: f64,
    pub correct_count: usize,
    pub total_count: usize,
    pub method: EstimationMethod,
}

/// The adaptive testing engine.
pub struct CatEngine {
    collaborators: Collaborators,
    selector: ItemSelector,
    estimator: AbilityEstimator,
    config: EngineConfig,
    rng: Mutex<Pcg64>,
}

impl CatEngine {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_entropy(),
        };
        Self {
            collaborators,
            selector: ItemSelector::new(config.top_k),
            estimator: AbilityEstimator::new(config.estimator.clone()),
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn estimator(&self) -> &AbilityEstimator {
        &self.estimator
    }

    /// Re-estimate ability from the responses so far and pick the next item.
    pub async fn next_question(&self, request: &NextQuestionRequest) -> Result<NextQuestion, CatError> {
        require_id("examinee_id", &request.examinee_id)?;
        require_id("course_id", &request.course_id)?;
        require_id("assignment_id", &request.assignment_id)?;
        if !request.responses.is_empty()
            && request.responses.len() != request.answered_item_ids.len()
        {
            return Err(CatError::validation(format!(
                "responses ({}) must match answered_item_ids ({})",
                request.responses.len(),
                request.answered_item_ids.len()
            )));
        }
        if let Some(theta) = request.current_theta {
            require_finite("current_theta", theta)?;
        }

        let key = AbilityKey::new(&request.examinee_id, &request.course_id);
        let items = self
            .collaborators
            .pool
            .items_for(&request.assignment_id)
            .await?;
        let stored = self.collaborators.abilities.load(&key).await?;

        let theta_before = request
            .current_theta
            .or(stored.as_ref().map(|s| s.theta))
            .unwrap_or(0.0);

        let mut theta = theta_before;
        if !request.responses.is_empty() {
            let history = build_history(&items, &request.answered_item_ids, &request.responses);
            theta = self.estimator.estimate(&history, theta_before).theta;
        }

        let answered: HashSet<&str> = request
            .answered_item_ids
            .iter()
            .map(String::as_str)
            .collect();
        let next = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            match self.selector.select_next(&items, &answered, theta, &mut *rng) {
                Ok(item) => item.clone(),
                Err(CatError::ExhaustedPool { .. }) => {
                    return Err(CatError::ExhaustedPool {
                        assignment_id: request.assignment_id.clone(),
                        theta,
                    });
                }
                Err(e) => return Err(e),
            }
        };

        if stored.is_none() {
            // first contact: create the row at 0.0; losing the race is fine
            self.collaborators
                .abilities
                .compare_and_swap(&key, None, 0.0)
                .await?;
        }

        // an answer to an item outside the pool was not scored; nothing to log
        let scored_last = request
            .answered_item_ids
            .last()
            .filter(|id| items.iter().any(|item| &item.id == *id));
        if let (Some(item_id), Some(&response)) = (scored_last, request.responses.last()) {
            let event = ResponseEvent {
                id: Uuid::new_v4(),
                examinee_id: request.examinee_id.clone(),
                course_id: request.course_id.clone(),
                assignment_id: request.assignment_id.clone(),
                item_id: item_id.clone(),
                response,
                ability_before: theta_before,
                ability_after: theta,
                recorded_at: chrono::Utc::now(),
            };
            self.collaborators.events.append(&event).await?;
        }

        tracing::debug!(
            examinee = %request.examinee_id,
            assignment = %request.assignment_id,
            item_id = %next.id,
            theta,
            "serving next item"
        );

        Ok(NextQuestion {
            item_id: next.id,
            content: next.content,
            choices: next.choices,
            temp_theta: theta,
        })
    }

    /// Finalize a session: estimate over all responses, smooth the stored
    /// ability and record the result.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitOutcome, CatError> {
        require_id("examinee_id", &request.examinee_id)?;
        require_id("course_id", &request.course_id)?;
        require_id("assignment_id", &request.assignment_id)?;
        if request.answered_item_ids.is_empty() {
            return Err(CatError::validation("answered_item_ids must not be empty"));
        }
        if request.answered_item_ids.len() != request.responses.len() {
            return Err(CatError::validation(format!(
                "answered_item_ids ({}) and responses ({}) must match length",
                request.answered_item_ids.len(),
                request.responses.len()
            )));
        }
        validate_alpha(request.smoothing_alpha)?;

        let items = self
            .collaborators
            .pool
            .items_for(&request.assignment_id)
            .await?;
        let history = build_history(&items, &request.answered_item_ids, &request.responses);
        if history.is_empty() {
            return Err(CatError::validation(format!(
                "none of the answered items belong to assignment {}",
                request.assignment_id
            )));
        }

        let key = AbilityKey::new(&request.examinee_id, &request.course_id);
        let attempts = self.config.max_swap_attempts.max(1);
        let mut committed = None;
        for attempt in 1..=attempts {
            let stored = self.collaborators.abilities.load(&key).await?;
            let prior = stored.as_ref().map_or(0.0, |s| s.theta);
            let finalized = finalize(&history, prior, request.smoothing_alpha, &self.estimator)?;

            let swapped = self
                .collaborators
                .abilities
                .compare_and_swap(
                    &key,
                    stored.as_ref().map(|s| s.version),
                    finalized.updated_theta,
                )
                .await?;
            if swapped {
                let version = stored.as_ref().map_or(1, |s| s.version + 1);
                committed = Some((prior, version, finalized));
                break;
            }
            tracing::debug!(%key, attempt, "stored ability changed concurrently, retrying");
        }

        let Some((theta_before, version, finalized)) = committed else {
            return Err(StoreError::Conflict {
                examinee_id: key.examinee_id,
                course_id: key.course_id,
                attempts,
            }
            .into());
        };

        let result = SessionResult {
            id: Uuid::new_v4(),
            examinee_id: request.examinee_id.clone(),
            course_id: request.course_id.clone(),
            assignment_id: request.assignment_id.clone(),
            final_theta: finalized.final_theta,
            correct_count: finalized.correct_count,
            total_count: finalized.total_count,
            theta_before,
            theta_after: finalized.updated_theta,
            completed_at: chrono::Utc::now(),
        };
        if let Err(e) = self.collaborators.results.create(&result).await {
            self.restore_ability(&key, version, theta_before).await;
            return Err(e.into());
        }

        tracing::info!(
            examinee = %request.examinee_id,
            course = %request.course_id,
            final_theta = finalized.final_theta,
            stored_theta = finalized.updated_theta,
            correct = finalized.correct_count,
            total = finalized.total_count,
            "session submitted"
        );

        Ok(SubmitOutcome {
            result_id: result.id,
            final_theta: finalized.final_theta,
            updated_stored_theta: finalized.updated_theta,
            correct_count: finalized.correct_count,
            total_count: finalized.total_count,
            method: finalized.method,
        })
    }

    /// Put back the pre-session ability after the result could not be recorded.
    /// Only applies if nobody wrote the row since our own swap.
    async fn restore_ability(&self, key: &AbilityKey, version: u64, theta: f64) {
        match self
            .collaborators
            .abilities
            .compare_and_swap(key, Some(version), theta)
            .await
        {
            Ok(true) => {
                tracing::warn!(%key, theta, "result not recorded, stored ability restored");
            }
            Ok(false) => {
                tracing::error!(%key, "result not recorded and ability changed since; not restored");
            }
            Err(e) => {
                tracing::error!(%key, error = %e, "result not recorded and ability restore failed");
            }
        }
    }
}

/// Pair answered ids with their responses, keeping only items of the pool.
fn build_history(items: &[Item], answered: &[String], responses: &[Response]) -> Vec<Observation> {
    let by_id: HashMap<&str, &Item> = items.iter().map(|i| (i.id.as_str(), i)).collect();
    answered
        .iter()
        .zip(responses)
        .filter_map(|(id, &response)| {
            by_id.get(id.as_str()).map(|item| Observation {
                params: item.params,
                response,
            })
        })
        .collect()
}

fn require_id(field: &str, value: &str) -> Result<(), CatError> {
    if value.trim().is_empty() {
        return Err(CatError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_finite(field: &str, value: f64) -> Result<(), CatError> {
    if !value.is_finite() {
        return Err(CatError::validation(format!("{field} must be finite")));
    }
    Ok(())
}
