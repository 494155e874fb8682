//! Ability estimation from a response history.
//!
//! Two strategies, chosen by a pure policy:
//! - maximum likelihood via numerical search, once the history is long enough;
//! - a bounded nudge of the previous estimate toward the last response, for
//!   short histories or when the search fails.
//!
//! Search failures are tagged results, never errors. They are logged and the
//! fallback takes over.

use serde::{Deserialize, Serialize};

use crate::irt;
use crate::model::{Observation, Response};

/// Lower bound of the ability scale searched by the estimator.
pub const THETA_MIN: f64 = -4.0;
/// Upper bound of the ability scale searched by the estimator.
pub const THETA_MAX: f64 = 4.0;

/// Smallest allowed fallback step.
pub const MIN_FALLBACK_STEP: f64 = 0.2;
/// Largest allowed fallback step.
pub const MAX_FALLBACK_STEP: f64 = 0.3;

/// Distance from a bound under which an optimum counts as pinned to it.
const BOUNDARY_MARGIN: f64 = 1e-3;

/// Most intervals the coarse scan may use; a finer step is widened to fit.
pub const MAX_GRID_STEPS: f64 = 4096.0;

/// Estimator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Histories shorter than this use the fallback heuristic.
    pub min_history: usize,
    pub theta_min: f64,
    pub theta_max: f64,
    /// Spacing of the coarse scan that brackets the optimum.
    pub grid_step: f64,
    /// Width of the final golden-section bracket.
    pub tolerance: f64,
    pub max_iterations: u32,
    /// Fallback step when the history is too short.
    pub short_history_step: f64,
    /// Fallback step when the numerical search failed.
    pub degraded_step: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_history: 2,
            theta_min: THETA_MIN,
            theta_max: THETA_MAX,
            grid_step: 0.25,
            tolerance: 1e-6,
            max_iterations: 200,
            short_history_step: 0.3,
            degraded_step: 0.2,
        }
    }
}

/// Why the numerical search gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFailure {
    /// All responses identical: the likelihood has no interior maximum.
    UniformResponses,
    /// The optimum sits on the edge of the search interval.
    Boundary,
    /// The likelihood or the optimum was not a finite number.
    NonFinite,
    /// The bracket did not shrink below tolerance in time.
    NotConverged,
}

/// Result of the maximum-likelihood search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    Converged(f64),
    Failed(SearchFailure),
}

/// Why the fallback heuristic was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    InsufficientHistory,
    Degraded(SearchFailure),
}

/// How an estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    MaximumLikelihood,
    Fallback(FallbackReason),
}

/// A point estimate of ability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub theta: f64,
    pub method: EstimationMethod,
}

/// Estimates ability from an ordered response history.
#[derive(Debug, Clone)]
pub struct AbilityEstimator {
    config: EstimatorConfig,
}

impl Default for AbilityEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl AbilityEstimator {
    /// Fallback steps outside `[0.2, 0.3]` are clamped into it.
    pub fn new(mut config: EstimatorConfig) -> Self {
        config.short_history_step = config
            .short_history_step
            .clamp(MIN_FALLBACK_STEP, MAX_FALLBACK_STEP);
        config.degraded_step = config
            .degraded_step
            .clamp(MIN_FALLBACK_STEP, MAX_FALLBACK_STEP);
        if !(config.theta_min.is_finite()
            && config.theta_max.is_finite()
            && config.theta_min < config.theta_max)
        {
            config.theta_min = THETA_MIN;
            config.theta_max = THETA_MAX;
        }
        if !(config.grid_step > 0.0 && config.grid_step.is_finite()) {
            config.grid_step = EstimatorConfig::default().grid_step;
        }
        let span = config.theta_max - config.theta_min;
        if span / config.grid_step > MAX_GRID_STEPS {
            config.grid_step = span / MAX_GRID_STEPS;
        }
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Whether the history is long enough for the numerical search.
    pub fn has_sufficient_history(&self, history: &[Observation]) -> bool {
        history.len() >= self.config.min_history
    }

    /// Estimate ability after `history`, starting from `prior`.
    pub fn estimate(&self, history: &[Observation], prior: f64) -> Estimate {
        if !self.has_sufficient_history(history) {
            let reason = FallbackReason::InsufficientHistory;
            return Estimate {
                theta: self.fallback(history, prior, reason),
                method: EstimationMethod::Fallback(reason),
            };
        }

        match self.maximum_likelihood(history) {
            SearchOutcome::Converged(theta) => {
                tracing::debug!(theta, answered = history.len(), "maximum-likelihood estimate");
                Estimate {
                    theta,
                    method: EstimationMethod::MaximumLikelihood,
                }
            }
            SearchOutcome::Failed(failure) => {
                tracing::warn!(
                    ?failure,
                    answered = history.len(),
                    prior,
                    "ability estimation degraded, using fallback"
                );
                let reason = FallbackReason::Degraded(failure);
                Estimate {
                    theta: self.fallback(history, prior, reason),
                    method: EstimationMethod::Fallback(reason),
                }
            }
        }
    }

    /// Move `prior` a bounded step toward the most recent response.
    ///
    /// An empty history leaves the prior unchanged.
    pub fn fallback(&self, history: &[Observation], prior: f64, reason: FallbackReason) -> f64 {
        let Some(last) = history.last() else {
            return prior;
        };
        let step = match reason {
            FallbackReason::InsufficientHistory => self.config.short_history_step,
            FallbackReason::Degraded(_) => self.config.degraded_step,
        };
        let delta = match last.response {
            Response::Correct => step,
            Response::Incorrect => -step,
        };
        (prior + delta).clamp(self.config.theta_min, self.config.theta_max)
    }

    /// Find the ability maximizing the likelihood of the observed responses.
    ///
    /// A coarse scan brackets the best grid point, then golden-section search
    /// refines it. The 3PL likelihood can have shallow local optima, which the
    /// scan keeps the refinement away from.
    pub fn maximum_likelihood(&self, history: &[Observation]) -> SearchOutcome {
        let Some(first) = history.first() else {
            return SearchOutcome::Failed(SearchFailure::UniformResponses);
        };
        if history.iter().all(|o| o.response == first.response) {
            return SearchOutcome::Failed(SearchFailure::UniformResponses);
        }

        let cfg = &self.config;
        let log_likelihood = |theta: f64| -> f64 {
            history
                .iter()
                .map(|o| irt::log_likelihood(&o.params, o.response, theta))
                .sum()
        };

        let n_steps = ((cfg.theta_max - cfg.theta_min) / cfg.grid_step).ceil() as usize;
        let grid: Vec<f64> = (0..=n_steps)
            .map(|i| (cfg.theta_min + i as f64 * cfg.grid_step).min(cfg.theta_max))
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for (i, &theta) in grid.iter().enumerate() {
            let ll = log_likelihood(theta);
            if !ll.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, best_ll)| ll > best_ll) {
                best = Some((i, ll));
            }
        }
        let Some((best_idx, _)) = best else {
            return SearchOutcome::Failed(SearchFailure::NonFinite);
        };

        let mut lo = grid[best_idx.saturating_sub(1)];
        let mut hi = grid[(best_idx + 1).min(grid.len() - 1)];

        let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let mut iterations = 0;
        while hi - lo > cfg.tolerance {
            if iterations >= cfg.max_iterations {
                return SearchOutcome::Failed(SearchFailure::NotConverged);
            }
            let c = hi - (hi - lo) / phi;
            let d = lo + (hi - lo) / phi;
            if log_likelihood(c) > log_likelihood(d) {
                hi = d;
            } else {
                lo = c;
            }
            iterations += 1;
        }

        let theta = (lo + hi) / 2.0;
        if !theta.is_finite() || !log_likelihood(theta).is_finite() {
            return SearchOutcome::Failed(SearchFailure::NonFinite);
        }
        if theta - cfg.theta_min < BOUNDARY_MARGIN || cfg.theta_max - theta < BOUNDARY_MARGIN {
            return SearchOutcome::Failed(SearchFailure::Boundary);
        }
        SearchOutcome::Converged(theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemParams;

    fn obs(a: f64, b: f64, c: f64, correct: bool) -> Observation {
        Observation {
            params: ItemParams::new(a, b, c).unwrap(),
            response: Response::from(correct),
        }
    }

    #[test]
    fn single_correct_response_nudges_up() {
        let est = AbilityEstimator::default().estimate(&[obs(1.0, 0.0, 0.2, true)], 0.0);
        assert!((0.2..=0.3).contains(&est.theta), "theta {}", est.theta);
        assert_eq!(
            est.method,
            EstimationMethod::Fallback(FallbackReason::InsufficientHistory)
        );
    }

    #[test]
    fn single_incorrect_response_nudges_down() {
        let est = AbilityEstimator::default().estimate(&[obs(1.0, 0.0, 0.2, false)], 0.0);
        assert!((-0.3..=-0.2).contains(&est.theta), "theta {}", est.theta);
    }

    #[test]
    fn empty_history_keeps_prior() {
        let est = AbilityEstimator::default().estimate(&[], 0.7);
        assert_eq!(est.theta, 0.7);
    }

    #[test]
    fn fallback_is_clamped_to_scale() {
        let est = AbilityEstimator::default().estimate(&[obs(1.0, 0.0, 0.2, true)], 3.9);
        assert_eq!(est.theta, THETA_MAX);
    }

    #[test]
    fn uniform_responses_degrade_to_fallback() {
        let history = vec![
            obs(1.0, -1.0, 0.2, true),
            obs(1.2, 0.0, 0.2, true),
            obs(0.9, 1.0, 0.2, true),
        ];
        let estimator = AbilityEstimator::default();
        assert_eq!(
            estimator.maximum_likelihood(&history),
            SearchOutcome::Failed(SearchFailure::UniformResponses)
        );
        let est = estimator.estimate(&history, 0.0);
        assert!((est.theta - 0.2).abs() < 1e-12);
        assert_eq!(
            est.method,
            EstimationMethod::Fallback(FallbackReason::Degraded(SearchFailure::UniformResponses))
        );
    }

    #[test]
    fn mixed_responses_use_maximum_likelihood() {
        let history = vec![
            obs(1.5, -1.0, 0.0, true),
            obs(1.5, -0.5, 0.0, true),
            obs(1.5, 0.0, 0.0, true),
            obs(1.5, 0.5, 0.0, false),
            obs(1.5, 1.0, 0.0, false),
        ];
        let est = AbilityEstimator::default().estimate(&history, 0.0);
        assert_eq!(est.method, EstimationMethod::MaximumLikelihood);
        assert!((est.theta - 0.2718).abs() < 1e-3, "theta {}", est.theta);
    }

    #[test]
    fn maximum_likelihood_is_a_stationary_point() {
        let history = vec![
            obs(1.2, -0.8, 0.2, true),
            obs(0.9, 0.3, 0.25, false),
            obs(1.6, 0.1, 0.2, true),
            obs(1.1, 1.2, 0.2, false),
        ];
        let SearchOutcome::Converged(theta) =
            AbilityEstimator::default().maximum_likelihood(&history)
        else {
            panic!("search should converge");
        };
        let ll = |t: f64| -> f64 {
            history
                .iter()
                .map(|o| irt::log_likelihood(&o.params, o.response, t))
                .sum()
        };
        let h = 1e-4;
        assert!(ll(theta) >= ll(theta - h));
        assert!(ll(theta) >= ll(theta + h));
    }

    #[test]
    fn optimum_beyond_scale_is_boundary_failure() {
        // correct only on the very hard item, wrong on the easy ones
        let history = vec![
            obs(2.0, -3.5, 0.0, false),
            obs(2.0, -3.0, 0.0, false),
            obs(2.0, 3.5, 0.25, true),
        ];
        let estimator = AbilityEstimator::default();
        assert_eq!(
            estimator.maximum_likelihood(&history),
            SearchOutcome::Failed(SearchFailure::Boundary)
        );
        let est = estimator.estimate(&history, 0.0);
        assert!((est.theta - 0.2).abs() < 1e-12);
    }

    #[test]
    fn oversized_grid_is_coarsened() {
        let est = AbilityEstimator::new(EstimatorConfig {
            theta_min: -1e9,
            theta_max: 1e9,
            grid_step: 0.25,
            ..EstimatorConfig::default()
        });
        let cfg = est.config();
        assert!((cfg.theta_max - cfg.theta_min) / cfg.grid_step <= MAX_GRID_STEPS + 1e-9);

        let est = AbilityEstimator::new(EstimatorConfig {
            theta_min: f64::NEG_INFINITY,
            grid_step: f64::NAN,
            ..EstimatorConfig::default()
        });
        assert_eq!(est.config().theta_min, THETA_MIN);
        assert_eq!(est.config().grid_step, 0.25);
    }

    #[test]
    fn out_of_range_steps_are_clamped() {
        let estimator = AbilityEstimator::new(EstimatorConfig {
            short_history_step: 1.0,
            degraded_step: 0.05,
            ..Default::default()
        });
        assert_eq!(estimator.config().short_history_step, MAX_FALLBACK_STEP);
        assert_eq!(estimator.config().degraded_step, MIN_FALLBACK_STEP);
    }

    #[test]
    fn not_converged_when_iterations_exhausted() {
        let estimator = AbilityEstimator::new(EstimatorConfig {
            max_iterations: 2,
            ..Default::default()
        });
        let history = vec![obs(1.0, -0.5, 0.0, true), obs(1.0, 0.5, 0.0, false)];
        assert_eq!(
            estimator.maximum_likelihood(&history),
            SearchOutcome::Failed(SearchFailure::NotConverged)
        );
    }
}
