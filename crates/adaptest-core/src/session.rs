//! Session finalization: final estimate plus exponential smoothing of the
//! stored ability.

use serde::{Deserialize, Serialize};

use crate::error::CatError;
use crate::estimation::{AbilityEstimator, EstimationMethod};
use crate::model::Observation;

/// Default weight of the latest session in the stored ability.
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.2;

/// Outcome of finalizing a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Finalized {
    /// Estimate over the complete response vector.
    pub final_theta: f64,
    /// Blend of the prior stored ability and `final_theta`.
    pub updated_theta: f64,
    pub correct_count: usize,
    pub total_count: usize,
    pub method: EstimationMethod,
}

/// Blend a stored ability with a new estimate: `prior·(1−α) + latest·α`.
pub fn smooth(prior: f64, latest: f64, alpha: f64) -> f64 {
    prior * (1.0 - alpha) + latest * alpha
}

/// Check that a smoothing weight lies in `[0, 1]`.
pub fn validate_alpha(alpha: f64) -> Result<(), CatError> {
    if (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(CatError::validation(format!(
            "smoothing_alpha must be in [0, 1], got {alpha}"
        )))
    }
}

/// Estimate ability over the full history and smooth it into the stored value.
///
/// The estimator starts from `prior_stored`; only the fallback path uses it.
pub fn finalize(
    history: &[Observation],
    prior_stored: f64,
    alpha: f64,
    estimator: &AbilityEstimator,
) -> Result<Finalized, CatError> {
    validate_alpha(alpha)?;

    let estimate = estimator.estimate(history, prior_stored);
    let correct_count = history.iter().filter(|o| o.response.is_correct()).count();

    Ok(Finalized {
        final_theta: estimate.theta,
        updated_theta: smooth(prior_stored, estimate.theta, alpha),
        correct_count,
        total_count: history.len(),
        method: estimate.method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemParams, Response};

    fn obs(b: f64, correct: bool) -> Observation {
        Observation {
            params: ItemParams::new(1.2, b, 0.2).unwrap(),
            response: Response::from(correct),
        }
    }

    #[test]
    fn smoothing_blend() {
        assert!((smooth(0.0, 1.0, 0.2) - 0.2).abs() < 1e-12);
        assert!((smooth(1.0, -1.0, 0.5)).abs() < 1e-12);
        assert_eq!(smooth(0.7, 2.0, 0.0), 0.7);
        assert_eq!(smooth(0.7, 2.0, 1.0), 2.0);
    }

    #[test]
    fn alpha_out_of_range_is_rejected() {
        assert!(finalize(&[obs(0.0, true)], 0.0, 1.5, &AbilityEstimator::default()).is_err());
        assert!(finalize(&[obs(0.0, true)], 0.0, -0.1, &AbilityEstimator::default()).is_err());
        assert!(validate_alpha(f64::NAN).is_err());
    }

    #[test]
    fn counts_and_estimate_match_estimator() {
        let history = vec![obs(-1.0, true), obs(0.0, false), obs(0.5, true), obs(1.5, false)];
        let estimator = AbilityEstimator::default();
        let finalized = finalize(&history, 0.4, 0.2, &estimator).unwrap();

        let standalone = estimator.estimate(&history, 0.4);
        assert_eq!(finalized.final_theta, standalone.theta);
        assert_eq!(finalized.method, standalone.method);
        assert_eq!(finalized.correct_count, 2);
        assert_eq!(finalized.total_count, 4);
        assert!(
            (finalized.updated_theta - (0.4 * 0.8 + standalone.theta * 0.2)).abs() < 1e-12
        );
    }

    #[test]
    fn empty_history_keeps_stored_ability() {
        let finalized = finalize(&[], 0.9, 0.2, &AbilityEstimator::default()).unwrap();
        assert_eq!(finalized.total_count, 0);
        assert!((finalized.updated_theta - 0.9).abs() < 1e-12);
    }
}
