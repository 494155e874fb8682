//! Three-parameter logistic response model and Fisher information.
//!
//! P(θ) = c + (1 − c) / (1 + exp(−D·a·(θ − b))) with the scaling constant
//! D = 1.7, which brings the logistic curve close to the normal ogive.

use crate::model::{ItemParams, Response};

/// Logistic scaling constant.
pub const SCALING: f64 = 1.7;

/// Probabilities closer than this to 0 or 1 carry no information.
const EPSILON: f64 = 1e-10;

#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

#[inline]
fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

#[inline]
fn logit(params: &ItemParams, theta: f64) -> f64 {
    SCALING * params.a * (theta - params.b)
}

/// Probability of a correct response at `theta`.
///
/// Saturates to `c` far below the difficulty and to `1` far above it.
pub fn probability(params: &ItemParams, theta: f64) -> f64 {
    params.c + (1.0 - params.c) * sigmoid(logit(params, theta))
}

/// Derivative of [`probability`] with respect to `theta`.
pub fn derivative(params: &ItemParams, theta: f64) -> f64 {
    let z = logit(params, theta);
    // sigmoid(-z) instead of 1 - sigmoid(z) keeps precision in the upper tail
    SCALING * params.a * (1.0 - params.c) * sigmoid(z) * sigmoid(-z)
}

/// Fisher information of one item at `theta`.
///
/// Returns 0 when either response probability underflows.
pub fn information(params: &ItemParams, theta: f64) -> f64 {
    let z = logit(params, theta);
    let p = params.c + (1.0 - params.c) * sigmoid(z);
    let q = (1.0 - params.c) * sigmoid(-z);
    if p <= EPSILON || q <= EPSILON {
        return 0.0;
    }
    let dp = derivative(params, theta);
    dp * dp / (p * q)
}

/// Log-probability of the observed response at `theta`.
pub fn log_likelihood(params: &ItemParams, response: Response, theta: f64) -> f64 {
    let z = logit(params, theta);
    match response {
        Response::Correct if params.c > 0.0 => probability(params, theta).ln(),
        Response::Correct => log_sigmoid(z),
        Response::Incorrect => (1.0 - params.c).ln() + log_sigmoid(-z),
    }
}
