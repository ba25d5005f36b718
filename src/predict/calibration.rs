//! Logistic scale calibration.
//!
//! Fits `k` in `p = sigmoid(k * weighted_sum)` to historical results. No
//! intercept: a zero weighted sum must keep mapping to 0.5.

use super::aggregate::sigmoid;

const EPS: f64 = 1e-6;

/// One historical game: the weighted component sum and 1.0 if home won.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSample {
    pub weighted_sum: f64,
    pub home_won: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct FitMetrics {
    pub logloss_before: f64,
    pub logloss_after: f64,
    pub brier_before: f64,
    pub brier_after: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScaleFit {
    pub scale: f64,
    pub metrics: FitMetrics,
}

fn clamp_prob(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

fn logloss(p: f64, y: f64) -> f64 {
    let p = clamp_prob(p);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

/// Gradient descent on mean log-loss with L2 shrinkage, starting from
/// `initial_scale`. Returns `None` for fewer than 8 samples, a single-outcome
/// history, or a fit that diverges or ends non-positive.
pub fn fit_logistic_scale(
    samples: &[ScaleSample],
    initial_scale: f64,
    max_iters: usize,
    learning_rate: f64,
    l2: f64,
) -> Option<ScaleFit> {
    if samples.len() < 8 {
        return None;
    }
    let positives = samples.iter().filter(|s| s.home_won > 0.5).count();
    if positives == 0 || positives == samples.len() {
        return None;
    }

    let n = samples.len() as f64;
    let mut k = initial_scale;

    for i in 0..max_iters.max(1) {
        let lr = learning_rate / (1.0 + 0.01 * i as f64);
        let mut grad = 0.0;
        for s in samples {
            let p = sigmoid(k * s.weighted_sum);
            grad += (p - s.home_won) * s.weighted_sum;
        }
        grad = grad / n + l2 * k;
        k -= lr * grad;
        if !k.is_finite() {
            return None;
        }
    }
    if k <= 0.0 {
        return None;
    }

    let mut ll_before = 0.0;
    let mut ll_after = 0.0;
    let mut br_before = 0.0;
    let mut br_after = 0.0;
    for s in samples {
        let before = sigmoid(initial_scale * s.weighted_sum);
        let after = sigmoid(k * s.weighted_sum);
        ll_before += logloss(before, s.home_won);
        ll_after += logloss(after, s.home_won);
        br_before += (before - s.home_won).powi(2);
        br_after += (after - s.home_won).powi(2);
    }
    Some(ScaleFit {
        scale: k,
        metrics: FitMetrics {
            logloss_before: ll_before / n,
            logloss_after: ll_after / n,
            brier_before: br_before / n,
            brier_after: br_after / n,
        },
    })
}
