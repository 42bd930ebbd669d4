//! Failure prediction
//!
//! Two small supervised models over the maintenance window features: a
//! logistic regression for failure probability and a linear regression for
//! expected uptime ratio. Both train by full-batch gradient descent from
//! zero weights, so retraining on identical data is reproducible.

use serde::{Deserialize, Serialize};

use super::scaler::StandardScaler;
use super::MaintenanceAnalysis;
use crate::models::Urgency;

/// Fleet samples required before the predictors fit
pub const MIN_TRAINING_SAMPLES: usize = 5;

const EPOCHS: usize = 500;
const LEARNING_RATE: f64 = 0.1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearModel {
    fn zeros(dims: usize) -> Self {
        Self {
            weights: vec![0.0; dims],
            bias: 0.0,
        }
    }

    fn raw(&self, sample: &[f64]) -> f64 {
        let dot: f64 = self
            .weights
            .iter()
            .zip(sample.iter())
            .map(|(w, x)| w * x)
            .sum();
        dot + self.bias
    }

    /// One full-batch gradient step; `predict` maps the raw output to the
    /// model's response (sigmoid for the classifier, identity here).
    fn step(&mut self, samples: &[Vec<f64>], targets: &[f64], logistic: bool) {
        let n = samples.len() as f64;
        let mut grad_w = vec![0.0; self.weights.len()];
        let mut grad_b = 0.0;

        for (sample, &target) in samples.iter().zip(targets.iter()) {
            let prediction = if logistic {
                sigmoid(self.raw(sample))
            } else {
                self.raw(sample)
            };
            let error = prediction - target;
            for (g, x) in grad_w.iter_mut().zip(sample.iter()) {
                *g += error * x;
            }
            grad_b += error;
        }

        for (w, g) in self.weights.iter_mut().zip(grad_w.iter()) {
            *w -= LEARNING_RATE * g / n;
        }
        self.bias -= LEARNING_RATE * grad_b / n;
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Fleet-trained maintenance predictor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenancePredictor {
    scaler: StandardScaler,
    failure_model: Option<LinearModel>,
    uptime_model: Option<LinearModel>,
}

impl MaintenancePredictor {
    pub fn is_fitted(&self) -> bool {
        self.failure_model.is_some() && self.uptime_model.is_some()
    }

    /// Fit both models on labeled windows. `labels[i]` is 1.0 when device
    /// `i` failed at least once in its recent observations; the uptime
    /// regressor trains on the complement. Returns false below the minimum
    /// sample gate.
    pub fn train(&mut self, samples: &[Vec<f64>], labels: &[f64]) -> bool {
        if samples.len() < MIN_TRAINING_SAMPLES || samples.len() != labels.len() {
            tracing::warn!(
                "Insufficient maintenance training data: {} samples (< {})",
                samples.len(),
                MIN_TRAINING_SAMPLES
            );
            return false;
        }

        let scaler = StandardScaler::fit(samples);
        let scaled = scaler.transform_all(samples);
        let dims = scaled[0].len();

        let mut failure_model = LinearModel::zeros(dims);
        let uptime_targets: Vec<f64> = labels.iter().map(|l| 1.0 - l).collect();
        let mut uptime_model = LinearModel::zeros(dims);

        for _ in 0..EPOCHS {
            failure_model.step(&scaled, labels, true);
            uptime_model.step(&scaled, &uptime_targets, false);
        }

        self.scaler = scaler;
        self.failure_model = Some(failure_model);
        self.uptime_model = Some(uptime_model);
        true
    }

    /// Predict for one maintenance window. Untrained predictors return the
    /// neutral analysis (no failure, full uptime, zero confidence).
    pub fn predict(&self, features: Option<&[f64]>) -> MaintenanceAnalysis {
        let (failure_model, uptime_model, features) =
            match (&self.failure_model, &self.uptime_model, features) {
                (Some(f), Some(u), Some(features)) => (f, u, features),
                _ => return MaintenanceAnalysis::neutral(),
            };

        let scaled = self.scaler.transform(features);
        let failure_probability = sigmoid(failure_model.raw(&scaled)).clamp(0.0, 1.0);
        let uptime_prediction = uptime_model.raw(&scaled).clamp(0.0, 1.0);

        MaintenanceAnalysis {
            failure_probability,
            uptime_prediction,
            urgency: Urgency::from_failure_probability(failure_probability),
            confidence: (failure_probability + uptime_prediction).min(1.0),
        }
    }
}
