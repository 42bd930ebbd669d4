//! Feature standardization (zero mean, unit variance)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit on row-major samples. Constant columns get unit scale so they
    /// pass through unchanged.
    pub fn fit(samples: &[Vec<f64>]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let dims = samples[0].len();
        let n = samples.len() as f64;

        let mut means = vec![0.0; dims];
        for sample in samples {
            for (i, value) in sample.iter().enumerate() {
                means[i] += value;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut stds = vec![0.0; dims];
        for sample in samples {
            for (i, value) in sample.iter().enumerate() {
                let diff = value - means[i];
                stds[i] += diff * diff;
            }
        }
        for std in &mut stds {
            *std = (*std / n).sqrt();
            if *std < 1e-12 {
                *std = 1.0;
            }
        }

        Self { means, stds }
    }

    pub fn transform(&self, sample: &[f64]) -> Vec<f64> {
        if self.means.len() != sample.len() {
            // Shape mismatch degrades to the raw sample; callers treat the
            // model as untrained for vectors they cannot scale.
            return sample.to_vec();
        }
        sample
            .iter()
            .enumerate()
            .map(|(i, value)| (value - self.means[i]) / self.stds[i])
            .collect()
    }

    pub fn transform_all(&self, samples: &[Vec<f64>]) -> Vec<Vec<f64>> {
        samples.iter().map(|s| self.transform(s)).collect()
    }

    pub fn dims(&self) -> usize {
        self.means.len()
    }
}
