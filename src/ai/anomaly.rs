//! Unsupervised outlier detection
//!
//! A seeded isolation forest over standardized observation vectors. Scores
//! follow the usual decision-function convention: negative means anomalous,
//! with values roughly in [-0.5, 0.5].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::scaler::StandardScaler;
use super::AnomalyAnalysis;

/// Fleet-wide vectors required before the detector fits
pub const MIN_TRAINING_VECTORS: usize = 10;

const N_ESTIMATORS: usize = 100;
const SUBSAMPLE: usize = 256;
const TRAIN_SEED: u64 = 0x1a_57_a7_c4;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Expected path length of an unsuccessful BST search over n points.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &[Vec<f64>], indices: &[usize], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build_node(data, indices, 0, height_limit, rng);
        tree
    }

    fn build_node(
        &mut self,
        data: &[Vec<f64>],
        indices: &[usize],
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        if indices.len() <= 1 || depth >= height_limit {
            self.nodes.push(Node::Leaf {
                size: indices.len(),
            });
            return self.nodes.len() - 1;
        }

        // Splittable features: those with spread among the current points.
        let dims = data[indices[0]].len();
        let mut candidates = Vec::new();
        for feature in 0..dims {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &i in indices {
                min = min.min(data[i][feature]);
                max = max.max(data[i][feature]);
            }
            if max > min {
                candidates.push((feature, min, max));
            }
        }

        if candidates.is_empty() {
            self.nodes.push(Node::Leaf {
                size: indices.len(),
            });
            return self.nodes.len() - 1;
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| data[i][feature] < threshold);

        // Reserve the split slot before recursing so child indexes are known.
        let node_index = self.nodes.len();
        self.nodes.push(Node::Leaf { size: 0 });

        let left = self.build_node(data, &left_indices, depth + 1, height_limit, rng);
        let right = self.build_node(data, &right_indices, depth + 1, height_limit, rng);

        self.nodes[node_index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_index
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut index = 0usize;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if sample.get(*feature).copied().unwrap_or(0.0) < *threshold {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    fn fit(data: &[Vec<f64>], rng: &mut StdRng) -> Self {
        let sample_size = data.len().min(SUBSAMPLE);
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let mut all_indices: Vec<usize> = (0..data.len()).collect();
        let mut trees = Vec::with_capacity(N_ESTIMATORS);

        for _ in 0..N_ESTIMATORS {
            all_indices.shuffle(rng);
            let subsample = &all_indices[..sample_size];
            trees.push(IsolationTree::build(data, subsample, height_limit, rng));
        }

        Self { trees, sample_size }
    }

    /// Decision score: positive for inliers, negative for outliers.
    fn decision(&self, sample: &[f64]) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = average_path_length(self.sample_size).max(1e-12);
        0.5 - 2.0_f64.powf(-mean_path / normalizer)
    }
}

/// Fleet-trained anomaly detector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnomalyDetector {
    scaler: StandardScaler,
    forest: Option<IsolationForest>,
}

impl AnomalyDetector {
    pub fn is_fitted(&self) -> bool {
        self.forest.is_some()
    }

    /// Fit on fleet-wide observation vectors. Returns false (leaving any
    /// previous fit untouched) when fewer than the minimum are available.
    pub fn train(&mut self, vectors: &[Vec<f64>]) -> bool {
        if vectors.len() < MIN_TRAINING_VECTORS {
            tracing::warn!(
                "Insufficient anomaly training data: {} vectors (< {})",
                vectors.len(),
                MIN_TRAINING_VECTORS
            );
            return false;
        }

        let scaler = StandardScaler::fit(vectors);
        let scaled = scaler.transform_all(vectors);

        let mut rng = StdRng::seed_from_u64(TRAIN_SEED);
        self.forest = Some(IsolationForest::fit(&scaled, &mut rng));
        self.scaler = scaler;
        true
    }

    /// Score a device window. Untrained detectors and empty windows return
    /// the neutral analysis.
    pub fn analyze(&self, window: &[Vec<f64>], threshold: f64) -> AnomalyAnalysis {
        let forest = match (&self.forest, window.is_empty()) {
            (Some(forest), false) => forest,
            _ => return AnomalyAnalysis::neutral(),
        };

        let scores: Vec<f64> = window
            .iter()
            .map(|vector| forest.decision(&self.scaler.transform(vector)))
            .collect();

        let avg_score = scores.iter().sum::<f64>() / scores.len() as f64;
        let recent_anomalies = scores.iter().filter(|&&s| s < 0.0).count();

        AnomalyAnalysis {
            is_anomaly: avg_score < threshold,
            score: avg_score,
            confidence: avg_score.abs().min(1.0),
            recent_anomalies,
        }
    }
}
