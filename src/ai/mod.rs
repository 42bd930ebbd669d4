//! Assessment engine
//!
//! Combines the classification, anomaly and maintenance sub-models into one
//! per-device assessment: health score, aggregate confidence and derived
//! recommendations. The live model set is held behind an `RwLock<Arc<..>>`;
//! training builds a replacement and swaps it by reference, so inference
//! keeps using the previous models until the swap.

pub mod anomaly;
pub mod classifier;
pub mod features;
pub mod maintenance;
pub mod persist;
pub mod recommend;
pub mod scaler;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DeviceType, Urgency};
use crate::store::ObservationRecord;
use anomaly::AnomalyDetector;
use classifier::CentroidClassifier;
use features::{
    anomaly_vectors, failure_label, static_features, WindowFeatures, CLASSIFY_ANOMALY_WINDOW,
    MAINTENANCE_WINDOW,
};
use maintenance::MaintenancePredictor;
use persist::{ModelArtifact, ARTIFACT_VERSION};
use recommend::{derive_recommendations, Recommendation};

/// Classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub device_type: DeviceType,
    pub confidence: f64,
    pub features: Vec<f64>,
}

impl Classification {
    pub fn neutral() -> Self {
        Self {
            device_type: DeviceType::Unknown,
            confidence: 0.0,
            features: Vec::new(),
        }
    }
}

/// Anomaly analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAnalysis {
    pub is_anomaly: bool,
    /// Decision score; negative = more anomalous
    pub score: f64,
    pub confidence: f64,
    /// Observations in the window individually flagged anomalous
    pub recent_anomalies: usize,
}

impl AnomalyAnalysis {
    pub fn neutral() -> Self {
        Self {
            is_anomaly: false,
            score: 0.0,
            confidence: 0.0,
            recent_anomalies: 0,
        }
    }
}

/// Maintenance prediction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceAnalysis {
    pub failure_probability: f64,
    pub uptime_prediction: f64,
    pub urgency: Urgency,
    pub confidence: f64,
}

impl MaintenanceAnalysis {
    pub fn neutral() -> Self {
        Self {
            failure_probability: 0.0,
            uptime_prediction: 1.0,
            urgency: Urgency::Low,
            confidence: 0.0,
        }
    }
}

/// Complete per-device assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub classification: Classification,
    pub anomaly: AnomalyAnalysis,
    pub maintenance: MaintenanceAnalysis,
    pub recommendations: Vec<Recommendation>,
    pub health_score: f64,
    pub ai_confidence: f64,
    pub produced_at: DateTime<Utc>,
}

impl Assessment {
    /// Assessment for a device with no observation history: perfectly
    /// healthy, zero confidence.
    pub fn neutral() -> Self {
        Self {
            classification: Classification::neutral(),
            anomaly: AnomalyAnalysis::neutral(),
            maintenance: MaintenanceAnalysis::neutral(),
            recommendations: Vec::new(),
            health_score: 100.0,
            ai_confidence: 0.0,
            produced_at: Utc::now(),
        }
    }
}

/// Weighted health score, clamped to [0, 100].
pub fn health_score(
    maintenance: &MaintenanceAnalysis,
    anomaly: &AnomalyAnalysis,
    classification: &Classification,
) -> f64 {
    let maintenance_part = (1.0 - maintenance.failure_probability) * 100.0;
    let anomaly_part = ((1.0 + anomaly.score) * 50.0).max(0.0);
    let classification_part = classification.confidence * 100.0;

    (0.5 * maintenance_part + 0.3 * anomaly_part + 0.2 * classification_part).clamp(0.0, 100.0)
}

/// Aggregate confidence: mean of the three sub-model confidences.
pub fn aggregate_confidence(
    classification: &Classification,
    anomaly: &AnomalyAnalysis,
    maintenance: &MaintenanceAnalysis,
) -> f64 {
    ((classification.confidence + anomaly.confidence + maintenance.confidence) / 3.0)
        .clamp(0.0, 1.0)
}

/// Identity and history of one device as the engine sees it
#[derive(Debug, Clone)]
pub struct AssessmentInput<'a> {
    pub ip: Ipv4Addr,
    pub hostname: &'a str,
    pub mac_vendor: &'a str,
    /// Newest first, as the store returns it
    pub history: &'a [ObservationRecord],
    /// Total observations ever recorded for this device
    pub device_age: i64,
}

/// One device's contribution to a training batch
#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub ip: Ipv4Addr,
    pub hostname: String,
    pub mac_vendor: String,
    /// Newest first
    pub history: Vec<ObservationRecord>,
    pub device_age: i64,
}

/// Outcome of one training batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub devices: usize,
    pub anomaly_vectors: usize,
    pub maintenance_samples: usize,
    pub classifier_samples: usize,
    pub anomaly_trained: bool,
    pub maintenance_trained: bool,
    pub classifier_trained: bool,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct ModelSet {
    anomaly: AnomalyDetector,
    maintenance: MaintenancePredictor,
    classifier: CentroidClassifier,
}

/// The assessment engine (C5)
pub struct AssessmentEngine {
    models: RwLock<Arc<ModelSet>>,
    artifact_path: Option<PathBuf>,
    anomaly_threshold: f64,
}

impl AssessmentEngine {
    /// Build the engine, loading a persisted artifact when one exists.
    pub fn new(anomaly_threshold: f64, artifact_path: Option<PathBuf>) -> Self {
        let mut models = ModelSet::default();

        if let Some(path) = &artifact_path {
            if path.exists() {
                match ModelArtifact::load(path) {
                    Ok(artifact) => {
                        tracing::info!(
                            "Loaded model artifact from {} (trained {})",
                            path.display(),
                            artifact.trained_at
                        );
                        models = ModelSet {
                            anomaly: artifact.anomaly,
                            maintenance: artifact.maintenance,
                            classifier: artifact.classifier,
                        };
                    }
                    Err(e) => {
                        tracing::warn!("Ignoring unusable model artifact: {:#}", e);
                    }
                }
            }
        }

        Self {
            models: RwLock::new(Arc::new(models)),
            artifact_path,
            anomaly_threshold,
        }
    }

    fn live_models(&self) -> Arc<ModelSet> {
        match self.models.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Assess one device from its identity and observation history.
    ///
    /// Deterministic: identical history and models produce an identical
    /// assessment (timestamp aside). Devices without history get the
    /// neutral assessment; a single observation is not enough for the
    /// anomaly or maintenance models to infer from.
    pub fn assess(&self, input: &AssessmentInput<'_>) -> Assessment {
        if input.history.is_empty() {
            return Assessment::neutral();
        }

        let models = self.live_models();

        let classification =
            classifier::classify(&models.classifier, input.hostname, input.mac_vendor, input.ip);

        let (anomaly, maintenance) = if input.history.len() < 2 {
            (AnomalyAnalysis::neutral(), MaintenanceAnalysis::neutral())
        } else {
            let window = anomaly_vectors(input.history);
            let anomaly = models.anomaly.analyze(&window, self.anomaly_threshold);

            let maintenance_features =
                WindowFeatures::compute(input.history, MAINTENANCE_WINDOW, input.device_age)
                    .map(|f| f.to_vector());
            let maintenance = models.maintenance.predict(maintenance_features.as_deref());

            (anomaly, maintenance)
        };

        let recommendations = derive_recommendations(
            maintenance.failure_probability,
            anomaly.score,
            maintenance.uptime_prediction,
            classification.device_type,
        );

        let health_score = health_score(&maintenance, &anomaly, &classification);
        let ai_confidence = aggregate_confidence(&classification, &anomaly, &maintenance);

        Assessment {
            classification,
            anomaly,
            maintenance,
            recommendations,
            health_score,
            ai_confidence,
            produced_at: Utc::now(),
        }
    }

    /// Run one training batch over the fleet.
    ///
    /// Sub-models that fail their sample gate keep their previous fit. The
    /// new model set is persisted (atomically) and swapped in only at the
    /// end; assessments issued meanwhile use the previous models.
    pub fn train(&self, fleet: &[TrainingSample]) -> Result<TrainingReport> {
        let mut next = ModelSet::clone(&self.live_models());

        let mut all_anomaly_vectors: Vec<Vec<f64>> = Vec::new();
        let mut maintenance_features: Vec<Vec<f64>> = Vec::new();
        let mut maintenance_labels: Vec<f64> = Vec::new();
        let mut classifier_samples: Vec<(DeviceType, Vec<f64>)> = Vec::new();

        for sample in fleet {
            if sample.history.is_empty() {
                continue;
            }

            all_anomaly_vectors.extend(anomaly_vectors(
                &sample.history[..sample.history.len().min(CLASSIFY_ANOMALY_WINDOW)],
            ));

            if let Some(window) =
                WindowFeatures::compute(&sample.history, MAINTENANCE_WINDOW, sample.device_age)
            {
                maintenance_features.push(window.to_vector());
                maintenance_labels.push(failure_label(&sample.history));
            }

            if let Some((device_type, _)) =
                classifier::rule_classify(&sample.hostname, &sample.mac_vendor)
            {
                classifier_samples.push((
                    device_type,
                    static_features(&sample.hostname, &sample.mac_vendor, sample.ip),
                ));
            }
        }

        let anomaly_trained = next.anomaly.train(&all_anomaly_vectors);
        let maintenance_trained = next
            .maintenance
            .train(&maintenance_features, &maintenance_labels);
        let classifier_trained = next.classifier.train(&classifier_samples);

        let trained_at = Utc::now();

        if let Some(path) = &self.artifact_path {
            let artifact = ModelArtifact {
                version: ARTIFACT_VERSION,
                trained_at,
                anomaly: next.anomaly.clone(),
                maintenance: next.maintenance.clone(),
                classifier: next.classifier.clone(),
            };
            if let Err(e) = artifact.save_atomic(path) {
                tracing::error!("Failed to persist model artifact: {:#}", e);
            }
        }

        match self.models.write() {
            Ok(mut guard) => *guard = Arc::new(next),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(next),
        }

        let report = TrainingReport {
            devices: fleet.len(),
            anomaly_vectors: all_anomaly_vectors.len(),
            maintenance_samples: maintenance_features.len(),
            classifier_samples: classifier_samples.len(),
            anomaly_trained,
            maintenance_trained,
            classifier_trained,
            trained_at,
        };

        tracing::info!(
            "Training batch complete: {} devices, anomaly={} maintenance={} classifier={}",
            report.devices,
            report.anomaly_trained,
            report.maintenance_trained,
            report.classifier_trained
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::features::test_support::history_from_flags;
    use super::*;

    fn engine() -> AssessmentEngine {
        AssessmentEngine::new(-0.5, None)
    }

    fn input<'a>(
        history: &'a [ObservationRecord],
        hostname: &'a str,
        vendor: &'a str,
    ) -> AssessmentInput<'a> {
        AssessmentInput {
            ip: Ipv4Addr::new(192, 168, 1, 10),
            hostname,
            mac_vendor: vendor,
            history,
            device_age: history.len() as i64,
        }
    }

    #[test]
    fn test_neutral_assessment_for_empty_history() {
        let assessment = engine().assess(&input(&[], "PLC-LINE1", "Siemens AG"));
        assert_eq!(assessment.health_score, 100.0);
        assert_eq!(assessment.maintenance.failure_probability, 0.0);
        assert_eq!(assessment.anomaly.score, 0.0);
        assert_eq!(assessment.maintenance.urgency, Urgency::Low);
        assert_eq!(assessment.ai_confidence, 0.0);
    }

    #[test]
    fn test_single_observation_refuses_inference() {
        let history = history_from_flags(&[true]);
        let assessment = engine().assess(&input(&history, "PLC-LINE1", "Siemens AG"));
        assert_eq!(assessment.anomaly.score, 0.0);
        assert_eq!(assessment.maintenance.failure_probability, 0.0);
        // Classification still runs on identity attributes.
        assert_eq!(assessment.classification.device_type, DeviceType::Plc);
        assert!(assessment.classification.confidence >= 0.85);
    }

    #[test]
    fn test_assessment_bounds_hold() {
        let history = history_from_flags(&[true, false, true, false, false, true]);
        let assessment = engine().assess(&input(&history, "srv-core", "Dell Inc"));
        assert!((0.0..=100.0).contains(&assessment.health_score));
        assert!((0.0..=1.0).contains(&assessment.ai_confidence));
        assert!((0.0..=1.0).contains(&assessment.maintenance.failure_probability));
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let history = history_from_flags(&[true, true, false, true, true, false, true]);
        let e = engine();
        let a = e.assess(&input(&history, "cam-dock", "Axis"));
        let b = e.assess(&input(&history, "cam-dock", "Axis"));
        assert_eq!(a.classification, b.classification);
        assert_eq!(a.anomaly, b.anomaly);
        assert_eq!(a.maintenance, b.maintenance);
        assert_eq!(a.health_score, b.health_score);
    }

    #[test]
    fn test_health_score_formula() {
        let maintenance = MaintenanceAnalysis {
            failure_probability: 0.2,
            uptime_prediction: 0.9,
            urgency: Urgency::Low,
            confidence: 0.8,
        };
        let anomaly = AnomalyAnalysis {
            is_anomaly: false,
            score: 0.1,
            confidence: 0.1,
            recent_anomalies: 0,
        };
        let classification = Classification {
            device_type: DeviceType::Server,
            confidence: 0.9,
            features: Vec::new(),
        };

        // 0.5·80 + 0.3·55 + 0.2·90 = 74.5
        let score = health_score(&maintenance, &anomaly, &classification);
        assert!((score - 74.5).abs() < 1e-9);
    }

    #[test]
    fn test_health_score_clamps_negative_anomaly_part() {
        let maintenance = MaintenanceAnalysis::neutral();
        let anomaly = AnomalyAnalysis {
            is_anomaly: true,
            score: -3.0,
            confidence: 1.0,
            recent_anomalies: 5,
        };
        let classification = Classification::neutral();

        // Anomaly part floors at 0 instead of going negative.
        let score = health_score(&maintenance, &anomaly, &classification);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_confidence_is_mean_of_three() {
        let classification = Classification {
            device_type: DeviceType::Plc,
            confidence: 0.9,
            features: Vec::new(),
        };
        let anomaly = AnomalyAnalysis {
            is_anomaly: false,
            score: -0.3,
            confidence: 0.3,
            recent_anomalies: 0,
        };
        let maintenance = MaintenanceAnalysis {
            failure_probability: 0.3,
            uptime_prediction: 0.3,
            urgency: Urgency::Low,
            confidence: 0.6,
        };

        let confidence = aggregate_confidence(&classification, &anomaly, &maintenance);
        assert!((confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_training_swaps_models_and_reports() {
        let e = engine();

        let mut fleet = Vec::new();
        for i in 0..12 {
            let flags: Vec<bool> = (0..40).map(|j| (i + j) % 5 != 0).collect();
            fleet.push(TrainingSample {
                ip: Ipv4Addr::new(10, 0, 0, i as u8 + 1),
                hostname: format!("plc-unit-{}", i),
                mac_vendor: "Siemens AG".to_string(),
                history: history_from_flags(&flags),
                device_age: 40,
            });
        }

        let report = e.train(&fleet).unwrap();
        assert!(report.anomaly_trained);
        assert!(report.maintenance_trained);
        assert!(report.classifier_trained);
        assert_eq!(report.devices, 12);

        // A trained engine now produces non-neutral anomaly output.
        let history = history_from_flags(&[true; 20]);
        let assessment = e.assess(&input(&history, "plc-unit-0", "Siemens AG"));
        assert!(assessment.anomaly.confidence > 0.0);
    }

    #[test]
    fn test_training_below_gates_keeps_neutral_models() {
        let e = engine();
        let fleet = vec![TrainingSample {
            ip: Ipv4Addr::new(10, 0, 0, 1),
            hostname: "lone-device".to_string(),
            mac_vendor: String::new(),
            history: history_from_flags(&[true, true]),
            device_age: 2,
        }];

        let report = e.train(&fleet).unwrap();
        assert!(!report.anomaly_trained);
        assert!(!report.maintenance_trained);

        let history = history_from_flags(&[true, false, true]);
        let assessment = e.assess(&input(&history, "lone-device", ""));
        assert_eq!(assessment.anomaly.score, 0.0);
        assert_eq!(assessment.maintenance.failure_probability, 0.0);
    }
}
