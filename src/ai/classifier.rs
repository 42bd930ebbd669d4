//! Device classification
//!
//! Two stages: a rule layer over hostname/vendor tokens with fixed
//! confidences, then a trained nearest-centroid classifier over the static
//! feature vector. Devices neither stage recognizes fall back to the
//! gateway-octet hint or `unknown`.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::features::static_features;
use super::scaler::StandardScaler;
use super::Classification;
use crate::models::DeviceType;

/// Centroid matches below this confidence fall through to the hint stage.
const MIN_CENTROID_CONFIDENCE: f64 = 0.5;

struct Rule {
    device_type: DeviceType,
    confidence: f64,
    hostname_tokens: &'static [&'static str],
    vendor_tokens: &'static [&'static str],
}

/// Strong token rules, evaluated in order; first hit wins.
const RULES: &[Rule] = &[
    Rule {
        device_type: DeviceType::Server,
        confidence: 0.95,
        hostname_tokens: &[
            "server", "srv", "dc-", "domain", "exchange", "sql", "web-", "nas", "synology", "qnap",
        ],
        vendor_tokens: &["synology", "qnap"],
    },
    Rule {
        device_type: DeviceType::Switch,
        confidence: 0.92,
        hostname_tokens: &["switch", "sw-", "hub", "aruba", "procurve", "h3c"],
        vendor_tokens: &["aruba", "h3c", "zyxel", "tenda"],
    },
    Rule {
        device_type: DeviceType::Phone,
        confidence: 0.91,
        hostname_tokens: &[
            "phone", "voip", "sip-", "polycom", "yealink", "avaya", "iphone", "android", "ipad",
            "tablet",
        ],
        vendor_tokens: &["apple", "samsung", "xiaomi", "oneplus", "oppo", "vivo", "polycom", "yealink", "avaya"],
    },
    Rule {
        device_type: DeviceType::Printer,
        confidence: 0.90,
        hostname_tokens: &[
            "printer", "print", "canon", "epson", "brother", "xerox", "ricoh", "lexmark", "kyocera",
        ],
        vendor_tokens: &["canon", "epson", "brother", "xerox", "ricoh", "lexmark", "kyocera"],
    },
    Rule {
        device_type: DeviceType::Router,
        confidence: 0.90,
        hostname_tokens: &[
            "router", "gateway", "gw-", "firewall", "fw-", "core", "box", "modem", "livebox",
            "freebox", "mikrotik", "ubiquiti",
        ],
        vendor_tokens: &[
            "cisco", "netgear", "tp-link", "tplink", "d-link", "dlink", "juniper", "fortinet",
            "mikrotik", "ubiquiti", "linksys", "zte", "sagem", "technicolor",
        ],
    },
    Rule {
        device_type: DeviceType::Plc,
        confidence: 0.89,
        hostname_tokens: &[
            "plc", "automation", "automate", "scada", "hmi", "control", "abb", "mitsubishi",
            "omron",
        ],
        vendor_tokens: &["siemens", "schneider", "abb", "mitsubishi", "omron", "rockwell"],
    },
    Rule {
        device_type: DeviceType::Camera,
        confidence: 0.88,
        hostname_tokens: &[
            "camera", "ipcam", "cctv", "surveillance", "hikvision", "dahua", "foscam", "axis",
        ],
        vendor_tokens: &["hikvision", "dahua", "foscam", "arlo", "axis", "bosch"],
    },
    Rule {
        device_type: DeviceType::Workstation,
        confidence: 0.85,
        hostname_tokens: &[
            "pc-", "-pc", "workstation", "desktop", "laptop", "client", "poste", "macbook", "imac",
        ],
        vendor_tokens: &["lenovo", "dell", "asus", "acer", "msi", "hewlett", "intel"],
    },
];

fn contains_any(haystack: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|token| haystack.contains(token))
}

/// Stage one: strong hostname/vendor token rules.
pub fn rule_classify(hostname: &str, mac_vendor: &str) -> Option<(DeviceType, f64)> {
    let hostname_lower = hostname.to_lowercase();
    let vendor_lower = mac_vendor.to_lowercase();

    for rule in RULES {
        if contains_any(&hostname_lower, rule.hostname_tokens)
            || contains_any(&vendor_lower, rule.vendor_tokens)
        {
            return Some((rule.device_type, rule.confidence));
        }
    }
    None
}

/// Gateway-octet hint: .1 and .254 hosts default to routers.
fn octet_hint(ip: Ipv4Addr) -> Option<(DeviceType, f64)> {
    let last = ip.octets()[3];
    if last == 1 || last == 254 {
        Some((DeviceType::Router, 0.80))
    } else {
        None
    }
}

/// Stage two: nearest-centroid model over the static feature vector,
/// trained from rule-labeled devices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CentroidClassifier {
    scaler: StandardScaler,
    centroids: Vec<(DeviceType, Vec<f64>)>,
}

impl CentroidClassifier {
    pub fn is_fitted(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Fit one centroid per labeled class.
    pub fn train(&mut self, samples: &[(DeviceType, Vec<f64>)]) -> bool {
        if samples.is_empty() {
            return false;
        }

        let vectors: Vec<Vec<f64>> = samples.iter().map(|(_, v)| v.clone()).collect();
        let scaler = StandardScaler::fit(&vectors);

        let mut sums: HashMap<DeviceType, (Vec<f64>, usize)> = HashMap::new();
        for (device_type, vector) in samples {
            let scaled = scaler.transform(vector);
            let entry = sums
                .entry(*device_type)
                .or_insert_with(|| (vec![0.0; scaled.len()], 0));
            for (acc, value) in entry.0.iter_mut().zip(scaled.iter()) {
                *acc += value;
            }
            entry.1 += 1;
        }

        let mut centroids: Vec<(DeviceType, Vec<f64>)> = sums
            .into_iter()
            .map(|(device_type, (sum, count))| {
                let centroid = sum.iter().map(|v| v / count as f64).collect();
                (device_type, centroid)
            })
            .collect();
        // Stable order keeps retrained artifacts comparable.
        centroids.sort_by_key(|(device_type, _)| device_type.as_str());

        self.scaler = scaler;
        self.centroids = centroids;
        true
    }

    /// Nearest centroid with a distance-derived confidence.
    pub fn classify(&self, features: &[f64]) -> Option<(DeviceType, f64)> {
        if self.centroids.is_empty() {
            return None;
        }

        let scaled = self.scaler.transform(features);
        let mut best: Option<(DeviceType, f64)> = None;

        for (device_type, centroid) in &self.centroids {
            if centroid.len() != scaled.len() {
                continue;
            }
            let distance: f64 = centroid
                .iter()
                .zip(scaled.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();

            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((*device_type, distance)),
            }
        }

        let (device_type, distance) = best?;
        let confidence = 1.0 / (1.0 + distance);
        if confidence < MIN_CENTROID_CONFIDENCE {
            return None;
        }
        Some((device_type, confidence))
    }
}

/// Full two-stage classification with fallbacks.
pub fn classify(
    model: &CentroidClassifier,
    hostname: &str,
    mac_vendor: &str,
    ip: Ipv4Addr,
) -> Classification {
    let features = static_features(hostname, mac_vendor, ip);

    let result = rule_classify(hostname, mac_vendor)
        .or_else(|| model.classify(&features))
        .or_else(|| octet_hint(ip))
        .unwrap_or((DeviceType::Unknown, 0.60));

    Classification {
        device_type: result.0,
        confidence: result.1,
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_classifies_plc_from_hostname() {
        let result = rule_classify("PLC-LINE1", "");
        assert_eq!(result, Some((DeviceType::Plc, 0.89)));
    }

    #[test]
    fn test_rule_classifies_plc_from_vendor() {
        let result = rule_classify("unit-7", "Siemens AG");
        assert_eq!(result, Some((DeviceType::Plc, 0.89)));
    }

    #[test]
    fn test_rule_precedence_server_over_workstation() {
        // "sql" (server) appears before workstation tokens in rule order.
        let result = rule_classify("sql-desktop", "");
        assert_eq!(result, Some((DeviceType::Server, 0.95)));
    }

    #[test]
    fn test_octet_hint_for_gateway_addresses() {
        let classification = classify(
            &CentroidClassifier::default(),
            "",
            "",
            Ipv4Addr::new(192, 168, 1, 1),
        );
        assert_eq!(classification.device_type, DeviceType::Router);
        assert_eq!(classification.confidence, 0.80);

        let classification = classify(
            &CentroidClassifier::default(),
            "",
            "",
            Ipv4Addr::new(192, 168, 1, 254),
        );
        assert_eq!(classification.device_type, DeviceType::Router);
    }

    #[test]
    fn test_unknown_fallback() {
        let classification = classify(
            &CentroidClassifier::default(),
            "mystery-host",
            "",
            Ipv4Addr::new(192, 168, 1, 42),
        );
        assert_eq!(classification.device_type, DeviceType::Unknown);
        assert_eq!(classification.confidence, 0.60);
        assert!(!classification.features.is_empty());
    }

    #[test]
    fn test_centroid_classifier_recovers_trained_classes() {
        let plc = static_features("plc-a", "Siemens", Ipv4Addr::new(10, 0, 0, 20));
        let plc2 = static_features("plc-b", "Schneider", Ipv4Addr::new(10, 0, 0, 21));
        let printer = static_features("printer-1", "Brother", Ipv4Addr::new(10, 0, 0, 60));
        let printer2 = static_features("print-hall", "Epson", Ipv4Addr::new(10, 0, 0, 61));

        let mut model = CentroidClassifier::default();
        assert!(model.train(&[
            (DeviceType::Plc, plc.clone()),
            (DeviceType::Plc, plc2),
            (DeviceType::Printer, printer),
            (DeviceType::Printer, printer2),
        ]));

        let (device_type, confidence) = model.classify(&plc).expect("trained class should match");
        assert_eq!(device_type, DeviceType::Plc);
        assert!(confidence > MIN_CENTROID_CONFIDENCE);
    }

    #[test]
    fn test_untrained_centroid_returns_none() {
        let model = CentroidClassifier::default();
        assert!(model.classify(&[0.0; 18]).is_none());
    }
}
