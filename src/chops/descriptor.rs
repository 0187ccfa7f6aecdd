// Chop descriptors
// Short human-readable labels derived from a segment's feature snapshot

use serde::{Deserialize, Serialize};

use crate::chops::types::SegmentFeatures;

/// Thresholds for descriptor words
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorRules {
    /// Spectral centroid below this is "dark" (Hz)
    pub dark_centroid_hz: f32,

    /// Spectral centroid below this is "warm", above is "bright" (Hz)
    pub bright_centroid_hz: f32,

    /// Spectral flatness at or above this is "noisy"
    pub noisy_flatness: f32,

    /// RMS below this is "quiet"
    pub quiet_rms: f32,

    /// RMS at or above this is "loud"
    pub loud_rms: f32,

    /// Durations below this are "short" (seconds)
    pub short_secs: f64,

    /// Durations at or above this are "sustained" (seconds)
    pub sustained_secs: f64,
}

impl Default for DescriptorRules {
    fn default() -> Self {
        DescriptorRules {
            dark_centroid_hz: 800.0,
            bright_centroid_hz: 2500.0,
            noisy_flatness: 0.3,
            quiet_rms: 0.05,
            loud_rms: 0.2,
            short_secs: 0.5,
            sustained_secs: 2.0,
        }
    }
}

/// `"<tone>/<level>/<length>"`, e.g. `"bright/loud/short"`
pub fn describe(features: &SegmentFeatures, rules: &DescriptorRules) -> String {
    format!(
        "{}/{}/{}",
        tone(features, rules),
        level(features.rms, rules),
        length(features.duration, rules)
    )
}

fn tone(features: &SegmentFeatures, rules: &DescriptorRules) -> &'static str {
    if features.spectral_flatness >= rules.noisy_flatness {
        "noisy"
    } else if features.spectral_centroid < rules.dark_centroid_hz {
        "dark"
    } else if features.spectral_centroid < rules.bright_centroid_hz {
        "warm"
    } else {
        "bright"
    }
}

fn level(rms: f32, rules: &DescriptorRules) -> &'static str {
    if rms < rules.quiet_rms {
        "quiet"
    } else if rms < rules.loud_rms {
        "medium"
    } else {
        "loud"
    }
}

fn length(duration: f64, rules: &DescriptorRules) -> &'static str {
    if duration < rules.short_secs {
        "short"
    } else if duration < rules.sustained_secs {
        "medium"
    } else {
        "sustained"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(centroid: f32, flatness: f32, rms: f32, duration: f64) -> SegmentFeatures {
        SegmentFeatures {
            rms,
            spectral_centroid: centroid,
            spectral_flatness: flatness,
            ..SegmentFeatures::zero(duration)
        }
    }

    #[test]
    fn test_descriptor_words() {
        let rules = DescriptorRules::default();
        let words = |c, f, r, d| describe(&features(c, f, r, d), &rules);

        assert_eq!(words(300.0, 0.01, 0.3, 2.5), "dark/loud/sustained");
        assert_eq!(words(1200.0, 0.05, 0.1, 1.0), "warm/medium/medium");
        assert_eq!(words(5000.0, 0.1, 0.01, 0.2), "bright/quiet/short");
        assert_eq!(words(5000.0, 0.6, 0.25, 0.3), "noisy/loud/short");
    }

    #[test]
    fn test_threshold_boundaries() {
        let rules = DescriptorRules::default();
        let words = |c, f, r, d| describe(&features(c, f, r, d), &rules);

        assert_eq!(words(800.0, 0.0, 0.05, 0.5), "warm/medium/medium");
        assert_eq!(words(2500.0, 0.3, 0.2, 2.0), "noisy/loud/sustained");
    }

    #[test]
    fn test_zero_features_are_describable() {
        let rules = DescriptorRules::default();
        assert_eq!(describe(&SegmentFeatures::zero(0.0), &rules), "dark/quiet/short");
    }

    #[test]
    fn test_custom_rules() {
        let rules = DescriptorRules {
            short_secs: 0.1,
            ..DescriptorRules::default()
        };
        assert_eq!(
            describe(&features(300.0, 0.0, 0.0, 0.2), &rules),
            "dark/quiet/medium"
        );
    }
}
