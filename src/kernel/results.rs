//! Attribution results: solved coefficients mapped back onto named features

use serde::{Deserialize, Serialize};

use crate::features::Feature;

/// Attribution of one feature to one output dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAttribution {
    /// The instance's feature this score belongs to
    pub feature: Feature,
    /// Attribution score (link-space Shapley coefficient)
    pub score: f64,
    /// Symmetric confidence half-width around the score
    pub confidence: f64,
}

/// Per-output-dimension attribution list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saliency {
    /// Name of the output dimension these attributions explain
    pub output_name: String,
    /// One attribution per feature, in instance feature order
    pub attributions: Vec<FeatureAttribution>,
}

impl Saliency {
    /// Sum of attribution scores; adding the baseline for this dimension
    /// recovers the model's own prediction.
    pub fn total_score(&self) -> f64 {
        self.attributions.iter().map(|a| a.score).sum()
    }

    /// Attributions sorted by absolute score, descending.
    pub fn sorted_by_magnitude(&self) -> Vec<&FeatureAttribution> {
        let mut sorted: Vec<&FeatureAttribution> = self.attributions.iter().collect();
        sorted.sort_by(|a, b| {
            b.score
                .abs()
                .partial_cmp(&a.score.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    /// The k largest attributions by magnitude.
    pub fn top_k(&self, k: usize) -> Vec<&FeatureAttribution> {
        self.sorted_by_magnitude().into_iter().take(k).collect()
    }

    /// Attributions pushing the prediction above the baseline.
    pub fn positive(&self) -> Vec<&FeatureAttribution> {
        self.attributions.iter().filter(|a| a.score > 0.0).collect()
    }

    /// Attributions pulling the prediction below the baseline.
    pub fn negative(&self) -> Vec<&FeatureAttribution> {
        self.attributions.iter().filter(|a| a.score < 0.0).collect()
    }
}

/// Complete result of one explanation: one saliency per output dimension
/// plus the baseline ("null") output vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapResults {
    pub saliencies: Vec<Saliency>,
    /// Expected model output with every feature drawn from the background,
    /// in link space. Per dimension, the attribution scores plus this
    /// baseline recover the link of the model's own prediction.
    pub fnull: Vec<f64>,
}

impl ShapResults {
    /// Saliency for a named output dimension, if present.
    pub fn saliency(&self, output_name: &str) -> Option<&Saliency> {
        self.saliencies.iter().find(|s| s.output_name == output_name)
    }
}
