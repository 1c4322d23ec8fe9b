//! Kernel SHAP explainer
//!
//! Estimates, for a single prediction of a black-box model, how much each
//! input feature contributed to each output dimension. The pipeline per
//! explanation is linear: coalition sampling and synthetic data generation
//! (CPU-bound), one batched asynchronous prediction call, then the
//! constrained weighted regression and result assembly.
//!
//! The defining correctness property is Shapley efficiency: per output
//! dimension, the attribution scores sum to the difference between the
//! model's own prediction and the background baseline.

mod results;
mod sampler;
mod solver;
mod stats;
mod synthesis;

pub use results::{FeatureAttribution, Saliency, ShapResults};

use std::sync::Arc;
use std::time::Duration;

use ndarray::{Array1, Array2};
use parking_lot::RwLock;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ShapError};
use crate::features::{Prediction, PredictionInput, PredictionOutput};
use crate::provider::PredictionProvider;

/// Link function applied to the regression response and baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    /// Explain raw model outputs
    Identity,
    /// Explain log-odds of probability outputs
    Logit,
}

impl LinkType {
    /// Map a raw model output into link space.
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            LinkType::Identity => value,
            LinkType::Logit => {
                // Clamp away from {0, 1} so probabilities at the boundary
                // stay finite in log-odds space.
                let p = value.clamp(1e-9, 1.0 - 1e-9);
                (p / (1.0 - p)).ln()
            }
        }
    }
}

/// Policy limiting how many features receive non-zero attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regularizer {
    /// Fit every varying feature
    None,
    /// Keep the k features most correlated with the response
    TopK(usize),
    /// Choose the active-set size minimizing the Akaike criterion
    Aic,
    /// Choose the active-set size minimizing the Bayesian criterion
    Bic,
}

/// Configuration for one explainer, captured immutably per call.
#[derive(Debug, Clone)]
pub struct ShapConfig {
    background: Vec<PredictionInput>,
    link: LinkType,
    n_samples: Option<usize>,
    seed: Option<u64>,
    confidence: f64,
    regularizer: Regularizer,
}

impl ShapConfig {
    /// Create a configuration over a non-empty background dataset.
    pub fn new(background: Vec<PredictionInput>) -> Result<Self> {
        if background.is_empty() {
            return Err(ShapError::ConfigError(
                "background dataset must not be empty".to_string(),
            ));
        }
        Ok(Self {
            background,
            link: LinkType::Identity,
            n_samples: None,
            seed: None,
            confidence: 0.95,
            regularizer: Regularizer::None,
        })
    }

    pub fn with_link(mut self, link: LinkType) -> Self {
        self.link = link;
        self
    }

    /// Override the sample budget. Unset, the budget is `2 * M + 2048`,
    /// capped at the number of coalitions that exist.
    pub fn with_n_samples(mut self, n: usize) -> Self {
        self.n_samples = Some(n.max(1));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Two-sided confidence level for the reported interval half-widths,
    /// clamped into the open unit interval.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(1e-6, 1.0 - 1e-6);
        self
    }

    pub fn with_regularizer(mut self, regularizer: Regularizer) -> Self {
        self.regularizer = regularizer;
        self
    }

    pub fn background(&self) -> &[PredictionInput] {
        &self.background
    }
}

/// Kernel SHAP explainer over a replaceable configuration snapshot.
///
/// `explain` clones the current configuration before its first suspension
/// point, so concurrent explanations and `update_config` calls never observe
/// each other's state.
pub struct ShapKernelExplainer {
    config: RwLock<Arc<ShapConfig>>,
}

impl ShapKernelExplainer {
    pub fn new(config: ShapConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Atomically replace the configuration. In-flight explanations keep the
    /// snapshot they captured at start.
    pub fn update_config(&self, config: ShapConfig) {
        *self.config.write() = Arc::new(config);
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ShapConfig> {
        self.config.read().clone()
    }

    /// Explain one prediction against the supplied prediction capability.
    pub async fn explain<P: PredictionProvider>(
        &self,
        prediction: &Prediction,
        provider: &P,
    ) -> Result<ShapResults> {
        let config = self.config.read().clone();
        explain_with(&config, prediction, provider).await
    }

    /// Explain with a wall-clock bound on the whole pipeline. On timeout the
    /// entire result is discarded; no partial attribution is returned.
    pub async fn explain_with_timeout<P: PredictionProvider>(
        &self,
        prediction: &Prediction,
        provider: &P,
        timeout: Duration,
    ) -> Result<ShapResults> {
        match tokio::time::timeout(timeout, self.explain(prediction, provider)).await {
            Ok(result) => result,
            Err(_) => Err(ShapError::PredictionError(format!(
                "explanation timed out after {timeout:?}"
            ))),
        }
    }

    /// Explain several predictions sequentially under one config snapshot.
    pub async fn explain_all<P: PredictionProvider>(
        &self,
        predictions: &[Prediction],
        provider: &P,
    ) -> Result<Vec<ShapResults>> {
        let config = self.config.read().clone();
        let mut results = Vec::with_capacity(predictions.len());
        for prediction in predictions {
            results.push(explain_with(&config, prediction, provider).await?);
        }
        Ok(results)
    }
}

/// Numeric regression response from output dimension `d`.
fn numeric_output(output: &PredictionOutput, d: usize) -> Result<f64> {
    output.outputs[d].as_number().ok_or_else(|| {
        ShapError::PredictionError(format!(
            "output '{}' has no numeric value",
            output.outputs[d].name
        ))
    })
}

/// Synchronous validation: everything here fails before any prediction call.
fn validate(config: &ShapConfig, prediction: &Prediction) -> Result<()> {
    let m = prediction.input.len();
    if m == 0 {
        return Err(ShapError::ValidationError(
            "instance to explain has no features".to_string(),
        ));
    }
    if prediction.output.is_empty() {
        return Err(ShapError::ValidationError(
            "prediction has no output dimensions".to_string(),
        ));
    }
    for (idx, row) in config.background.iter().enumerate() {
        if row.len() != m {
            return Err(ShapError::ShapeError {
                expected: format!("{m} features per background row"),
                actual: format!("{} features in row {idx}", row.len()),
            });
        }
    }
    if m >= 2 {
        let coalitions = sampler::coalition_count(m);
        if config.background.len() > coalitions {
            return Err(ShapError::ValidationError(format!(
                "background has {} rows but only {} coalitions are derivable for {} features",
                config.background.len(),
                coalitions,
                m
            )));
        }
    }
    Ok(())
}

/// Check a prediction batch result against the instance's own output shape.
fn validate_outputs(
    outputs: &[PredictionOutput],
    expected_len: usize,
    n_outputs: usize,
) -> Result<()> {
    if outputs.len() != expected_len {
        return Err(ShapError::PredictionError(format!(
            "prediction capability returned {} outputs for {} inputs",
            outputs.len(),
            expected_len
        )));
    }
    for output in outputs {
        if output.len() != n_outputs {
            return Err(ShapError::PredictionError(format!(
                "prediction capability returned {} output dimensions, instance prediction has {}",
                output.len(),
                n_outputs
            )));
        }
    }
    Ok(())
}

async fn explain_with<P: PredictionProvider>(
    config: &ShapConfig,
    prediction: &Prediction,
    provider: &P,
) -> Result<ShapResults> {
    validate(config, prediction)?;

    let instance = &prediction.input;
    let m = instance.len();
    let n_outputs = prediction.output.len();

    // Single feature: the regression is trivial, the whole shift between
    // baseline and prediction belongs to the one feature.
    if m == 1 {
        let mut batch = config.background.clone();
        batch.push(instance.clone());
        let outputs = provider.predict_batch(&batch).await?;
        validate_outputs(&outputs, batch.len(), n_outputs)?;

        let n_bg = config.background.len() as f64;
        let mut fnull = vec![0.0; n_outputs];
        for output in &outputs[..outputs.len() - 1] {
            for (d, v) in fnull.iter_mut().enumerate() {
                *v += numeric_output(output, d)?;
            }
        }
        for v in &mut fnull {
            *v /= n_bg;
        }
        let last = &outputs[outputs.len() - 1];
        let solved = (0..n_outputs)
            .map(|d| {
                let fx = numeric_output(last, d)?;
                Ok(solver::SolvedDimension {
                    scores: vec![config.link.apply(fx) - config.link.apply(fnull[d])],
                    half_widths: vec![0.0],
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let fnull = fnull.iter().map(|&v| config.link.apply(v)).collect();
        return Ok(assemble(prediction, &solved, fnull));
    }

    let budget = config
        .n_samples
        .unwrap_or_else(|| sampler::default_sample_budget(m))
        .min(sampler::coalition_count(m));
    let mut rng = match config.seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    };

    let plan = sampler::sample_coalitions(m, budget, &mut rng);
    let mut batch = synthesis::generate_samples(instance, &config.background, &plan.samples);
    batch.push(instance.clone());
    debug!(
        coalitions = plan.samples.len() - 2,
        batch = batch.len(),
        "issuing prediction batch"
    );

    let outputs = provider.predict_batch(&batch).await?;
    validate_outputs(&outputs, batch.len(), n_outputs)?;

    // Average model outputs per mask across its background rows.
    let n_bg = config.background.len();
    let n_masks = plan.samples.len();
    let mut mask_means = Array2::zeros((n_masks, n_outputs));
    for (r, chunk) in outputs[..n_masks * n_bg].chunks(n_bg).enumerate() {
        for d in 0..n_outputs {
            let mut acc = 0.0;
            for output in chunk {
                acc += numeric_output(output, d)?;
            }
            mask_means[[r, d]] = acc / n_bg as f64;
        }
    }

    // Baseline: all-absent mask rows are the background itself. The
    // instance's own prediction rides at the end of the batch.
    let fnull: Vec<f64> = (0..n_outputs).map(|d| mask_means[[0, d]]).collect();
    let last = &outputs[outputs.len() - 1];
    let fx = (0..n_outputs)
        .map(|d| numeric_output(last, d))
        .collect::<Result<Vec<f64>>>()?;

    // A feature whose value never differs between the instance and the
    // background produces a constant synthetic column; it is excluded from
    // the regression and attributed exactly zero.
    let varying: Vec<usize> = (0..m)
        .filter(|&j| {
            config
                .background
                .iter()
                .any(|row| row.features[j].value() != instance.features[j].value())
        })
        .collect();

    let design = plan.design_samples();
    let n = design.len();
    let mut x = Array2::zeros((n, varying.len()));
    let mut w = Array1::zeros(n);
    for (i, sample) in design.iter().enumerate() {
        for (jj, &j) in varying.iter().enumerate() {
            if sample.mask[j] {
                x[[i, jj]] = 1.0;
            }
        }
        w[i] = sample.weight;
    }

    let z = solver::normal_quantile(0.5 + config.confidence / 2.0);
    let solved = (0..n_outputs)
        .into_par_iter()
        .map(|d| -> Result<solver::SolvedDimension> {
            let y = Array1::from_iter((0..n).map(|i| config.link.apply(mask_means[[i + 2, d]])));
            let reduced = solver::solve_dimension(
                &x,
                &w,
                &y,
                config.link.apply(fnull[d]),
                config.link.apply(fx[d]),
                &config.regularizer,
                z,
            )?;

            // Scatter the reduced solution back over the full feature set.
            let mut scores = vec![0.0; m];
            let mut half_widths = vec![0.0; m];
            for (jj, &j) in varying.iter().enumerate() {
                scores[j] = reduced.scores[jj];
                half_widths[j] = reduced.half_widths[jj];
            }
            Ok(solver::SolvedDimension {
                scores,
                half_widths,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // The baseline is reported in link space so the efficiency identity
    // (scores + baseline = link of the prediction) holds for every link.
    let fnull = fnull.iter().map(|&v| config.link.apply(v)).collect();
    Ok(assemble(prediction, &solved, fnull))
}

fn assemble(
    prediction: &Prediction,
    solved: &[solver::SolvedDimension],
    fnull: Vec<f64>,
) -> ShapResults {
    let saliencies = solved
        .iter()
        .enumerate()
        .map(|(d, dimension)| Saliency {
            output_name: prediction.output.outputs[d].name.clone(),
            attributions: prediction
                .input
                .features
                .iter()
                .zip(dimension.scores.iter().zip(dimension.half_widths.iter()))
                .map(|(feature, (&score, &confidence))| FeatureAttribution {
                    feature: feature.clone(),
                    score,
                    confidence,
                })
                .collect(),
        })
        .collect();

    ShapResults { saliencies, fnull }
}
