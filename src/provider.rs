//! Prediction capability boundary
//!
//! The model under explanation is supplied by the caller as an asynchronous
//! batch-prediction capability. The explainer performs exactly one batched
//! call per explanation; retries, caching, and transport concerns belong to
//! the implementation behind this trait.

use crate::error::Result;
use crate::features::{PredictionInput, PredictionOutput};

/// Asynchronous batch-prediction capability supplied by the caller.
///
/// Implementations must return one output per input, in input order, with a
/// consistent number and ordering of output dimensions across invocations
/// against the same model.
pub trait PredictionProvider: Send + Sync {
    fn predict_batch(
        &self,
        inputs: &[PredictionInput],
    ) -> impl std::future::Future<Output = Result<Vec<PredictionOutput>>> + Send;
}
