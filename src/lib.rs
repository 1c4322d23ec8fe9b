//! Kernel SHAP feature attribution for black-box models
//!
//! This crate estimates, for a single prediction made by an opaque model,
//! how much each input feature contributed to each output dimension. The
//! model is consumed purely as an asynchronous batch-prediction capability;
//! no training, hosting, or format conversion happens here.
//!
//! # Modules
//!
//! - [`features`] - Feature, input, and output data model
//! - [`provider`] - The asynchronous prediction capability boundary
//! - [`kernel`] - The Kernel SHAP explainer: coalition sampling, synthetic
//!   data generation, constrained weighted regression, result assembly
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```no_run
//! use kernelshap::prelude::*;
//!
//! # struct MyModel;
//! # impl PredictionProvider for MyModel {
//! #     async fn predict_batch(
//! #         &self,
//! #         inputs: &[PredictionInput],
//! #     ) -> kernelshap::Result<Vec<PredictionOutput>> {
//! #         unimplemented!()
//! #     }
//! # }
//! # async fn run(background: Vec<PredictionInput>, prediction: Prediction) -> kernelshap::Result<()> {
//! let config = ShapConfig::new(background)?.with_seed(42);
//! let explainer = ShapKernelExplainer::new(config);
//! let results = explainer.explain(&prediction, &MyModel).await?;
//! for saliency in &results.saliencies {
//!     println!("{}: {:+.4}", saliency.output_name, saliency.total_score());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod features;
pub mod kernel;
pub mod provider;

mod linalg;

pub use error::{Result, ShapError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, ShapError};
    pub use crate::features::{
        Feature, FeatureKind, FeatureValue, Output, Prediction, PredictionInput, PredictionOutput,
    };
    pub use crate::kernel::{
        FeatureAttribution, LinkType, Regularizer, Saliency, ShapConfig, ShapKernelExplainer,
        ShapResults,
    };
    pub use crate::provider::PredictionProvider;
}
