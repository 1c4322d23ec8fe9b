//! Feature and prediction data model
//!
//! The explainer treats the model as a black box over ordered feature
//! vectors. Feature order is significant: the instance being explained,
//! every background row, and every synthetic sample must share the same
//! feature count and ordering.

use serde::{Deserialize, Serialize};

/// Type tag for a feature value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Number,
    Boolean,
    Categorical,
    Text,
    Vector,
    Composite,
}

/// Typed value carried by a [`Feature`] or an [`Output`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Number(f64),
    Boolean(bool),
    Categorical(String),
    Text(String),
    Vector(Vec<f64>),
    Composite(Vec<Feature>),
}

impl FeatureValue {
    /// Type tag for this value
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureValue::Number(_) => FeatureKind::Number,
            FeatureValue::Boolean(_) => FeatureKind::Boolean,
            FeatureValue::Categorical(_) => FeatureKind::Categorical,
            FeatureValue::Text(_) => FeatureKind::Text,
            FeatureValue::Vector(_) => FeatureKind::Vector,
            FeatureValue::Composite(_) => FeatureKind::Composite,
        }
    }

    /// Numeric projection. Booleans map to 0/1; non-numeric kinds have none.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// A named, typed feature. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    name: String,
    value: FeatureValue,
}

impl Feature {
    pub fn new(name: impl Into<String>, value: FeatureValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, FeatureValue::Number(value))
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, FeatureValue::Boolean(value))
    }

    pub fn categorical(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, FeatureValue::Categorical(value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &FeatureValue {
        &self.value
    }

    pub fn kind(&self) -> FeatureKind {
        self.value.kind()
    }

    /// Copy of this feature carrying a different value. Name and position
    /// semantics are preserved; only the value is swapped.
    pub(crate) fn with_value(&self, value: FeatureValue) -> Feature {
        Feature {
            name: self.name.clone(),
            value,
        }
    }
}

/// Ordered sequence of features fed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub features: Vec<Feature>,
}

impl PredictionInput {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// One named, typed, scored output dimension produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub value: FeatureValue,
    pub score: f64,
}

impl Output {
    pub fn new(name: impl Into<String>, value: FeatureValue, score: f64) -> Self {
        Self {
            name: name.into(),
            value,
            score,
        }
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, FeatureValue::Number(value), 1.0)
    }

    /// Numeric projection of the output value, used as the regression response.
    pub fn as_number(&self) -> Option<f64> {
        self.value.as_number()
    }
}

/// Ordered sequence of outputs produced by the model for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub outputs: Vec<Output>,
}

impl PredictionOutput {
    pub fn new(outputs: Vec<Output>) -> Self {
        Self { outputs }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// An input together with its already-known model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub input: PredictionInput,
    pub output: PredictionOutput,
}

impl Prediction {
    pub fn new(input: PredictionInput, output: PredictionOutput) -> Self {
        Self { input, output }
    }
}
