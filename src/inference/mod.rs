//! Model invocation and label mapping.

mod labels;
mod service;

use thiserror::Error;

use crate::preprocess::{FeatureVector, PreprocessError};

pub use labels::{argmax, softmax, LabelEncoder, EMOTION_LABELS};
pub use service::{EmotionService, InferenceResult};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model returned {actual} outputs, expected {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("Feature vector of {actual} values does not fit input shape {dims:?}")]
    InputShape { dims: Vec<u64>, actual: usize },

    #[error("Label encoder error: {0}")]
    Encoder(String),

    #[error("Inference task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A preloaded model that maps one feature vector to one output row.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &FeatureVector) -> Result<Vec<f32>, InferenceError>;
}
