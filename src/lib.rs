//! Emotion inference service.
//!
//! Serves a facial-emotion image classifier, an audio-emotion classifier and a
//! relay to a hosted generative-language model over plain JSON HTTP routes.

pub mod chat;
pub mod config;
pub mod error;
pub mod inference;
pub mod model;
pub mod preprocess;
pub mod server;
pub mod upload;
pub mod utils;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use inference::{Classifier, EmotionService, InferenceResult, LabelEncoder, EMOTION_LABELS};
