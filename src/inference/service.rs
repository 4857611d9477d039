use std::path::Path;

use tracing::{debug, info};

use super::labels::{argmax, softmax, LabelEncoder, EMOTION_LABELS};
use super::{Classifier, InferenceError};
use crate::config::AppConfig;
use crate::model::TfClassifier;
use crate::preprocess::{audio::N_MFCC, preprocess_image, AudioPreprocessor, FeatureVector};

/// The selected label and the distribution it was picked from.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub label: String,
    pub probabilities: Vec<f32>,
}

/// Both emotion classifiers, loaded once at startup and shared by every request.
pub struct EmotionService {
    image_model: Box<dyn Classifier>,
    audio_model: Box<dyn Classifier>,
    encoder: LabelEncoder,
    audio: AudioPreprocessor,
    audio_input_dims: Vec<u64>,
}

impl EmotionService {
    pub fn new(
        image_model: Box<dyn Classifier>,
        audio_model: Box<dyn Classifier>,
        encoder: LabelEncoder,
        audio_input_dims: Vec<u64>,
    ) -> Result<Self, InferenceError> {
        if audio_input_dims.iter().product::<u64>() != N_MFCC as u64 {
            return Err(InferenceError::InputShape {
                dims: audio_input_dims,
                actual: N_MFCC,
            });
        }

        Ok(Self {
            image_model,
            audio_model,
            encoder,
            audio: AudioPreprocessor::new(),
            audio_input_dims,
        })
    }

    /// Load the TensorFlow graphs and the label encoder named in `config`.
    pub fn load(config: &AppConfig) -> Result<Self, InferenceError> {
        let image_model = TfClassifier::load(
            &config.image.model_path,
            &config.image.input_op,
            &config.image.output_op,
        )?;
        let audio_model = TfClassifier::load(
            &config.audio.model_path,
            &config.audio.input_op,
            &config.audio.output_op,
        )?;
        let encoder = LabelEncoder::load(&config.audio.encoder_path)?;

        info!(
            image_model = %config.image.model_path.display(),
            audio_model = %config.audio.model_path.display(),
            audio_classes = encoder.len(),
            "Models loaded"
        );

        Self::new(
            Box::new(image_model),
            Box::new(audio_model),
            encoder,
            config.audio.input_dims.clone(),
        )
    }

    pub fn classify_image(&self, path: &Path) -> Result<InferenceResult, InferenceError> {
        let features = preprocess_image(path)?;
        self.classify_image_features(&features)
    }

    pub fn classify_image_features(
        &self,
        features: &FeatureVector,
    ) -> Result<InferenceResult, InferenceError> {
        let logits = self.image_model.predict(features)?;
        if logits.len() != EMOTION_LABELS.len() {
            return Err(InferenceError::OutputShape {
                expected: EMOTION_LABELS.len(),
                actual: logits.len(),
            });
        }

        let index = argmax(&logits)
            .ok_or_else(|| InferenceError::Model("image model produced no finite logits".into()))?;
        let probabilities = softmax(&logits);
        debug!(?probabilities, index, "Image classified");

        Ok(InferenceResult {
            label: EMOTION_LABELS[index].to_string(),
            probabilities,
        })
    }

    pub fn classify_audio(&self, path: &Path) -> Result<InferenceResult, InferenceError> {
        let features = self.audio.preprocess(path)?;
        self.classify_audio_features(features)
    }

    pub fn classify_audio_features(
        &self,
        features: FeatureVector,
    ) -> Result<InferenceResult, InferenceError> {
        let actual = features.len();
        let features =
            features
                .reshaped(&self.audio_input_dims)
                .ok_or_else(|| InferenceError::InputShape {
                    dims: self.audio_input_dims.clone(),
                    actual,
                })?;

        let probabilities = self.audio_model.predict(&features)?;
        if probabilities.len() != self.encoder.len() {
            return Err(InferenceError::OutputShape {
                expected: self.encoder.len(),
                actual: probabilities.len(),
            });
        }

        let index = argmax(&probabilities)
            .ok_or_else(|| InferenceError::Model("audio model produced no finite outputs".into()))?;

        // The encoder only decodes one-hot rows, so rebuild one for the winner.
        let one_hot = self.encoder.one_hot(index)?;
        let label = self.encoder.inverse_transform(&one_hot)?.to_string();
        debug!(?probabilities, %label, "Audio classified");

        Ok(InferenceResult {
            label,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    impl Classifier for Fixed {
        fn predict(&self, _input: &FeatureVector) -> Result<Vec<f32>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    fn service(image: Vec<f32>, audio: Vec<f32>) -> EmotionService {
        let encoder =
            LabelEncoder::new(vec!["angry".into(), "calm".into(), "sad".into()]).unwrap();
        EmotionService::new(Box::new(Fixed(image)), Box::new(Fixed(audio)), encoder, vec![1, 40])
            .unwrap()
    }

    fn image_features() -> FeatureVector {
        FeatureVector::new(vec![0.0; 3 * 224 * 224], vec![1, 3, 224, 224])
    }

    #[test]
    fn test_image_label_from_argmax() {
        let svc = service(vec![0.1, 0.0, 0.2, 3.0, 0.4, 0.5, 0.6], vec![1.0, 0.0, 0.0]);
        let result = svc.classify_image_features(&image_features()).unwrap();
        assert_eq!(result.label, "Happy");
        assert_eq!(result.probabilities.len(), 7);
    }

    #[test]
    fn test_image_output_width_checked() {
        let svc = service(vec![0.1, 0.2], vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            svc.classify_image_features(&image_features()),
            Err(InferenceError::OutputShape { expected: 7, actual: 2 })
        ));
    }

    #[test]
    fn test_audio_label_through_encoder() {
        let svc = service(vec![0.0; 7], vec![0.1, 0.2, 0.7]);
        let result = svc
            .classify_audio_features(FeatureVector::new(vec![0.0; 40], vec![1, 40]))
            .unwrap();
        assert_eq!(result.label, "sad");
    }

    #[test]
    fn test_audio_output_width_checked() {
        let svc = service(vec![0.0; 7], vec![0.5, 0.5]);
        assert!(svc
            .classify_audio_features(FeatureVector::new(vec![0.0; 40], vec![1, 40]))
            .is_err());
    }

    #[test]
    fn test_bad_audio_dims_rejected_at_construction() {
        let encoder = LabelEncoder::new(vec!["a".into()]).unwrap();
        let result = EmotionService::new(
            Box::new(Fixed(vec![])),
            Box::new(Fixed(vec![])),
            encoder,
            vec![1, 13],
        );
        assert!(matches!(result, Err(InferenceError::InputShape { .. })));
    }
}
