use std::path::Path;

use serde::Deserialize;

use super::InferenceError;

/// FER-2013 classes, in the order the image classifier emits logits.
pub const EMOTION_LABELS: [&str; 7] = [
    "Angry", "Disgust", "Fear", "Happy", "Neutral", "Sad", "Surprise",
];

/// Fitted category encoder persisted alongside the audio classifier.
///
/// Stored as `{"categories": ["angry", "calm", ...]}`; category order fixes the
/// one-hot column each label maps to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelEncoder {
    categories: Vec<String>,
}

impl LabelEncoder {
    pub fn new(categories: Vec<String>) -> Result<Self, InferenceError> {
        if categories.is_empty() {
            return Err(InferenceError::Encoder(
                "label encoder has no categories".to_string(),
            ));
        }
        Ok(Self { categories })
    }

    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: LabelEncoder = serde_json::from_str(&raw)
            .map_err(|e| InferenceError::Encoder(format!("{}: {e}", path.display())))?;
        Self::new(parsed.categories)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// One-hot row for `index`.
    pub fn one_hot(&self, index: usize) -> Result<Vec<f32>, InferenceError> {
        if index >= self.categories.len() {
            return Err(InferenceError::Encoder(format!(
                "class index {index} outside {} categories",
                self.categories.len()
            )));
        }
        let mut row = vec![0.0; self.categories.len()];
        row[index] = 1.0;
        Ok(row)
    }

    /// Map a one-hot row back to its category.
    pub fn inverse_transform(&self, one_hot: &[f32]) -> Result<&str, InferenceError> {
        if one_hot.len() != self.categories.len() {
            return Err(InferenceError::Encoder(format!(
                "expected {} columns, got {}",
                self.categories.len(),
                one_hot.len()
            )));
        }

        let mut hot = one_hot
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == 1.0)
            .map(|(i, _)| i);

        match (hot.next(), hot.next()) {
            (Some(i), None) if one_hot.iter().all(|v| *v == 0.0 || *v == 1.0) => {
                Ok(&self.categories[i])
            }
            _ => Err(InferenceError::Encoder(
                "row is not a valid one-hot vector".to_string(),
            )),
        }
    }
}

/// Index of the largest finite value. Ties resolve to the first index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> LabelEncoder {
        LabelEncoder::new(vec!["angry".into(), "calm".into(), "happy".into()]).unwrap()
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[f32::NAN, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.0, 1.0, 0.1]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert_eq!(argmax(&probs), Some(0));
    }

    #[test]
    fn test_one_hot_round_trip() {
        let enc = encoder();
        for (i, name) in enc.categories().iter().enumerate() {
            let row = enc.one_hot(i).unwrap();
            assert_eq!(enc.inverse_transform(&row).unwrap(), name);
        }
    }

    #[test]
    fn test_inverse_transform_rejects_malformed_rows() {
        let enc = encoder();
        assert!(enc.inverse_transform(&[0.0, 0.0, 0.0]).is_err());
        assert!(enc.inverse_transform(&[1.0, 1.0, 0.0]).is_err());
        assert!(enc.inverse_transform(&[0.0, 0.5, 1.0]).is_err());
        assert!(enc.inverse_transform(&[1.0, 0.0]).is_err());
    }

    #[test]
    fn test_one_hot_out_of_range() {
        assert!(encoder().one_hot(3).is_err());
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label_encoder.json");
        std::fs::write(&path, r#"{"categories": ["female_sad", "male_happy"]}"#).unwrap();

        let enc = LabelEncoder::load(&path).unwrap();
        assert_eq!(enc.len(), 2);
        assert_eq!(enc.categories()[1], "male_happy");
    }

    #[test]
    fn test_empty_encoder_rejected() {
        assert!(LabelEncoder::new(Vec::new()).is_err());
    }
}
