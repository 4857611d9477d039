//! Turns stored uploads into the tensors the classifiers expect.

pub mod audio;
pub mod image;
mod mfcc;

use thiserror::Error;

pub use self::audio::AudioPreprocessor;
pub use self::image::preprocess_image;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Could not decode image: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("Could not decode audio: {0}")]
    Audio(String),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Audio clip is too short to analyze")]
    NoSamples,

    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat model input plus the tensor shape it should be fed as.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub data: Vec<f32>,
    pub dims: Vec<u64>,
}

impl FeatureVector {
    pub fn new(data: Vec<f32>, dims: Vec<u64>) -> Self {
        debug_assert_eq!(data.len() as u64, dims.iter().product::<u64>());
        Self { data, dims }
    }

    /// Same values under a different shape. Returns `None` when the element
    /// counts disagree.
    pub fn reshaped(self, dims: &[u64]) -> Option<Self> {
        if dims.iter().product::<u64>() != self.data.len() as u64 {
            return None;
        }
        Some(Self {
            data: self.data,
            dims: dims.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_keeps_values() {
        let fv = FeatureVector::new(vec![1.0; 40], vec![1, 40]);
        let reshaped = fv.reshaped(&[1, 40, 1]).unwrap();
        assert_eq!(reshaped.dims, vec![1, 40, 1]);
        assert_eq!(reshaped.len(), 40);
    }

    #[test]
    fn test_reshape_rejects_mismatch() {
        let fv = FeatureVector::new(vec![1.0; 40], vec![1, 40]);
        assert!(fv.reshaped(&[1, 39]).is_none());
    }
}
