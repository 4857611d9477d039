//! Audio decoding and MFCC feature extraction.
//!
//! The audio classifier was trained on a fixed window of each clip: resampled
//! to 44.1 kHz, starting half a second in and lasting at most 2.5 seconds,
//! summarized as the time-average of 40 MFCCs.

use std::fs::File;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::mfcc::MfccExtractor;
use super::{FeatureVector, PreprocessError};

pub const SAMPLE_RATE: u32 = 44_100;
pub const OFFSET_S: f32 = 0.5;
pub const DURATION_S: f32 = 2.5;
pub const N_MFCC: usize = 40;

/// Source rates accepted for resampling. The FFT resampler's size grows with
/// `to_rate / gcd(from, to)`, so a header claiming an odd rate must not reach it.
const MIN_SOURCE_RATE: u32 = 4_000;
const MAX_SOURCE_RATE: u32 = 384_000;

const N_FFT: usize = 2048;
const HOP_LENGTH: usize = 512;
const N_MELS: usize = 128;

/// Decoded PCM, downmixed to mono
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Holds the pre-planned FFT and filterbanks so requests only pay for the
/// transform itself.
pub struct AudioPreprocessor {
    mfcc: MfccExtractor,
}

impl Default for AudioPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPreprocessor {
    pub fn new() -> Self {
        Self {
            mfcc: MfccExtractor::new(SAMPLE_RATE, N_FFT, HOP_LENGTH, N_MELS, N_MFCC),
        }
    }

    /// Decode the file at `path` and reduce it to a `[1, 40]` MFCC mean vector.
    pub fn preprocess(&self, path: &Path) -> Result<FeatureVector, PreprocessError> {
        let decoded = decode_file(path)?;
        self.features_from_samples(&decoded.samples, decoded.sample_rate)
    }

    pub fn features_from_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<FeatureVector, PreprocessError> {
        if !(MIN_SOURCE_RATE..=MAX_SOURCE_RATE).contains(&sample_rate) {
            return Err(PreprocessError::Audio(format!(
                "unsupported sample rate {sample_rate} Hz"
            )));
        }

        let resampled = if sample_rate != SAMPLE_RATE {
            resample(samples, sample_rate, SAMPLE_RATE)?
        } else {
            samples.to_vec()
        };

        let window = clip_window(&resampled, SAMPLE_RATE)?;
        let mfcc = self.mfcc.mean(window)?;

        debug!(
            source_rate = sample_rate,
            source_samples = samples.len(),
            window_samples = window.len(),
            "Audio features extracted"
        );

        Ok(FeatureVector::new(mfcc, vec![1, N_MFCC as u64]))
    }
}

/// The analysis window: skip `OFFSET_S`, keep up to `DURATION_S`.
fn clip_window(samples: &[f32], sample_rate: u32) -> Result<&[f32], PreprocessError> {
    let start = (OFFSET_S * sample_rate as f32).round() as usize;
    let len = (DURATION_S * sample_rate as f32).round() as usize;

    if start >= samples.len() {
        return Err(PreprocessError::NoSamples);
    }
    let end = (start + len).min(samples.len());
    Ok(&samples[start..end])
}

/// Decode any container/codec symphonia supports by default into mono f32.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, PreprocessError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PreprocessError::Audio(format!("Failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(PreprocessError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PreprocessError::Audio("Missing sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PreprocessError::Audio(format!("Failed to create decoder: {e}")))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Error reading packet, stopping decode");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let channels = decoded.spec().channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                buf.copy_interleaved_ref(decoded);
                mono.extend(
                    buf.samples()
                        .chunks_exact(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = %e, "Decode error, skipping packet");
            }
            Err(e) => return Err(PreprocessError::Audio(format!("Decode error: {e}"))),
        }
    }

    if mono.is_empty() {
        return Err(PreprocessError::NoSamples);
    }

    Ok(DecodedAudio {
        samples: mono,
        sample_rate,
    })
}

/// Resample a mono signal, compensating for the resampler's latency so that
/// sample `n` at `from_rate` lands at `n * to_rate / from_rate`.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, PreprocessError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, 1024, 1, 1)
        .map_err(|e| PreprocessError::AudioProcessing(format!("Resampler init failed: {e}")))?;

    let chunk_size = resampler.input_frames_max();
    let delay = resampler.output_delay();
    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64) as usize;

    let mut output = Vec::with_capacity(delay + expected_len + chunk_size);
    let mut chunks = samples.chunks(chunk_size);
    let mut input = vec![vec![0.0f32; chunk_size]];

    // Past the end of the clip, feed silence until the delayed tail is out.
    while output.len() < delay + expected_len {
        let buf = &mut input[0];
        buf.fill(0.0);
        if let Some(chunk) = chunks.next() {
            buf[..chunk.len()].copy_from_slice(chunk);
        }

        let resampled = resampler
            .process(&input, None)
            .map_err(|e| PreprocessError::AudioProcessing(format!("Resample failed: {e}")))?;

        match resampled.first() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
            _ => {
                return Err(PreprocessError::AudioProcessing(
                    "Resampler produced no output".to_string(),
                ))
            }
        }
    }

    output.drain(..delay);
    output.truncate(expected_len);

    Ok(output)
}
