//! Mel-frequency cepstral coefficients.
//!
//! Follows the usual librosa defaults: zero-padded centred STFT with a
//! periodic Hann window, power spectrum, Slaney mel filterbank, dB scaling
//! with an 80 dB floor below the peak, orthonormal DCT-II.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use super::PreprocessError;

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

pub struct MfccExtractor {
    n_fft: usize,
    hop: usize,
    n_mfcc: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    /// `n_mels` rows of `n_fft / 2 + 1` weights
    mel_basis: Vec<Vec<f32>>,
    /// `n_mfcc` rows of `n_mels` coefficients
    dct: Vec<Vec<f32>>,
}

impl MfccExtractor {
    pub fn new(sample_rate: u32, n_fft: usize, hop: usize, n_mels: usize, n_mfcc: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        let window = (0..n_fft)
            .map(|i| {
                let phase = 2.0 * PI * i as f32 / n_fft as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        Self {
            n_fft,
            hop,
            n_mfcc,
            fft,
            window,
            mel_basis: mel_filterbank(sample_rate, n_fft, n_mels),
            dct: dct_ortho(n_mfcc, n_mels),
        }
    }

    /// Per-frame coefficients, `frames × n_mfcc`.
    pub fn compute(&self, signal: &[f32]) -> Result<Vec<Vec<f32>>, PreprocessError> {
        if signal.is_empty() {
            return Err(PreprocessError::NoSamples);
        }

        let power = self.power_spectrogram(signal)?;

        let mut mel_db: Vec<Vec<f32>> = power
            .iter()
            .map(|frame| {
                self.mel_basis
                    .iter()
                    .map(|weights| {
                        let energy: f32 = weights.iter().zip(frame).map(|(w, p)| w * p).sum();
                        10.0 * energy.max(AMIN).log10()
                    })
                    .collect()
            })
            .collect();

        let peak = mel_db
            .iter()
            .flatten()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - TOP_DB;
        for value in mel_db.iter_mut().flatten() {
            *value = value.max(floor);
        }

        Ok(mel_db
            .iter()
            .map(|frame| {
                self.dct
                    .iter()
                    .map(|basis| basis.iter().zip(frame).map(|(b, m)| b * m).sum())
                    .collect()
            })
            .collect())
    }

    /// Coefficients averaged over time.
    pub fn mean(&self, signal: &[f32]) -> Result<Vec<f32>, PreprocessError> {
        let frames = self.compute(signal)?;
        let mut mean = vec![0.0f32; self.n_mfcc];
        for frame in &frames {
            for (acc, v) in mean.iter_mut().zip(frame) {
                *acc += v;
            }
        }
        let n = frames.len() as f32;
        mean.iter_mut().for_each(|v| *v /= n);
        Ok(mean)
    }

    fn power_spectrogram(&self, signal: &[f32]) -> Result<Vec<Vec<f32>>, PreprocessError> {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; signal.len() + 2 * pad];
        padded[pad..pad + signal.len()].copy_from_slice(signal);

        let num_frames = 1 + (padded.len() - self.n_fft) / self.hop;

        let mut scratch = self.fft.make_scratch_vec();
        let mut frame_buf = vec![0.0f32; self.n_fft];
        let mut spectrum = self.fft.make_output_vec();
        let mut frames = Vec::with_capacity(num_frames);

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop;
            for (i, slot) in frame_buf.iter_mut().enumerate() {
                *slot = padded[start + i] * self.window[i];
            }

            self.fft
                .process_with_scratch(&mut frame_buf, &mut spectrum, &mut scratch)
                .map_err(|e| PreprocessError::AudioProcessing(format!("FFT failed: {e:?}")))?;

            frames.push(spectrum.iter().map(|c| c.norm_sqr()).collect());
        }

        Ok(frames)
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;

    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular filters on the Slaney mel scale with area normalization.
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let sr = sample_rate as f32;
    let fft_freqs: Vec<f32> = (0..n_bins).map(|k| k as f32 * sr / n_fft as f32).collect();

    let mel_max = hz_to_mel(sr / 2.0);
    let mel_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, centre, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (centre - left);
                    let upper = (right - f) / (right - centre);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

fn dct_ortho(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    let n = n_in as f32;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| scale * (PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}
