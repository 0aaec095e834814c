//! Acoustic feature extraction.
//!
//! Converts an uploaded audio file into the fixed-length vector the grammar
//! model was trained on: per-coefficient mean and standard deviation of
//! MFCCs and chroma, concatenated as
//! `[mfcc_mean, mfcc_std, chroma_mean, chroma_std]`. The model was trained
//! against that exact layout; reordering it produces wrong scores with no
//! detectable error.

pub mod chroma;
pub mod decode;
pub mod mfcc;
pub mod stft;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use chroma::CHROMA_BINS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Analysis sample rate; uploads at other rates are resampled.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Number of cepstral coefficients kept per frame.
    #[serde(default = "default_n_mfcc")]
    pub n_mfcc: usize,
    /// Clips longer than this are truncated; shorter clips are used as-is.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f32,
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_n_mfcc() -> usize {
    13
}

fn default_max_duration() -> f32 {
    5.0
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            n_mfcc: default_n_mfcc(),
            max_duration_secs: default_max_duration(),
        }
    }
}

impl FeatureConfig {
    /// Length of the extracted vector: mean and std for each MFCC
    /// coefficient plus mean and std for each of the 12 chroma bins.
    pub fn feature_len(&self) -> usize {
        2 * self.n_mfcc + 2 * CHROMA_BINS
    }
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("spectrum computation failed: {0}")]
    Fft(String),
    #[error("clip too short for analysis: {0} samples")]
    TooShort(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of a feature extraction.
///
/// `Degraded` carries an all-zero vector of the correct length in place of
/// real features, so callers that only need shape-correct input can score it
/// anyway, while tests and logs can tell the two apart.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome {
    Extracted(Vec<f32>),
    Degraded { vector: Vec<f32>, reason: String },
}

impl FeatureOutcome {
    pub fn vector(&self) -> &[f32] {
        match self {
            FeatureOutcome::Extracted(v) => v,
            FeatureOutcome::Degraded { vector, .. } => vector,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FeatureOutcome::Degraded { .. })
    }
}

/// Extract the feature vector for an audio file.
///
/// Never fails: any decoding or computation error is logged and replaced by
/// a zero vector of the expected length, so the caller always receives a
/// shape-correct result. Identical input bytes and config always produce
/// identical output.
pub fn extract_features(path: &Path, config: &FeatureConfig) -> FeatureOutcome {
    match extract_inner(path, config) {
        Ok(vector) => FeatureOutcome::Extracted(vector),
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "Feature extraction failed, substituting zero vector"
            );
            FeatureOutcome::Degraded {
                vector: vec![0.0; config.feature_len()],
                reason: e.to_string(),
            }
        }
    }
}

fn extract_inner(path: &Path, config: &FeatureConfig) -> Result<Vec<f32>, FeatureError> {
    let data = std::fs::read(path)?;
    let mut samples = decode::decode_to_mono(data, config.sample_rate)?;

    // Cap the analysis window for consistency across clip lengths
    let max_samples = (config.max_duration_secs * config.sample_rate as f32) as usize;
    samples.truncate(max_samples);

    if samples.len() < stft::FRAME_SIZE {
        return Err(FeatureError::TooShort(samples.len()));
    }

    let spectrogram = stft::power_spectrogram(&samples)?;

    let mfcc = mfcc::mfcc_frames(&spectrogram, config.sample_rate, config.n_mfcc);
    let chroma = chroma::chroma_frames(&spectrogram, config.sample_rate);

    let (mfcc_mean, mfcc_std) = mean_std(&mfcc, config.n_mfcc);
    let (chroma_mean, chroma_std) = mean_std(&chroma, CHROMA_BINS);

    let mut features = Vec::with_capacity(config.feature_len());
    features.extend(mfcc_mean);
    features.extend(mfcc_std);
    features.extend(chroma_mean);
    features.extend(chroma_std);
    Ok(features)
}

/// Per-coefficient mean and population standard deviation across frames.
/// Callers guarantee `frames` is non-empty and every frame has length `dim`.
fn mean_std(frames: &[Vec<f32>], dim: usize) -> (Vec<f32>, Vec<f32>) {
    let n = frames.len() as f32;

    let mut mean = vec![0.0f32; dim];
    for frame in frames {
        for (m, &v) in mean.iter_mut().zip(frame) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }

    let mut var = vec![0.0f32; dim];
    for frame in frames {
        for ((s, &m), &v) in var.iter_mut().zip(&mean).zip(frame) {
            *s += (v - m) * (v - m);
        }
    }
    let std = var.into_iter().map(|s| (s / n).sqrt()).collect();

    (mean, std)
}
