//! MFCC computation: a mel filterbank over the power spectrum, log
//! compression, then an orthonormal DCT-II keeping the leading coefficients.

use super::stft::{FRAME_SIZE, N_BINS};

/// Mel bands feeding the cepstral transform.
const N_MELS: usize = 128;
/// Floor applied before the log so silent bands stay finite.
const POWER_FLOOR: f32 = 1e-10;

/// One `n_mfcc`-element coefficient row per spectrogram frame.
pub fn mfcc_frames(spectrogram: &[Vec<f32>], sample_rate: u32, n_mfcc: usize) -> Vec<Vec<f32>> {
    let filterbank = mel_filterbank(N_MELS, sample_rate as f32);

    spectrogram
        .iter()
        .map(|spectrum| {
            let log_mel: Vec<f32> = filterbank
                .iter()
                .map(|filter| {
                    let energy: f32 = filter
                        .iter()
                        .zip(spectrum.iter())
                        .map(|(&coeff, &power)| coeff * power)
                        .sum();
                    10.0 * energy.max(POWER_FLOOR).log10()
                })
                .collect();
            dct_ii(&log_mel, n_mfcc)
        })
        .collect()
}

/// Triangular mel filterbank: `n_bands` filters of `N_BINS` coefficients,
/// with band edges evenly spaced on the mel scale up to Nyquist.
fn mel_filterbank(n_bands: usize, sample_rate: f32) -> Vec<Vec<f32>> {
    let mel_max = hz_to_mel(sample_rate / 2.0);

    let n_points = n_bands + 2;
    let bin_points: Vec<f32> = (0..n_points)
        .map(|i| {
            let mel = mel_max * i as f32 / (n_points - 1) as f32;
            mel_to_hz(mel) * FRAME_SIZE as f32 / sample_rate
        })
        .collect();

    let mut filterbank = Vec::with_capacity(n_bands);
    for band in 0..n_bands {
        let mut filter = vec![0.0f32; N_BINS];
        let left = bin_points[band];
        let center = bin_points[band + 1];
        let right = bin_points[band + 2];

        for (bin, coeff) in filter.iter_mut().enumerate() {
            let bin_f = bin as f32;
            if bin_f >= left && bin_f <= center && center > left {
                *coeff = (bin_f - left) / (center - left);
            } else if bin_f > center && bin_f <= right && right > center {
                *coeff = (right - bin_f) / (right - center);
            }
        }
        filterbank.push(filter);
    }

    filterbank
}

/// Orthonormal DCT-II, truncated to the first `n_out` coefficients.
fn dct_ii(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len() as f32;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    x * (std::f32::consts::PI / n * (i as f32 + 0.5) * k as f32).cos()
                })
                .sum();
            scale * sum
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_hz_roundtrip() {
        let hz = 1000.0;
        let back = mel_to_hz(hz_to_mel(hz));
        assert!((back - hz).abs() < 0.1, "roundtrip: {hz} -> {back}");
    }

    #[test]
    fn filterbank_covers_every_band() {
        let filterbank = mel_filterbank(N_MELS, 22050.0);
        assert_eq!(filterbank.len(), N_MELS);
        for (band, filter) in filterbank.iter().enumerate() {
            assert_eq!(filter.len(), N_BINS);
            assert!(
                filter.iter().any(|&c| c > 0.0),
                "band {band} has no support"
            );
            assert!(filter.iter().all(|&c| (0.0..=1.0).contains(&c)));
        }
    }

    #[test]
    fn dct_of_constant_concentrates_in_first_coefficient() {
        let input = vec![1.0f32; 16];
        let coeffs = dct_ii(&input, 4);
        assert!(coeffs[0] > 1.0);
        for &c in &coeffs[1..] {
            assert!(c.abs() < 1e-4, "expected ~0, got {c}");
        }
    }

    #[test]
    fn frames_have_requested_coefficient_count() {
        let spectrogram = vec![vec![1.0f32; N_BINS]; 3];
        let frames = mfcc_frames(&spectrogram, 22050, 13);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == 13));
        assert!(frames.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn silence_stays_finite() {
        let spectrogram = vec![vec![0.0f32; N_BINS]; 2];
        let frames = mfcc_frames(&spectrogram, 22050, 13);
        assert!(frames.iter().flatten().all(|v| v.is_finite()));
    }
}
