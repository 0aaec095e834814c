//! Short-time Fourier transform shared by the MFCC and chroma extractors.

use realfft::RealFftPlanner;

use super::FeatureError;

/// Analysis frame length in samples.
pub const FRAME_SIZE: usize = 2048;
/// Hop between consecutive frames in samples.
pub const HOP_SIZE: usize = 512;
/// Spectrum bins per frame.
pub const N_BINS: usize = FRAME_SIZE / 2 + 1;

/// Compute a power spectrogram: one `N_BINS`-element row per analysis frame,
/// Hann-windowed, no padding at either edge. Input shorter than one frame
/// yields no rows; callers reject that case before reducing over time.
pub fn power_spectrogram(samples: &[f32]) -> Result<Vec<Vec<f32>>, FeatureError> {
    if samples.len() < FRAME_SIZE {
        return Ok(Vec::new());
    }

    let fft = RealFftPlanner::<f32>::new().plan_fft_forward(FRAME_SIZE);
    let window = hann_window(FRAME_SIZE);

    let mut input = fft.make_input_vec();
    let mut output = fft.make_output_vec();
    let mut scratch = fft.make_scratch_vec();

    let n_frames = (samples.len() - FRAME_SIZE) / HOP_SIZE + 1;
    let mut frames = Vec::with_capacity(n_frames);

    for frame_idx in 0..n_frames {
        let start = frame_idx * HOP_SIZE;
        let frame = &samples[start..start + FRAME_SIZE];

        for ((dst, &sample), &w) in input.iter_mut().zip(frame).zip(&window) {
            *dst = sample * w;
        }

        fft.process_with_scratch(&mut input, &mut output, &mut scratch)
            .map_err(|e| FeatureError::Fft(e.to_string()))?;

        frames.push(
            output
                .iter()
                .map(|c| c.re * c.re + c.im * c.im)
                .collect::<Vec<f32>>(),
        );
    }

    Ok(frames)
}

/// Periodic-symmetric Hann window.
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}
