//! Chroma features: spectral power folded into the 12 pitch classes.

use super::stft::{FRAME_SIZE, N_BINS};

/// Pitch classes per octave; class 0 is C, class 9 is A.
pub const CHROMA_BINS: usize = 12;

const A4_HZ: f32 = 440.0;
const A4_MIDI: f32 = 69.0;

/// One 12-element chroma row per spectrogram frame, each normalized by its
/// peak class so values sit in [0, 1]. All-silent frames stay all-zero.
pub fn chroma_frames(spectrogram: &[Vec<f32>], sample_rate: u32) -> Vec<Vec<f32>> {
    let classes = bin_pitch_classes(sample_rate);

    spectrogram
        .iter()
        .map(|spectrum| {
            let mut chroma = vec![0.0f32; CHROMA_BINS];
            // Skip the DC bin, it has no pitch
            for (bin, &power) in spectrum.iter().enumerate().skip(1) {
                chroma[classes[bin]] += power;
            }

            let peak = chroma.iter().cloned().fold(0.0f32, f32::max);
            if peak > 0.0 {
                for v in &mut chroma {
                    *v /= peak;
                }
            }
            chroma
        })
        .collect()
}

/// Nearest pitch class for every spectrum bin, relative to A4 = 440 Hz.
fn bin_pitch_classes(sample_rate: u32) -> Vec<usize> {
    (0..N_BINS)
        .map(|bin| {
            if bin == 0 {
                return 0;
            }
            let freq = bin as f32 * sample_rate as f32 / FRAME_SIZE as f32;
            let midi = A4_MIDI + 12.0 * (freq / A4_HZ).log2();
            (midi.round() as i64).rem_euclid(12) as usize
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::stft;

    #[test]
    fn a440_maps_to_pitch_class_a() {
        let sample_rate = 22050;
        let classes = bin_pitch_classes(sample_rate);
        let bin_440 = (440.0 * FRAME_SIZE as f32 / sample_rate as f32).round() as usize;
        assert_eq!(classes[bin_440], 9);
    }

    #[test]
    fn octaves_share_a_class() {
        let sample_rate = 22050;
        let classes = bin_pitch_classes(sample_rate);
        let bin_220 = (220.0 * FRAME_SIZE as f32 / sample_rate as f32).round() as usize;
        let bin_880 = (880.0 * FRAME_SIZE as f32 / sample_rate as f32).round() as usize;
        assert_eq!(classes[bin_220], classes[bin_880]);
    }

    #[test]
    fn pure_tone_peaks_on_its_pitch_class() {
        let sample_rate = 22050;
        let samples: Vec<f32> = (0..sample_rate as usize)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
            })
            .collect();

        let spectrogram = stft::power_spectrogram(&samples).unwrap();
        let frames = chroma_frames(&spectrogram, sample_rate);

        // Mean chroma across frames should peak on A (class 9)
        let mut mean = vec![0.0f32; CHROMA_BINS];
        for frame in &frames {
            for (m, &v) in mean.iter_mut().zip(frame) {
                *m += v;
            }
        }
        let peak_class = mean
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_class, 9);
    }

    #[test]
    fn frames_are_peak_normalized() {
        let mut spectrum = vec![0.0f32; N_BINS];
        spectrum[40] = 3.0;
        spectrum[41] = 1.5;
        let frames = chroma_frames(&[spectrum], 22050);

        let peak = frames[0].iter().cloned().fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-6);
        assert!(frames[0].iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn silent_frame_stays_zero() {
        let frames = chroma_frames(&[vec![0.0f32; N_BINS]], 22050);
        assert!(frames[0].iter().all(|&v| v == 0.0));
    }
}
