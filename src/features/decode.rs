//! Audio decoding: compressed upload bytes to mono PCM at the analysis rate.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::FeatureError;

/// Decode any container/codec symphonia supports to mono f32 PCM at
/// `target_rate`. Multi-channel input is downmixed by averaging; a differing
/// source rate is resampled with a windowed-sinc converter.
pub fn decode_to_mono(data: Vec<u8>, target_rate: u32) -> Result<Vec<f32>, FeatureError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| FeatureError::Decode(format!("probe: {e}")))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| FeatureError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| FeatureError::Decode("unknown sample rate".to_string()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| FeatureError::Decode(format!("codec: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(FeatureError::Decode(format!("packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(error = %e, "Skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(FeatureError::Decode(format!("decode: {e}"))),
        };

        let n_frames = decoded.frames();
        if n_frames == 0 {
            continue;
        }

        let mut buf = SampleBuffer::<f32>::new(n_frames as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);

        if channels > 1 {
            samples.extend(
                buf.samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        } else {
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(FeatureError::Decode("no audio samples decoded".to_string()));
    }

    if source_rate != target_rate {
        samples = resample(&samples, source_rate, target_rate)?;
    }

    Ok(samples)
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, FeatureError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    const CHUNK_SIZE: usize = 1024;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| FeatureError::Resample(format!("init: {e}")))?;

    let expected_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(expected_len + CHUNK_SIZE);

    for chunk in samples.chunks(CHUNK_SIZE) {
        // The converter needs full chunks; pad the tail with silence
        let input = if chunk.len() < CHUNK_SIZE {
            let mut padded = chunk.to_vec();
            padded.resize(CHUNK_SIZE, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let result = resampler
            .process(&[input], None)
            .map_err(|e| FeatureError::Resample(e.to_string()))?;

        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    output.truncate(expected_len);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let t = i as f32 / sample_rate as f32;
                let sample = (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.4;
                for _ in 0..channels {
                    writer
                        .write_sample((sample * i16::MAX as f32) as i16)
                        .unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn mono_wav_decodes_sample_for_sample() {
        let bytes = wav_bytes(1, 22050, 22050);
        let samples = decode_to_mono(bytes, 22050).unwrap();
        assert_eq!(samples.len(), 22050);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn stereo_wav_downmixes_to_mono() {
        let bytes = wav_bytes(2, 22050, 4410);
        let samples = decode_to_mono(bytes, 22050).unwrap();
        assert_eq!(samples.len(), 4410);
    }

    #[test]
    fn mismatched_rate_is_resampled() {
        let bytes = wav_bytes(1, 44100, 44100);
        let samples = decode_to_mono(bytes, 22050).unwrap();
        // One second in, roughly one second out at half the rate
        let expected = 22050;
        assert!(
            samples.len().abs_diff(expected) < 256,
            "got {} samples, expected about {expected}",
            samples.len()
        );
    }

    #[test]
    fn garbage_bytes_fail_to_probe() {
        let err = decode_to_mono(vec![0xAB; 64], 22050).unwrap_err();
        assert!(matches!(err, FeatureError::Decode(_)));
    }

    #[test]
    fn empty_input_fails_to_probe() {
        assert!(decode_to_mono(Vec::new(), 22050).is_err());
    }
}
