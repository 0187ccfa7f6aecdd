// Chop audio encoding
// Writes a frame range of an AudioBuffer as 16-bit PCM WAV bytes

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

use super::AudioBuffer;
use crate::error::{ChopError, ChopResult};

/// Encode frames [start, end) of every channel as a 16-bit PCM WAV
///
/// An empty range still produces a valid (empty) WAV file.
pub fn encode_wav_range(buffer: &AudioBuffer, start: usize, end: usize) -> ChopResult<Vec<u8>> {
    let spec = WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let samples = buffer.interleaved_range(start, end);

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| ChopError::Encode(e.to_string()))?;
        for sample in samples {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| ChopError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| ChopError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Float sample in [-1, 1] to 16-bit PCM, clipping out-of-range values
fn to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    };
    (clamped * i16::MAX as f32).round() as i16
}
