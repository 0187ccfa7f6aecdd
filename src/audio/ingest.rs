// Audio ingestion module
// Decodes WAV (hound) or compressed containers (symphonia) into a normalized AudioBuffer

use hound::{SampleFormat, WavReader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{ChopError, ChopResult};

/// Container the buffer was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Wav,
    /// Anything symphonia probed successfully (MP3, FLAC, OGG, M4A...)
    Compressed,
    /// Samples handed over directly by the caller
    Raw,
}

/// Decoded audio, one sample vector per channel
///
/// Samples are normalized to [-1.0, 1.0]. The buffer is immutable once built;
/// downstream stages read a mono reduction and slice the original channels
/// for the final chop audio.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
    source_format: SourceFormat,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data
    /// Fails if the sample rate is zero, there are no channels, or channel lengths differ
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> ChopResult<Self> {
        Self::with_format(sample_rate, channels, SourceFormat::Raw)
    }

    fn with_format(
        sample_rate: u32,
        channels: Vec<Vec<f32>>,
        source_format: SourceFormat,
    ) -> ChopResult<Self> {
        if sample_rate == 0 {
            return Err(ChopError::Decode("sample rate must be > 0".to_string()));
        }
        if channels.is_empty() {
            return Err(ChopError::Decode("audio has no channels".to_string()));
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(ChopError::Decode(
                "channels have different lengths".to_string(),
            ));
        }

        Ok(AudioBuffer {
            sample_rate,
            channels,
            source_format,
        })
    }

    /// Build a buffer from interleaved samples ([L, R, L, R, ...])
    /// Trailing samples that do not fill a whole frame are dropped
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: u16,
        sample_rate: u32,
    ) -> ChopResult<Self> {
        Self::deinterleave(samples, channel_count, sample_rate, SourceFormat::Raw)
    }

    fn deinterleave(
        samples: &[f32],
        channel_count: u16,
        sample_rate: u32,
        source_format: SourceFormat,
    ) -> ChopResult<Self> {
        if channel_count == 0 {
            return Err(ChopError::Decode("audio has no channels".to_string()));
        }
        let count = channel_count as usize;
        let frame_count = samples.len() / count;

        let mut channels = vec![Vec::with_capacity(frame_count); count];
        for frame in samples.chunks_exact(count) {
            for (ch, &sample) in frame.iter().enumerate() {
                channels[ch].push(sample);
            }
        }

        Self::with_format(sample_rate, channels, source_format)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn source_format(&self) -> SourceFormat {
        self.source_format
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }

        let count = self.channels.len() as f32;
        (0..self.frame_count())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / count)
            .collect()
    }

    /// Interleaved copy of frames [start, end) across all channels
    pub fn interleaved_range(&self, start: usize, end: usize) -> Vec<f32> {
        let end = end.min(self.frame_count());
        let start = start.min(end);

        let mut out = Vec::with_capacity((end - start) * self.channels.len());
        for i in start..end {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    /// Raw little-endian bytes of every sample, channel by channel
    /// Used to hash a caller-supplied buffer
    pub fn sample_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.frame_count() * self.channels.len() * 4 + 4);
        bytes.extend_from_slice(&self.sample_rate.to_le_bytes());
        for channel in &self.channels {
            for sample in channel {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        bytes
    }
}

/// True if the bytes carry a RIFF/WAVE header
pub fn is_wav(data: &[u8]) -> bool {
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE"
}

/// Decode raw audio bytes into an AudioBuffer
///
/// WAV is sniffed from its header and read with hound; anything else goes
/// through symphonia's probe, optionally guided by a file extension hint
/// (e.g. "mp3"). Zero decoded frames is reported as `EmptyAudio`.
pub fn decode_audio(data: &[u8], extension_hint: Option<&str>) -> ChopResult<AudioBuffer> {
    if data.is_empty() {
        return Err(ChopError::Decode("no audio data".to_string()));
    }

    let buffer = if is_wav(data) {
        ingest_wav(data)?
    } else {
        ingest_compressed(data, extension_hint)?
    };

    if buffer.frame_count() == 0 {
        return Err(ChopError::EmptyAudio);
    }

    log::debug!(
        "Decoded {:?} audio: {} Hz, {} channels, {} frames ({:.2}s)",
        buffer.source_format(),
        buffer.sample_rate(),
        buffer.channel_count(),
        buffer.frame_count(),
        buffer.duration_secs()
    );

    Ok(buffer)
}

/// Ingest a WAV file from raw bytes
pub fn ingest_wav(data: &[u8]) -> ChopResult<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(data))?;

    let spec = reader.spec();
    let sample_format = spec.sample_format;
    let bit_depth = spec.bits_per_sample;

    // Read and normalize samples to f32 [-1.0, 1.0]
    let samples: Vec<f32> = match (sample_format, bit_depth) {
        (SampleFormat::Int, 8) => {
            // hound yields 8-bit PCM already re-centred to [-128, 127]
            read_int_samples(reader, 128.0)?
        }
        (SampleFormat::Int, 16) => read_int_samples(reader, 32768.0)?,
        (SampleFormat::Int, 24) => read_int_samples(reader, 8388608.0)?,
        (SampleFormat::Int, 32) => read_int_samples(reader, 2147483648.0)?,
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ChopError::Decode(format!(
                "unsupported WAV encoding: {:?} {}-bit",
                sample_format, bit_depth
            )));
        }
    };

    AudioBuffer::deinterleave(&samples, spec.channels, spec.sample_rate, SourceFormat::Wav)
}

fn read_int_samples(reader: WavReader<Cursor<&[u8]>>, scale: f32) -> ChopResult<Vec<f32>> {
    Ok(reader
        .into_samples::<i32>()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|s| s as f32 / scale)
        .collect())
}

/// Decode any container symphonia can probe
fn ingest_compressed(data: &[u8], extension_hint: Option<&str>) -> ChopResult<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext.trim_start_matches('.'));
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ChopError::Decode(format!("unrecognized container: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ChopError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channel_count = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ChopError::Decode(format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(ChopError::Decode(format!("failed to read packet: {}", e)));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channel_count.get_or_insert(spec.channels.count() as u16);

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => {
                return Err(ChopError::Decode(format!("decoder failure: {}", e)));
            }
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| ChopError::Decode("sample rate not found".to_string()))?;
    let channel_count =
        channel_count.ok_or_else(|| ChopError::Decode("channel count not found".to_string()))?;

    AudioBuffer::deinterleave(&samples, channel_count, sample_rate, SourceFormat::Compressed)
}
