//! Audio Test Fixture Generator
//!
//! Valid WAV files come from hound; `write_raw_wav` writes hand-assembled
//! bytes for headers hound refuses to produce.

use std::path::Path;

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 0.25,
            sample_rate: 8000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

/// Write a sine tone WAV file
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: config.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (config.duration_seconds * config.sample_rate as f64) as usize;
    let amplitude = ((1i64 << (config.bits_per_sample - 1)) - 1) as f64 * 0.5;

    for i in 0..frames {
        let t = i as f64 / config.sample_rate as f64;
        let sample = ((t * 440.0 * 2.0 * std::f64::consts::PI).sin() * amplitude) as i32;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Write a WAV file from raw parts: `fmt ` body fields, then a `data` payload
///
/// The RIFF size is filled in from the actual content.
pub fn write_raw_wav(
    path: &Path,
    channels: u16,
    sample_rate: u32,
    bit_depth: u16,
    payload: &[u8],
) -> std::io::Result<()> {
    let block_align = channels * (bit_depth / 8);
    let byte_rate = sample_rate * block_align as u32;

    let mut body = Vec::new();
    body.extend_from_slice(b"WAVE");
    body.extend_from_slice(b"fmt ");
    body.extend_from_slice(&16u32.to_le_bytes());
    body.extend_from_slice(&1u16.to_le_bytes());
    body.extend_from_slice(&channels.to_le_bytes());
    body.extend_from_slice(&sample_rate.to_le_bytes());
    body.extend_from_slice(&byte_rate.to_le_bytes());
    body.extend_from_slice(&block_align.to_le_bytes());
    body.extend_from_slice(&bit_depth.to_le_bytes());
    body.extend_from_slice(b"data");
    body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    body.extend_from_slice(payload);

    let mut bytes = Vec::with_capacity(body.len() + 8);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&body);

    std::fs::write(path, bytes)
}
