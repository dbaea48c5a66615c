//! WAV (RIFF/WAVE) container parser
//!
//! Walks the chunk list instead of assuming a fixed header layout:
//! 1. `RIFF` group signature, group size, `WAVE` format signature
//! 2. Search for the `fmt ` chunk, skipping unknown chunks
//! 3. Read the 16-byte format body, skip any extension bytes
//! 4. Search for the `data` chunk the same way
//! 5. Read the data length and the sample payload
//! 6. Derive bytes per sample from the bit depth and decode each
//!    channel-interleaved sample to a normalized `f32`
//!
//! Any failure discards the partial result. Short payloads are tolerated:
//! the complete samples present in the file are decoded.

use super::{MappedCursor, ParseError};

const RIFF_TAG: &[u8; 4] = b"RIFF";
const WAVE_TAG: &[u8; 4] = b"WAVE";
const FMT_TAG: &[u8; 4] = b"fmt ";
const DATA_TAG: &[u8; 4] = b"data";

/// Size of the format chunk body this parser reads
const MIN_FORMAT_CHUNK: u32 = 16;

/// Chunk sizes are rounded up to this boundary when skipping
pub const CHUNK_ALIGNMENT: u32 = 4;

/// Chunks examined per search before giving up
pub const MAX_CHUNK_ATTEMPTS: usize = 10;

/// Largest `f32` strictly below 1.0. 32-bit samples near full scale round up
/// to 1.0 in single precision and are pinned here.
const MAX_BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// Container descriptor from the `fmt ` and `data` chunk headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub format_code: u16,
    pub channel_count: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bit_depth: u16,
    /// `bit_depth / 8`, always in `[1, 4]` after a successful parse
    pub bytes_per_sample: u16,
    /// Data length declared by the `data` chunk header
    pub data_length: u32,
}

/// Parsed WAV file
#[derive(Debug, Clone, PartialEq)]
pub struct WavAudio {
    pub format: WavFormat,
    /// Channel-interleaved samples normalized to [-1.0, 1.0)
    pub samples: Vec<f32>,
}

/// Parse the WAV container behind `cursor`, starting from byte 0
pub fn parse(cursor: &mut MappedCursor) -> Result<WavAudio, ParseError> {
    let format = read_format(cursor)?;

    if cursor.remaining() < format.data_length as usize {
        tracing::debug!(
            path = %cursor.path().display(),
            declared = format.data_length,
            present = cursor.remaining(),
            "WAV payload shorter than declared"
        );
    }

    let payload = cursor.read_bytes(format.data_length as usize);
    let samples = decode_samples(payload, format.bytes_per_sample as usize);

    Ok(WavAudio { format, samples })
}

/// Playback length in seconds, from the headers alone
///
/// Counts the whole frames actually present, as `parse` would decode them,
/// without materializing any samples.
pub fn read_duration(cursor: &mut MappedCursor) -> Result<f64, ParseError> {
    let format = read_format(cursor)?;
    if format.sample_rate == 0 {
        return Ok(0.0);
    }

    let present = cursor.remaining().min(format.data_length as usize);
    let frame_bytes = usize::from(format.bytes_per_sample) * usize::from(format.channel_count);
    let frames = present / frame_bytes;
    Ok(frames as f64 / f64::from(format.sample_rate))
}

/// Validate the headers and leave the cursor at the start of the payload
fn read_format(cursor: &mut MappedCursor) -> Result<WavFormat, ParseError> {
    cursor.goto(0);

    if !cursor.matches(RIFF_TAG) {
        return Err(ParseError::InvalidHeader {
            expected: "RIFF",
            offset: cursor.position(),
        });
    }
    read_u32(cursor, "RIFF size")?;
    if !cursor.matches(WAVE_TAG) {
        return Err(ParseError::InvalidHeader {
            expected: "WAVE",
            offset: cursor.position(),
        });
    }

    if !find_chunk(cursor, FMT_TAG) {
        return Err(ParseError::FormatChunkNotFound);
    }

    let chunk_size = read_u32(cursor, "format chunk size")?;
    if chunk_size < MIN_FORMAT_CHUNK {
        return Err(ParseError::InvalidHeader {
            expected: "fmt ",
            offset: cursor.position(),
        });
    }
    let format_code = read_u16(cursor, "format code")?;
    let channel_count = read_u16(cursor, "channel count")?;
    let sample_rate = read_u32(cursor, "sample rate")?;
    let byte_rate = read_u32(cursor, "byte rate")?;
    let block_align = read_u16(cursor, "block alignment")?;
    let bit_depth = read_u16(cursor, "bit depth")?;

    // WAVEFORMATEX and friends carry extension bytes after the basic body
    if chunk_size > MIN_FORMAT_CHUNK {
        cursor.seek(i64::from(chunk_size - MIN_FORMAT_CHUNK));
    }

    if !find_chunk(cursor, DATA_TAG) {
        return Err(ParseError::DataChunkNotFound);
    }
    let data_length = read_u32(cursor, "data length")?;

    let bytes_per_sample = bit_depth / 8;
    if channel_count == 0 || !(1..=4).contains(&bytes_per_sample) {
        return Err(ParseError::UnsupportedSampleFormat {
            bit_depth,
            channels: channel_count,
        });
    }
    if bit_depth % 8 != 0 {
        return Err(ParseError::UnsupportedBitDepth(bit_depth));
    }

    Ok(WavFormat {
        format_code,
        channel_count,
        sample_rate,
        byte_rate,
        block_align,
        bit_depth,
        bytes_per_sample,
        data_length,
    })
}

/// Advance to the body of the chunk tagged `tag`
///
/// Unknown chunks are skipped by their declared size rounded up to
/// `CHUNK_ALIGNMENT`. Gives up after `MAX_CHUNK_ATTEMPTS` chunks, on a short
/// read, on a size that doesn't fit an i32, or on a chunk that runs past the
/// end of the file.
fn find_chunk(cursor: &mut MappedCursor, tag: &[u8; 4]) -> bool {
    for _ in 0..MAX_CHUNK_ATTEMPTS {
        if cursor.matches(tag) {
            return true;
        }

        if cursor.read_bytes(4).len() < 4 {
            return false;
        }
        let Some(size) = cursor.read_u32_le() else {
            return false;
        };
        if size > i32::MAX as u32 {
            return false;
        }

        let skip = align_chunk_size(size);
        if skip as usize > cursor.remaining() {
            return false;
        }
        cursor.seek(skip as i64);
    }
    false
}

fn align_chunk_size(size: u32) -> u64 {
    let align = u64::from(CHUNK_ALIGNMENT);
    u64::from(size).div_ceil(align) * align
}

fn decode_samples(payload: &[u8], bytes_per_sample: usize) -> Vec<f32> {
    payload
        .chunks_exact(bytes_per_sample)
        .map(decode_sample)
        .collect()
}

/// Little-endian signed PCM to a normalized amplitude
fn decode_sample(bytes: &[u8]) -> f32 {
    match *bytes {
        [b0] => f32::from(b0 as i8) / 128.0,
        [b0, b1] => f32::from(i16::from_le_bytes([b0, b1])) / 32_768.0,
        [b0, b1, b2] => {
            // Sign-extend from bit 23
            let value = i32::from_le_bytes([b0, b1, b2, 0]) << 8 >> 8;
            value as f32 / 8_388_608.0
        }
        [b0, b1, b2, b3] => {
            let value = i32::from_le_bytes([b0, b1, b2, b3]);
            ((f64::from(value) / 2_147_483_648.0) as f32).min(MAX_BELOW_ONE)
        }
        _ => 0.0,
    }
}

fn read_u16(cursor: &mut MappedCursor, field: &'static str) -> Result<u16, ParseError> {
    cursor.read_u16_le().ok_or(ParseError::Truncated {
        field,
        offset: cursor.position(),
    })
}

fn read_u32(cursor: &mut MappedCursor, field: &'static str) -> Result<u32, ParseError> {
    cursor.read_u32_le().ok_or(ParseError::Truncated {
        field,
        offset: cursor.position(),
    })
}
