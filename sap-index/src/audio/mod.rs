//! Audio container access
//!
//! Format dispatch is a closed set of variants selected by file extension.
//! Only WAV is decoded; MP3 and FLAC report `ParseError::Unsupported`.

pub mod cursor;
pub mod wav;

pub use cursor::MappedCursor;
pub use wav::{WavAudio, WavFormat};

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-file decode failures
///
/// None of these escape the record builder: a file that fails to decode is
/// still indexed, with default media fields.
#[derive(Debug, Error)]
pub enum ParseError {
    /// File missing, unreadable, empty, or not mappable
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Group or format signature mismatch
    #[error("Invalid {expected} header at byte {offset}")]
    InvalidHeader { expected: &'static str, offset: usize },

    /// A fixed-width field ran past the end of the file
    #[error("Truncated {field} at byte {offset}")]
    Truncated { field: &'static str, offset: usize },

    #[error("Format chunk not found")]
    FormatChunkNotFound,

    #[error("Data chunk not found")]
    DataChunkNotFound,

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("Unsupported sample format: {bit_depth}-bit, {channels} channel(s)")]
    UnsupportedSampleFormat { bit_depth: u16, channels: u16 },

    /// Recognized container with no decoder
    #[error("{0} decoding is not supported")]
    Unsupported(AudioFormat),
}

impl ParseError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Audio containers the indexer recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
}

/// Result of decoding one file
pub type DecodeResult = Result<DecodedAudio, ParseError>;

/// Decoded sample data plus the stream parameters it came with
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
    /// Channel-interleaved samples normalized to [-1.0, 1.0)
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    /// Number of complete frames (one sample per channel)
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            channels => self.samples.len() / channels as usize,
        }
    }

    /// Playback length in seconds, 0 when the sample rate is unknown
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

impl From<WavAudio> for DecodedAudio {
    fn from(audio: WavAudio) -> Self {
        Self {
            channels: audio.format.channel_count,
            sample_rate: audio.format.sample_rate,
            bit_depth: audio.format.bit_depth,
            samples: audio.samples,
        }
    }
}

impl AudioFormat {
    /// Select a format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }

    /// Whether files of this format are added to the index
    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Wav | Self::Mp3)
    }

    /// Decode the container behind `cursor`
    pub fn decode(self, cursor: &mut MappedCursor) -> DecodeResult {
        match self {
            Self::Wav => wav::parse(cursor).map(DecodedAudio::from),
            Self::Mp3 | Self::Flac => Err(ParseError::Unsupported(self)),
        }
    }
}

impl AudioFormat {
    /// Playback length of the container behind `cursor`, without decoding samples
    pub fn read_duration(self, cursor: &mut MappedCursor) -> Result<f64, ParseError> {
        match self {
            Self::Wav => wav::read_duration(cursor),
            Self::Mp3 | Self::Flac => Err(ParseError::Unsupported(self)),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wav => "WAV",
            Self::Mp3 => "MP3",
            Self::Flac => "FLAC",
        };
        f.write_str(name)
    }
}

/// Map `path`, decode it, and release the mapping
///
/// Formats without a decoder fail before the file is opened.
pub fn decode_file(format: AudioFormat, path: &Path) -> DecodeResult {
    if format != AudioFormat::Wav {
        return Err(ParseError::Unsupported(format));
    }
    let mut cursor = MappedCursor::open(path)?;
    let result = format.decode(&mut cursor);
    cursor.close();
    result
}

/// Map `path`, read its playback length from the headers, and release the mapping
///
/// Fails exactly where `decode_file` would, but never holds more than the
/// mapping in memory.
pub fn read_file_duration(format: AudioFormat, path: &Path) -> Result<f64, ParseError> {
    if format != AudioFormat::Wav {
        return Err(ParseError::Unsupported(format));
    }
    let mut cursor = MappedCursor::open(path)?;
    let result = format.read_duration(&mut cursor);
    cursor.close();
    result
}
