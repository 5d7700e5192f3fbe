//! Inline content encodings
//!
//! Supported encodings:
//! - `""`: plain UTF-8 text
//! - `b64`: standard base64
//! - `gzip+b64`: gzip stream, then standard base64

use crate::error::CodecError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cpm_model::constants::{ENCODING_B64, ENCODING_GZIP_B64, ENCODING_PLAIN};
use cpm_model::FileContentInline;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::str::FromStr;

/// Encoding of inline content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileCodecId {
    /// Plain text
    #[default]
    Plain,
    /// Base64
    B64,
    /// Gzip then base64
    GzipB64,
}

impl FileCodecId {
    /// Encoding identifier as written into the entry
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => ENCODING_PLAIN,
            Self::B64 => ENCODING_B64,
            Self::GzipB64 => ENCODING_GZIP_B64,
        }
    }
}

impl FromStr for FileCodecId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ENCODING_PLAIN => Ok(Self::Plain),
            ENCODING_B64 => Ok(Self::B64),
            ENCODING_GZIP_B64 => Ok(Self::GzipB64),
            other => Err(CodecError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Raw bytes <-> encoded inline content
pub trait FileContentInlineCodec: Send + Sync {
    /// Encode bytes with the given encoding identifier
    ///
    /// # Errors
    /// Returns error if the encoding is unknown or the data cannot be
    /// represented in it
    fn encode(&self, data: &[u8], encoding: &str) -> Result<FileContentInline, CodecError>;

    /// Decode inline content into raw bytes
    ///
    /// # Errors
    /// Returns error if the encoding is unknown or the data is corrupt
    fn decode(&self, fci: &FileContentInline) -> Result<Vec<u8>, CodecError>;
}

/// Built-in codec for the plain, `b64` and `gzip+b64` encodings
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFileContentInlineCodec;

impl DefaultFileContentInlineCodec {
    /// Create codec
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FileContentInlineCodec for DefaultFileContentInlineCodec {
    fn encode(&self, data: &[u8], encoding: &str) -> Result<FileContentInline, CodecError> {
        let id: FileCodecId = encoding.parse()?;
        let encoded = match id {
            FileCodecId::Plain => String::from_utf8(data.to_vec())?,
            FileCodecId::B64 => STANDARD.encode(data),
            FileCodecId::GzipB64 => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data).map_err(CodecError::Gzip)?;
                let compressed = encoder.finish().map_err(CodecError::Gzip)?;
                STANDARD.encode(compressed)
            }
        };
        Ok(FileContentInline::new(id.as_str(), encoded))
    }

    fn decode(&self, fci: &FileContentInline) -> Result<Vec<u8>, CodecError> {
        match fci.encoding.parse::<FileCodecId>()? {
            FileCodecId::Plain => Ok(fci.data.as_bytes().to_vec()),
            FileCodecId::B64 => Ok(STANDARD.decode(fci.data.trim())?),
            FileCodecId::GzipB64 => {
                let compressed = STANDARD.decode(fci.data.trim())?;
                let mut data = Vec::new();
                GzDecoder::new(compressed.as_slice())
                    .read_to_end(&mut data)
                    .map_err(CodecError::Gzip)?;
                Ok(data)
            }
        }
    }
}
