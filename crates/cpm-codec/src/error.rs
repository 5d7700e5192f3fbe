//! Codec error types

/// Errors converting between inline content and decoded sub-documents
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Encoding identifier not supported
    #[error("unsupported encoding: '{0}'")]
    UnsupportedEncoding(String),

    /// Base64 payload could not be decoded
    #[error("invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Gzip stream could not be written or read
    #[error("gzip error: {0}")]
    Gzip(#[source] std::io::Error),

    /// Decoded bytes are not UTF-8 text
    #[error("content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Unit text is malformed
    #[error("unit syntax error at line {line}: {message}")]
    UnitSyntax {
        /// 1-based line number
        line: usize,
        /// What is wrong
        message: String,
    },

    /// Unit option cannot be written as unit text
    #[error("invalid unit option: {0}")]
    InvalidUnitOption(String),

    /// JSON document is malformed
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// YAML document is malformed
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

impl CodecError {
    /// Create unit syntax error
    pub fn unit_syntax(line: usize, message: impl Into<String>) -> Self {
        Self::UnitSyntax {
            line,
            message: message.into(),
        }
    }
}
