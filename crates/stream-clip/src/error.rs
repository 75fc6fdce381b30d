//! Unified crate-level error types.
//!
//! This module provides a single [`ClipError`] type used across the crate, a
//! convenient [`ClipResult`] alias, and the narrower [`WavError`] returned by
//! the header parser.
//!
//! Note: the fetch loop and the pull callback never propagate these errors to
//! their callers. They are recorded on the clip (see `MediaClip::failure`) and
//! surfaced through player state and events instead.

use std::io;

/// Result type used by this crate.
pub type ClipResult<T> = Result<T, ClipError>;

/// Failure to parse a RIFF/WAVE header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WavError {
    /// Fewer bytes than the fixed 44-byte header.
    #[error("buffer too short for a WAV header: {0} bytes")]
    TooShort(usize),

    /// Input ended before the `data` sub-chunk was reached.
    #[error("WAV header truncated at offset {0}")]
    Truncated(usize),

    /// Missing `RIFF` chunk id.
    #[error("missing RIFF chunk id")]
    NotRiff,

    /// Missing `WAVE` format tag.
    #[error("missing WAVE format tag")]
    NotWave,

    /// First sub-chunk is not `fmt `.
    #[error("expected 'fmt ' sub-chunk, found {0:?}")]
    MissingFmt([u8; 4]),

    /// `fmt ` contents are inconsistent.
    #[error("malformed 'fmt ' sub-chunk: {0}")]
    MalformedFmt(&'static str),
}

/// Unified error type for the `stream-clip` crate.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    /// A generic error with a message.
    #[error("{0}")]
    Message(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The track URL could not be parsed or lacks a host.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Only plain `http` is supported.
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Server answered with a non-success status.
    #[error("HTTP error: {status} {reason}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Reason phrase as sent by the server.
        reason: String,
    },

    /// The response head or body framing was not valid HTTP/1.1.
    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),

    /// Header could not be parsed.
    #[error("invalid WAV header: {0}")]
    Wav(#[from] WavError),

    /// Header parsed but describes samples the pull callback cannot convert.
    #[error("unsupported sample format: format tag {audio_format}, {bits_per_sample} bits")]
    UnsupportedFormat {
        /// WAVE format tag (1 = PCM).
        audio_format: u16,
        /// Bits per sample.
        bits_per_sample: u16,
    },

    /// Extra context around a lower-level error.
    #[error("{context}: {source}")]
    Context {
        /// What we were doing when the error occurred.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: Box<ClipError>,
    },
}

impl ClipError {
    /// Convenience helper to construct a simple message error.
    pub fn msg(msg: impl Into<String>) -> Self {
        ClipError::Message(msg.into())
    }

    /// Attach static context to an existing error.
    pub fn with_context(self, context: &'static str) -> Self {
        ClipError::Context {
            context,
            source: Box::new(self),
        }
    }
}
