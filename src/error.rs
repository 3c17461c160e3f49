//! Error handling for aconvert
//!
//! Configuration errors are raised once at setup, resource errors halt the
//! stream, and numeric overflow is never an error (it saturates).

use std::collections::TryReserveError;

use thiserror::Error;

use crate::engine::{ChannelLayout, SampleFormat};

/// Result type alias for aconvert operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Main error type for aconvert operations
#[derive(Error, Debug)]
pub enum ConvertError {
    // Configuration Errors
    #[error("Invalid sample format '{value}'")]
    InvalidSampleFormat { value: String },

    #[error("Invalid channel layout '{value}'")]
    InvalidChannelLayout { value: String },

    #[error("Invalid packing '{value}' (expected packed or planar)")]
    InvalidPacking { value: String },

    #[error("Invalid arguments: {reason}")]
    InvalidArguments { reason: String },

    #[error("Unsupported channel layout conversion requested: {from} -> {to}")]
    UnsupportedLayoutConversion {
        from: ChannelLayout,
        to: ChannelLayout,
    },

    #[error("Too many channels: {channels} (maximum {max})")]
    TooManyChannels { channels: usize, max: usize },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    // Resource Errors
    /// Allocation refused by the allocator (`source` set) or by a size
    /// check before asking it
    #[error("Out of memory: {details}")]
    OutOfMemory {
        details: String,
        #[source]
        source: Option<TryReserveError>,
    },

    #[error("Stream halted: {reason}")]
    StreamHalted { reason: String },

    #[error("Buffering limit reached ({capacity} frames); consume pending frames first")]
    BufferingLimit { capacity: usize },

    // Frame Errors
    #[error("Invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("Sample type mismatch: frame holds {actual}, caller asked for {expected}")]
    FormatMismatch {
        expected: SampleFormat,
        actual: SampleFormat,
    },

    #[error("Buffer is not writable (shared or missing write permission)")]
    NotWritable,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConvertError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ConvertError::InvalidSampleFormat { .. } => "INVALID_SAMPLE_FORMAT",
            ConvertError::InvalidChannelLayout { .. } => "INVALID_CHANNEL_LAYOUT",
            ConvertError::InvalidPacking { .. } => "INVALID_PACKING",
            ConvertError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            ConvertError::UnsupportedLayoutConversion { .. } => "UNSUPPORTED_LAYOUT_CONVERSION",
            ConvertError::TooManyChannels { .. } => "TOO_MANY_CHANNELS",
            ConvertError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            ConvertError::OutOfMemory { .. } => "OUT_OF_MEMORY",
            ConvertError::StreamHalted { .. } => "STREAM_HALTED",
            ConvertError::BufferingLimit { .. } => "BUFFERING_LIMIT",
            ConvertError::InvalidFrame { .. } => "INVALID_FRAME",
            ConvertError::FormatMismatch { .. } => "FORMAT_MISMATCH",
            ConvertError::NotWritable => "NOT_WRITABLE",
            ConvertError::Io(_) => "IO_ERROR",
            ConvertError::Wav(_) => "WAV_ERROR",
            ConvertError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error was detected while setting up the stage
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ConvertError::InvalidSampleFormat { .. }
                | ConvertError::InvalidChannelLayout { .. }
                | ConvertError::InvalidPacking { .. }
                | ConvertError::InvalidArguments { .. }
                | ConvertError::UnsupportedLayoutConversion { .. }
                | ConvertError::TooManyChannels { .. }
        )
    }

    /// Check if this error is recoverable without reconfiguring the stage
    ///
    /// Configuration and resource errors are terminal for the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConvertError::BufferingLimit { .. }
                | ConvertError::InvalidFrame { .. }
                | ConvertError::FormatMismatch { .. }
                | ConvertError::NotWritable
        )
    }

    pub(crate) fn out_of_memory(details: impl Into<String>, source: Option<TryReserveError>) -> Self {
        ConvertError::OutOfMemory {
            details: details.into(),
            source,
        }
    }
}
