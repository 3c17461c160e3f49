//! Sample formats and storage arrangement
//!
//! The five canonical sample representations and the packed/planar
//! arrangement flag, plus the `StreamFormat` triple every frame carries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::layout::ChannelLayout;
use crate::error::{ConvertError, Result};

// ============================================================================
// Sample Format
// ============================================================================

/// Sample representation of one audio value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Unsigned 8-bit, offset by 128
    #[serde(rename = "u8")]
    U8,
    /// Signed 16-bit
    #[serde(rename = "s16")]
    S16,
    /// Signed 32-bit
    #[serde(rename = "s32")]
    S32,
    /// 32-bit float, nominal range [-1, 1]
    #[serde(rename = "flt", alias = "f32")]
    F32,
    /// 64-bit float, nominal range [-1, 1]
    #[serde(rename = "dbl", alias = "f64")]
    F64,
}

impl SampleFormat {
    /// All formats in canonical order
    pub const ALL: [SampleFormat; 5] = [
        SampleFormat::U8,
        SampleFormat::S16,
        SampleFormat::S32,
        SampleFormat::F32,
        SampleFormat::F64,
    ];

    /// Size of one sample in bytes
    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }

    /// Whether samples are floating point
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, SampleFormat::F32 | SampleFormat::F64)
    }

    /// Short name used in argument strings and logs
    pub const fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "flt",
            SampleFormat::F64 => "dbl",
        }
    }

    /// Look up a format by its position in [`SampleFormat::ALL`]
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        let format = match value.to_ascii_lowercase().as_str() {
            "u8" => Some(SampleFormat::U8),
            "s16" => Some(SampleFormat::S16),
            "s32" => Some(SampleFormat::S32),
            "flt" | "f32" => Some(SampleFormat::F32),
            "dbl" | "f64" => Some(SampleFormat::F64),
            other => other.parse::<i64>().ok().and_then(SampleFormat::from_index),
        };
        format.ok_or_else(|| ConvertError::InvalidSampleFormat {
            value: value.to_string(),
        })
    }
}

// ============================================================================
// Packing
// ============================================================================

/// Storage arrangement of a multi-channel stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packing {
    /// All channels interleaved in one buffer
    #[default]
    #[serde(alias = "interleaved")]
    Packed,
    /// One contiguous buffer per channel
    Planar,
}

impl Packing {
    /// Number of data planes a buffer of `channels` channels needs
    #[inline]
    pub fn planes(&self, channels: usize) -> usize {
        match self {
            Packing::Packed => 1,
            Packing::Planar => channels,
        }
    }
}

impl fmt::Display for Packing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packing::Packed => write!(f, "packed"),
            Packing::Planar => write!(f, "planar"),
        }
    }
}

impl FromStr for Packing {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "packed" | "interleaved" | "0" => Ok(Packing::Packed),
            "planar" | "1" => Ok(Packing::Planar),
            _ => Err(ConvertError::InvalidPacking {
                value: s.trim().to_string(),
            }),
        }
    }
}

// ============================================================================
// Stream Format
// ============================================================================

/// Format, layout and packing of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_format: SampleFormat,
    pub layout: ChannelLayout,
    #[serde(default)]
    pub packing: Packing,
}

impl StreamFormat {
    pub fn new(sample_format: SampleFormat, layout: ChannelLayout, packing: Packing) -> Self {
        Self {
            sample_format,
            layout,
            packing,
        }
    }

    /// Packed stream of the given format and layout
    pub fn packed(sample_format: SampleFormat, layout: ChannelLayout) -> Self {
        Self::new(sample_format, layout, Packing::Packed)
    }

    /// Planar stream of the given format and layout
    pub fn planar(sample_format: SampleFormat, layout: ChannelLayout) -> Self {
        Self::new(sample_format, layout, Packing::Planar)
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.layout.num_channels()
    }

    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes_per_sample()
    }

    #[inline]
    pub fn planes(&self) -> usize {
        self.packing.planes(self.channels())
    }

    /// Bytes one plane needs to hold `nb_samples` samples per channel, or
    /// `None` if that overflows `usize`
    pub fn plane_len(&self, nb_samples: usize) -> Option<usize> {
        let per_plane_channels = match self.packing {
            Packing::Packed => self.channels(),
            Packing::Planar => 1,
        };
        nb_samples.checked_mul(per_plane_channels * self.bytes_per_sample())
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.sample_format, self.layout, self.packing)
    }
}

/// Parses `fmt:layout[:packing]`; packing defaults to packed.
impl FromStr for StreamFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split(':');
        let (Some(format), Some(layout)) = (fields.next(), fields.next()) else {
            return Err(ConvertError::InvalidArguments {
                reason: format!("expected fmt:layout[:packing], got '{}'", s),
            });
        };
        let packing = match fields.next() {
            Some(p) => p.parse()?,
            None => Packing::Packed,
        };
        if fields.next().is_some() {
            return Err(ConvertError::InvalidArguments {
                reason: format!("too many fields in '{}'", s),
            });
        }
        Ok(Self::new(format.parse()?, layout.parse()?, packing))
    }
}

// ============================================================================
// Tests
// ============================================================================
