//! Stride and channel-pointer tables
//!
//! Every stage addresses channel `c`, sample `i` as
//! `planes[ptr.plane][ptr.offset + i * ptr.stride]`, so the same kernel
//! walks a channel embedded in an interleaved buffer or stored in its own
//! plane. Offsets and strides are in bytes for frame buffers and in elements
//! for the typed [`interleave`]/[`deinterleave`] helpers.

use serde::Serialize;

use crate::engine::format::{Packing, StreamFormat};
use crate::engine::layout::MAX_CHANNELS;
use crate::error::{ConvertError, Result};

/// Location of one channel inside a set of planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelPtr {
    /// Index of the plane holding this channel
    pub plane: usize,
    /// Offset of the first sample within the plane
    pub offset: usize,
    /// Distance between consecutive samples of this channel
    pub stride: usize,
}

impl ChannelPtr {
    /// Position of sample `index` within the plane.
    ///
    /// Unchecked; kernels only call it for indices a
    /// [`ChannelMap::check_fits`] call has validated.
    #[inline]
    pub fn position(&self, index: usize) -> usize {
        self.offset + index * self.stride
    }

    /// Position of sample `index`, or `None` if it overflows `usize`
    #[inline]
    pub fn checked_position(&self, index: usize) -> Option<usize> {
        index.checked_mul(self.stride)?.checked_add(self.offset)
    }
}

/// Channel-pointer table for one side of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMap {
    channels: Vec<ChannelPtr>,
}

impl ChannelMap {
    /// Build the table for `channels` channels of `unit`-sized samples.
    ///
    /// Packed streams get synthetic pointers into plane 0, each one unit
    /// after the previous, with a stride of one whole frame. A single
    /// channel degenerates to a stride of one unit in either packing.
    pub fn with_layout(packing: Packing, channels: usize, unit: usize) -> Self {
        let entries = (0..channels)
            .map(|c| match packing {
                Packing::Packed => ChannelPtr {
                    plane: 0,
                    offset: c * unit,
                    stride: unit * channels,
                },
                Packing::Planar => ChannelPtr {
                    plane: c,
                    offset: 0,
                    stride: unit,
                },
            })
            .collect();
        Self { channels: entries }
    }

    /// Byte-addressed table for a stream format
    pub fn for_stream(format: &StreamFormat) -> Self {
        Self::with_layout(format.packing, format.channels(), format.bytes_per_sample())
    }

    /// One wide channel covering a whole packed buffer
    pub fn collapsed(unit: usize) -> Self {
        Self {
            channels: vec![ChannelPtr {
                plane: 0,
                offset: 0,
                stride: unit,
            }],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    #[inline]
    pub fn get(&self, channel: usize) -> Option<ChannelPtr> {
        self.channels.get(channel).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChannelPtr> + '_ {
        self.channels.iter().copied()
    }

    /// Per-channel strides
    pub fn strides(&self) -> Vec<usize> {
        self.channels.iter().map(|ptr| ptr.stride).collect()
    }

    /// Verify `len` values of `unit` bytes per entry fit inside `planes`
    pub fn check_fits(&self, planes: &[Vec<u8>], len: usize, unit: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        for ptr in self.iter() {
            let Some(needed) = ptr.checked_position(len - 1).and_then(|pos| pos.checked_add(unit)) else {
                return Err(ConvertError::InvalidFrame {
                    reason: format!("{} samples overflow the addressable range", len),
                });
            };
            match planes.get(ptr.plane) {
                Some(plane) if plane.len() >= needed => {}
                Some(plane) => {
                    return Err(ConvertError::InvalidFrame {
                        reason: format!(
                            "plane {} holds {} bytes, {} needed",
                            ptr.plane,
                            plane.len(),
                            needed
                        ),
                    })
                }
                None => {
                    return Err(ConvertError::InvalidFrame {
                        reason: format!("missing plane {}", ptr.plane),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Input and output tables of a format/arrangement conversion stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageStrides {
    pub input: ChannelMap,
    pub output: ChannelMap,
    /// Whether both sides were collapsed into a single wide channel
    pub collapsed: bool,
}

impl StageStrides {
    /// Tables for converting `input` into `output` (same channel count).
    ///
    /// When both sides are packed the whole buffer is one format-homogeneous
    /// run of `nb_samples * channels` values, so one pass suffices.
    pub fn for_conversion(input: &StreamFormat, output: &StreamFormat) -> Self {
        let both_packed = input.packing == Packing::Packed && output.packing == Packing::Packed;
        if both_packed || input.channels() == 1 {
            Self {
                input: ChannelMap::collapsed(input.bytes_per_sample()),
                output: ChannelMap::collapsed(output.bytes_per_sample()),
                collapsed: true,
            }
        } else {
            Self {
                input: ChannelMap::for_stream(input),
                output: ChannelMap::for_stream(output),
                collapsed: false,
            }
        }
    }

    /// Number of values each channel entry covers for a batch
    #[inline]
    pub fn run_length(&self, nb_samples: usize, channels: usize) -> usize {
        if self.collapsed {
            nb_samples * channels
        } else {
            nb_samples
        }
    }
}

fn check_channels(channels: usize) -> Result<()> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(ConvertError::TooManyChannels {
            channels,
            max: MAX_CHANNELS,
        });
    }
    Ok(())
}

/// Interleave equally long channel slices into one buffer
pub fn interleave<T: Copy>(channels: &[&[T]]) -> Result<Vec<T>> {
    check_channels(channels.len())?;
    let nb_samples = channels[0].len();
    if channels.iter().any(|ch| ch.len() != nb_samples) {
        return Err(ConvertError::InvalidFrame {
            reason: "channels differ in length".to_string(),
        });
    }

    let map = ChannelMap::with_layout(Packing::Packed, channels.len(), 1);
    let mut out = Vec::with_capacity(nb_samples * channels.len());
    // Positions are visited in increasing order, so pushing is enough.
    for i in 0..nb_samples {
        for (c, ptr) in map.iter().enumerate() {
            debug_assert_eq!(ptr.position(i), out.len());
            out.push(channels[c][i]);
        }
    }
    Ok(out)
}

/// Split an interleaved buffer into one vector per channel
pub fn deinterleave<T: Copy>(interleaved: &[T], channels: usize) -> Result<Vec<Vec<T>>> {
    check_channels(channels)?;
    if interleaved.len() % channels != 0 {
        return Err(ConvertError::InvalidFrame {
            reason: format!(
                "Interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                channels
            ),
        });
    }

    let nb_samples = interleaved.len() / channels;
    let map = ChannelMap::with_layout(Packing::Packed, channels, 1);
    Ok(map
        .iter()
        .map(|ptr| (0..nb_samples).map(|i| interleaved[ptr.position(i)]).collect())
        .collect())
}
