//! Channel layouts
//!
//! A layout names an ordered set of channel roles. Two layouts with the same
//! channel count (2.1 and 3.0, for example) are distinct and never treated as
//! interchangeable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Maximum number of channels any supported layout carries
pub const MAX_CHANNELS: usize = 8;

/// Logical role of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelRole {
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    RearLeft,
    RearRight,
    SideLeft,
    SideRight,
}

impl ChannelRole {
    /// Bit of this role in a channel mask
    pub const fn mask(&self) -> u64 {
        match self {
            ChannelRole::FrontLeft => 0x1,
            ChannelRole::FrontRight => 0x2,
            ChannelRole::FrontCenter => 0x4,
            ChannelRole::LowFrequency => 0x8,
            ChannelRole::RearLeft => 0x10,
            ChannelRole::RearRight => 0x20,
            ChannelRole::SideLeft => 0x200,
            ChannelRole::SideRight => 0x400,
        }
    }
}

use ChannelRole::*;

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// Single channel (mono)
    #[serde(rename = "mono")]
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    #[serde(rename = "stereo")]
    Stereo,
    /// Left, right, LFE
    #[serde(rename = "2.1")]
    TwoPointOne,
    /// Left, right, center
    #[serde(rename = "3.0", alias = "surround")]
    Surround,
    /// Front and rear pairs
    #[serde(rename = "quad")]
    Quad,
    /// Left, right, center, rear left, rear right
    #[serde(rename = "5.0")]
    FivePointZero,
    /// Left, right, center, LFE, rear left, rear right
    #[serde(rename = "5.1")]
    FivePointOne,
    /// 5.1 plus side left, side right
    #[serde(rename = "7.1")]
    SevenPointOne,
}

impl ChannelLayout {
    pub const ALL: [ChannelLayout; 8] = [
        ChannelLayout::Mono,
        ChannelLayout::Stereo,
        ChannelLayout::TwoPointOne,
        ChannelLayout::Surround,
        ChannelLayout::Quad,
        ChannelLayout::FivePointZero,
        ChannelLayout::FivePointOne,
        ChannelLayout::SevenPointOne,
    ];

    /// Ordered channel roles of this layout
    pub const fn roles(&self) -> &'static [ChannelRole] {
        match self {
            ChannelLayout::Mono => &[FrontCenter],
            ChannelLayout::Stereo => &[FrontLeft, FrontRight],
            ChannelLayout::TwoPointOne => &[FrontLeft, FrontRight, LowFrequency],
            ChannelLayout::Surround => &[FrontLeft, FrontRight, FrontCenter],
            ChannelLayout::Quad => &[FrontLeft, FrontRight, RearLeft, RearRight],
            ChannelLayout::FivePointZero => &[FrontLeft, FrontRight, FrontCenter, RearLeft, RearRight],
            ChannelLayout::FivePointOne => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                RearLeft,
                RearRight,
            ],
            ChannelLayout::SevenPointOne => &[
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                RearLeft,
                RearRight,
                SideLeft,
                SideRight,
            ],
        }
    }

    /// Returns the number of channels for this layout
    #[inline]
    pub const fn num_channels(&self) -> usize {
        self.roles().len()
    }

    /// Position of `role` in this layout, if present
    pub fn index_of(&self, role: ChannelRole) -> Option<usize> {
        self.roles().iter().position(|&r| r == role)
    }

    /// Conventional channel mask (one bit per role)
    pub fn mask(&self) -> u64 {
        self.roles().iter().fold(0, |acc, role| acc | role.mask())
    }

    /// Find the layout with exactly this channel mask
    pub fn from_mask(mask: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|layout| layout.mask() == mask)
    }

    /// Short name used in argument strings and logs
    pub const fn name(&self) -> &'static str {
        match self {
            ChannelLayout::Mono => "mono",
            ChannelLayout::Stereo => "stereo",
            ChannelLayout::TwoPointOne => "2.1",
            ChannelLayout::Surround => "3.0",
            ChannelLayout::Quad => "quad",
            ChannelLayout::FivePointZero => "5.0",
            ChannelLayout::FivePointOne => "5.1",
            ChannelLayout::SevenPointOne => "7.1",
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts layout names or a channel mask in decimal or `0x` hex.
impl FromStr for ChannelLayout {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        let lower = value.to_ascii_lowercase();
        let by_name = match lower.as_str() {
            "surround" => Some(ChannelLayout::Surround),
            name => Self::ALL.into_iter().find(|layout| layout.name() == name),
        };
        let layout = by_name.or_else(|| {
            let mask = match lower.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).ok(),
                None => lower.parse::<u64>().ok(),
            };
            mask.and_then(Self::from_mask)
        });
        layout.ok_or_else(|| ConvertError::InvalidChannelLayout {
            value: value.to_string(),
        })
    }
}
