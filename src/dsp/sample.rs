//! Per-format sample arithmetic
//!
//! [`Sample`] is implemented once per canonical representation. The
//! conversion and rematrix algorithms are written generically against it, so
//! the five format variants share one definition of each algorithm.
//!
//! Integer samples are related through a left-aligned signed 32-bit view
//! (`u8` is re-centred by 128 first), which makes integer widening and
//! narrowing plain shifts. Integer/float conversion scales by the integer
//! format's full-scale magnitude; float to integer rounds to nearest (ties
//! to even) and saturates.

use std::fmt::Debug;

use num_traits::Bounded;

use crate::engine::SampleFormat;

/// Full scale of the left-aligned 32-bit view (2^31)
const ALIGNED_FULL_SCALE: f64 = 2_147_483_648.0;

/// A sample value of one of the canonical formats
pub trait Sample: Copy + PartialEq + PartialOrd + Debug + Send + Sync + Bounded + 'static {
    /// Format tag of this representation
    const FORMAT: SampleFormat;

    /// Value representing a zero signal
    const SILENCE: Self;

    /// Read a native-endian sample at byte position `pos`
    fn read(bytes: &[u8], pos: usize) -> Self;

    /// Write this sample native-endian at byte position `pos`
    fn write(self, bytes: &mut [u8], pos: usize);

    /// Signed value left-aligned to 32 bits
    fn to_aligned(self) -> i32;

    /// Inverse of [`Sample::to_aligned`]; narrowing truncates (arithmetic shift)
    fn from_aligned(value: i32) -> Self;

    /// Value on the nominal [-1, 1] scale
    fn to_normalized(self) -> f64;

    /// Scale from [-1, 1], rounding and saturating for integer formats
    fn from_normalized(value: f64) -> Self;

    /// Mean of two samples in the format's native arithmetic
    fn average(a: Self, b: Self) -> Self;

    /// Zero-centred value in the format's own units
    fn to_mix(self) -> f64;

    /// Inverse of [`Sample::to_mix`], rounding and saturating for integers
    fn from_mix(value: f64) -> Self;
}

macro_rules! impl_int_sample {
    ($type:ty, $format:expr, $bits:expr, $offset:expr) => {
        impl Sample for $type {
            const FORMAT: SampleFormat = $format;
            const SILENCE: Self = $offset as $type;

            #[inline(always)]
            fn read(bytes: &[u8], pos: usize) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$type>()];
                raw.copy_from_slice(&bytes[pos..pos + std::mem::size_of::<$type>()]);
                <$type>::from_ne_bytes(raw)
            }

            #[inline(always)]
            fn write(self, bytes: &mut [u8], pos: usize) {
                bytes[pos..pos + std::mem::size_of::<$type>()].copy_from_slice(&self.to_ne_bytes());
            }

            #[inline(always)]
            fn to_aligned(self) -> i32 {
                ((self as i64 - $offset) << (32 - $bits)) as i32
            }

            #[inline(always)]
            fn from_aligned(value: i32) -> Self {
                ((value as i64 >> (32 - $bits)) + $offset) as $type
            }

            #[inline(always)]
            fn to_normalized(self) -> f64 {
                self.to_aligned() as f64 / ALIGNED_FULL_SCALE
            }

            #[inline(always)]
            fn from_normalized(value: f64) -> Self {
                const SCALE: f64 = (1u64 << ($bits - 1)) as f64;
                Self::from_mix(value * SCALE)
            }

            #[inline(always)]
            fn average(a: Self, b: Self) -> Self {
                ((a as i64 + b as i64) >> 1) as $type
            }

            #[inline(always)]
            fn to_mix(self) -> f64 {
                (self as i64 - $offset) as f64
            }

            #[inline(always)]
            fn from_mix(value: f64) -> Self {
                let lo = <$type as Bounded>::min_value() as f64;
                let hi = <$type as Bounded>::max_value() as f64;
                // NaN falls through the clamp and casts to 0.
                (value.round_ties_even() + $offset as f64).clamp(lo, hi) as $type
            }
        }
    };
}

macro_rules! impl_float_sample {
    ($type:ty, $format:expr) => {
        impl Sample for $type {
            const FORMAT: SampleFormat = $format;
            const SILENCE: Self = 0.0;

            #[inline(always)]
            fn read(bytes: &[u8], pos: usize) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$type>()];
                raw.copy_from_slice(&bytes[pos..pos + std::mem::size_of::<$type>()]);
                <$type>::from_ne_bytes(raw)
            }

            #[inline(always)]
            fn write(self, bytes: &mut [u8], pos: usize) {
                bytes[pos..pos + std::mem::size_of::<$type>()].copy_from_slice(&self.to_ne_bytes());
            }

            #[inline(always)]
            fn to_aligned(self) -> i32 {
                <i32 as Sample>::from_normalized(self as f64)
            }

            #[inline(always)]
            fn from_aligned(value: i32) -> Self {
                (value as f64 / ALIGNED_FULL_SCALE) as $type
            }

            #[inline(always)]
            fn to_normalized(self) -> f64 {
                self as f64
            }

            #[inline(always)]
            fn from_normalized(value: f64) -> Self {
                value as $type
            }

            #[inline(always)]
            fn average(a: Self, b: Self) -> Self {
                (a + b) / 2.0
            }

            #[inline(always)]
            fn to_mix(self) -> f64 {
                self as f64
            }

            #[inline(always)]
            fn from_mix(value: f64) -> Self {
                value as $type
            }
        }
    };
}

impl_int_sample!(u8, SampleFormat::U8, 8, 128);
impl_int_sample!(i16, SampleFormat::S16, 16, 0);
impl_int_sample!(i32, SampleFormat::S32, 32, 0);
impl_float_sample!(f32, SampleFormat::F32);
impl_float_sample!(f64, SampleFormat::F64);

/// Convert one sample between representations
///
/// Integer pairs go through the aligned 32-bit view; any pairing involving
/// a float goes through the normalized scale.
#[inline(always)]
pub fn convert_sample<S: Sample, D: Sample>(sample: S) -> D {
    if S::FORMAT.is_float() || D::FORMAT.is_float() {
        D::from_normalized(sample.to_normalized())
    } else {
        D::from_aligned(sample.to_aligned())
    }
}

/// Convert a typed slice into another representation
pub fn convert_samples<S: Sample, D: Sample>(input: &[S]) -> Vec<D> {
    input.iter().map(|&s| convert_sample::<S, D>(s)).collect()
}

// ============================================================================
// Tests
// ============================================================================
