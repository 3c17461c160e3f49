//! Channel rematrixing
//!
//! Each supported (input layout, output layout) pair maps to one
//! [`RematrixKind`]. The per-sample mixing rule of every kind is written once
//! against [`Sample`]; a [`Rematrix`] binds the rule to a concrete format at
//! configuration time and stores the resulting kernel as a plain function
//! pointer. Kernels gather one sample of every input channel through a
//! [`ChannelMap`], mix, then scatter the outputs through another map, so the
//! same kernel serves packed and planar buffers in any combination.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dsp::sample::Sample;
use crate::engine::layout::MAX_CHANNELS;
use crate::engine::stride::{ChannelMap, ChannelPtr};
use crate::engine::{ChannelLayout, SampleFormat};
use crate::error::{ConvertError, Result};

// ============================================================================
// Mix Levels
// ============================================================================

/// Gains used by the surround formulas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixLevels {
    /// Weight of the center channel in a 5.1 to stereo downmix (-3 dB)
    pub center: f64,
    /// Weight of each rear channel in a 5.1 to stereo downmix (-6 dB)
    pub surround: f64,
    /// Gain applied to the front pair to feed the rear pair in a
    /// stereo to 5.1 upmix. Zero leaves the rear channels silent.
    pub rear_upmix: f64,
}

impl Default for MixLevels {
    fn default() -> Self {
        Self {
            center: 0.7,
            surround: 0.5,
            rear_upmix: 0.0,
        }
    }
}

impl MixLevels {
    /// Reject gains that are not finite numbers
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("center", self.center),
            ("surround", self.surround),
            ("rear_upmix", self.rear_upmix),
        ] {
            if !value.is_finite() {
                return Err(ConvertError::InvalidArguments {
                    reason: format!("mix level '{}' must be finite, got {}", name, value),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Rematrix Kinds
// ============================================================================

/// Supported channel transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RematrixKind {
    /// Duplicate the single channel into left and right
    MonoToStereo,
    /// Average left and right
    StereoToMono,
    /// Keep L/R, average into C, silence LFE, rears scaled by `rear_upmix`
    StereoToFivePointOne,
    /// L + surround * RL + center * C (and mirrored for R), saturated
    FivePointOneToStereo,
    /// First two input channels verbatim, others ignored
    StereoDownmix,
    /// Average of the first two input channels, others ignored
    MonoDownmix,
}

impl RematrixKind {
    /// Pick the transform for a layout pair.
    ///
    /// Returns `Ok(None)` when the layouts are identical. Dedicated formulas
    /// win over the generic downmixes; anything else is a configuration error.
    pub fn select(input: ChannelLayout, output: ChannelLayout) -> Result<Option<Self>> {
        use ChannelLayout::*;

        if input == output {
            return Ok(None);
        }
        let kind = match (input, output) {
            (Stereo, Mono) => RematrixKind::StereoToMono,
            (Stereo, FivePointOne) => RematrixKind::StereoToFivePointOne,
            (Mono, Stereo) => RematrixKind::MonoToStereo,
            (FivePointOne, Stereo) => RematrixKind::FivePointOneToStereo,
            (_, Mono) if input.num_channels() >= 2 => RematrixKind::MonoDownmix,
            (_, Stereo) if input.num_channels() >= 2 => RematrixKind::StereoDownmix,
            _ => {
                return Err(ConvertError::UnsupportedLayoutConversion {
                    from: input,
                    to: output,
                })
            }
        };
        Ok(Some(kind))
    }
}

impl fmt::Display for RematrixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RematrixKind::MonoToStereo => "mono_to_stereo",
            RematrixKind::StereoToMono => "stereo_to_mono",
            RematrixKind::StereoToFivePointOne => "stereo_to_5.1",
            RematrixKind::FivePointOneToStereo => "5.1_to_stereo",
            RematrixKind::StereoDownmix => "stereo_downmix",
            RematrixKind::MonoDownmix => "mono_downmix",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Mixing Rules
// ============================================================================

/// Per-sample mixing rule of one transform
trait Matrix {
    fn mix<T: Sample>(levels: &MixLevels, input: &[T], output: &mut [T]);
}

mod matrix {
    use super::{Matrix, MixLevels, Sample};

    pub struct MonoToStereo;
    pub struct StereoToMono;
    pub struct StereoToFivePointOne;
    pub struct FivePointOneToStereo;
    pub struct StereoDownmix;
    pub struct MonoDownmix;

    impl Matrix for MonoToStereo {
        #[inline(always)]
        fn mix<T: Sample>(_: &MixLevels, input: &[T], output: &mut [T]) {
            output[0] = input[0];
            output[1] = input[0];
        }
    }

    impl Matrix for StereoToMono {
        #[inline(always)]
        fn mix<T: Sample>(_: &MixLevels, input: &[T], output: &mut [T]) {
            output[0] = T::average(input[0], input[1]);
        }
    }

    impl Matrix for StereoToFivePointOne {
        #[inline(always)]
        fn mix<T: Sample>(levels: &MixLevels, input: &[T], output: &mut [T]) {
            let (left, right) = (input[0], input[1]);
            output[0] = left;
            output[1] = right;
            output[2] = T::average(left, right);
            output[3] = T::SILENCE;
            output[4] = T::from_mix(left.to_mix() * levels.rear_upmix);
            output[5] = T::from_mix(right.to_mix() * levels.rear_upmix);
        }
    }

    impl Matrix for FivePointOneToStereo {
        #[inline(always)]
        fn mix<T: Sample>(levels: &MixLevels, input: &[T], output: &mut [T]) {
            // L R C LFE RL RR; LFE does not contribute
            let center = levels.center * input[2].to_mix();
            output[0] = T::from_mix(input[0].to_mix() + levels.surround * input[4].to_mix() + center);
            output[1] = T::from_mix(input[1].to_mix() + levels.surround * input[5].to_mix() + center);
        }
    }

    impl Matrix for StereoDownmix {
        #[inline(always)]
        fn mix<T: Sample>(_: &MixLevels, input: &[T], output: &mut [T]) {
            output[0] = input[0];
            output[1] = input[1];
        }
    }

    impl Matrix for MonoDownmix {
        #[inline(always)]
        fn mix<T: Sample>(_: &MixLevels, input: &[T], output: &mut [T]) {
            output[0] = T::average(input[0], input[1]);
        }
    }
}

// ============================================================================
// Kernels
// ============================================================================

type RematrixKernel = fn(
    levels: &MixLevels,
    src: &[Vec<u8>],
    src_map: &ChannelMap,
    dst: &mut [Vec<u8>],
    dst_map: &ChannelMap,
    nb_samples: usize,
);

type InPlaceKernel = fn(
    levels: &MixLevels,
    planes: &mut [Vec<u8>],
    src_map: &ChannelMap,
    dst_map: &ChannelMap,
    nb_samples: usize,
);

/// Read and write access to the planes a kernel walks
trait PlaneAccess {
    fn read<T: Sample>(&self, ptr: ChannelPtr, index: usize) -> T;
    fn write<T: Sample>(&mut self, ptr: ChannelPtr, index: usize, value: T);
}

/// Separate source and destination buffers
struct SplitPlanes<'a> {
    src: &'a [Vec<u8>],
    dst: &'a mut [Vec<u8>],
}

impl PlaneAccess for SplitPlanes<'_> {
    #[inline(always)]
    fn read<T: Sample>(&self, ptr: ChannelPtr, index: usize) -> T {
        T::read(&self.src[ptr.plane], ptr.position(index))
    }

    #[inline(always)]
    fn write<T: Sample>(&mut self, ptr: ChannelPtr, index: usize, value: T) {
        value.write(&mut self.dst[ptr.plane], ptr.position(index));
    }
}

/// Source and destination sharing one buffer
struct SharedPlanes<'a>(&'a mut [Vec<u8>]);

impl PlaneAccess for SharedPlanes<'_> {
    #[inline(always)]
    fn read<T: Sample>(&self, ptr: ChannelPtr, index: usize) -> T {
        T::read(&self.0[ptr.plane], ptr.position(index))
    }

    #[inline(always)]
    fn write<T: Sample>(&mut self, ptr: ChannelPtr, index: usize, value: T) {
        value.write(&mut self.0[ptr.plane], ptr.position(index));
    }
}

/// Gather one sample per input channel, mix, scatter to the output channels
fn mix_frames<T: Sample, M: Matrix, P: PlaneAccess>(
    levels: &MixLevels,
    planes: &mut P,
    src_map: &ChannelMap,
    dst_map: &ChannelMap,
    nb_samples: usize,
) {
    let mut frame_in = [T::SILENCE; MAX_CHANNELS];
    let mut frame_out = [T::SILENCE; MAX_CHANNELS];
    let (n_in, n_out) = (src_map.len(), dst_map.len());

    for i in 0..nb_samples {
        for (slot, ptr) in frame_in.iter_mut().zip(src_map.iter()) {
            *slot = planes.read(ptr, i);
        }
        M::mix(levels, &frame_in[..n_in], &mut frame_out[..n_out]);
        for (&value, ptr) in frame_out.iter().zip(dst_map.iter()) {
            planes.write(ptr, i, value);
        }
    }
}

fn run<T: Sample, M: Matrix>(
    levels: &MixLevels,
    src: &[Vec<u8>],
    src_map: &ChannelMap,
    dst: &mut [Vec<u8>],
    dst_map: &ChannelMap,
    nb_samples: usize,
) {
    mix_frames::<T, M, _>(levels, &mut SplitPlanes { src, dst }, src_map, dst_map, nb_samples);
}

/// Same as [`run`] with source and destination sharing one buffer.
///
/// Only valid when the output has fewer channels and the same packing as the
/// input: every write then lands at or before data that was already read.
fn run_in_place<T: Sample, M: Matrix>(
    levels: &MixLevels,
    planes: &mut [Vec<u8>],
    src_map: &ChannelMap,
    dst_map: &ChannelMap,
    nb_samples: usize,
) {
    mix_frames::<T, M, _>(levels, &mut SharedPlanes(planes), src_map, dst_map, nb_samples);
}

macro_rules! kernels_for {
    ($matrix:ty, $format:expr) => {
        match $format {
            SampleFormat::U8 => (
                run::<u8, $matrix> as RematrixKernel,
                run_in_place::<u8, $matrix> as InPlaceKernel,
            ),
            SampleFormat::S16 => (
                run::<i16, $matrix> as RematrixKernel,
                run_in_place::<i16, $matrix> as InPlaceKernel,
            ),
            SampleFormat::S32 => (
                run::<i32, $matrix> as RematrixKernel,
                run_in_place::<i32, $matrix> as InPlaceKernel,
            ),
            SampleFormat::F32 => (
                run::<f32, $matrix> as RematrixKernel,
                run_in_place::<f32, $matrix> as InPlaceKernel,
            ),
            SampleFormat::F64 => (
                run::<f64, $matrix> as RematrixKernel,
                run_in_place::<f64, $matrix> as InPlaceKernel,
            ),
        }
    };
}

// ============================================================================
// Rematrix
// ============================================================================

/// A channel transform bound to one sample format
#[derive(Clone, Copy)]
pub struct Rematrix {
    kind: RematrixKind,
    format: SampleFormat,
    input: ChannelLayout,
    output: ChannelLayout,
    levels: MixLevels,
    kernel: RematrixKernel,
    in_place_kernel: InPlaceKernel,
}

impl Rematrix {
    /// Bind the transform for `input -> output` in `format`.
    ///
    /// Returns `Ok(None)` when no rematrix is needed.
    pub fn new(
        input: ChannelLayout,
        output: ChannelLayout,
        format: SampleFormat,
        levels: MixLevels,
    ) -> Result<Option<Self>> {
        levels.validate()?;
        let Some(kind) = RematrixKind::select(input, output)? else {
            return Ok(None);
        };

        let (kernel, in_place_kernel) = match kind {
            RematrixKind::MonoToStereo => kernels_for!(matrix::MonoToStereo, format),
            RematrixKind::StereoToMono => kernels_for!(matrix::StereoToMono, format),
            RematrixKind::StereoToFivePointOne => kernels_for!(matrix::StereoToFivePointOne, format),
            RematrixKind::FivePointOneToStereo => kernels_for!(matrix::FivePointOneToStereo, format),
            RematrixKind::StereoDownmix => kernels_for!(matrix::StereoDownmix, format),
            RematrixKind::MonoDownmix => kernels_for!(matrix::MonoDownmix, format),
        };

        Ok(Some(Self {
            kind,
            format,
            input,
            output,
            levels,
            kernel,
            in_place_kernel,
        }))
    }

    #[inline]
    pub fn kind(&self) -> RematrixKind {
        self.kind
    }

    /// Whether the transform can run inside its input buffer
    #[inline]
    pub fn reduces_channels(&self) -> bool {
        self.output.num_channels() < self.input.num_channels()
    }

    fn check_maps(&self, src_map: &ChannelMap, dst_map: &ChannelMap) -> Result<()> {
        if src_map.len() != self.input.num_channels() || dst_map.len() != self.output.num_channels() {
            return Err(ConvertError::InvalidFrame {
                reason: format!(
                    "{} expects {} -> {} channels, got {} -> {}",
                    self.kind,
                    self.input.num_channels(),
                    self.output.num_channels(),
                    src_map.len(),
                    dst_map.len()
                ),
            });
        }
        Ok(())
    }

    /// Mix `nb_samples` samples from `src` into `dst`
    pub fn apply(
        &self,
        src: &[Vec<u8>],
        src_map: &ChannelMap,
        dst: &mut [Vec<u8>],
        dst_map: &ChannelMap,
        nb_samples: usize,
    ) -> Result<()> {
        self.check_maps(src_map, dst_map)?;
        let width = self.format.bytes_per_sample();
        src_map.check_fits(src, nb_samples, width)?;
        dst_map.check_fits(dst, nb_samples, width)?;
        (self.kernel)(&self.levels, src, src_map, dst, dst_map, nb_samples);
        Ok(())
    }

    /// Mix inside one buffer; only for channel-reducing transforms whose
    /// maps share a packing.
    pub fn apply_in_place(
        &self,
        planes: &mut [Vec<u8>],
        src_map: &ChannelMap,
        dst_map: &ChannelMap,
        nb_samples: usize,
    ) -> Result<()> {
        self.check_maps(src_map, dst_map)?;
        if !self.reduces_channels() {
            return Err(ConvertError::InvalidArguments {
                reason: format!("{} cannot run in place", self.kind),
            });
        }
        let width = self.format.bytes_per_sample();
        src_map.check_fits(planes, nb_samples, width)?;
        dst_map.check_fits(planes, nb_samples, width)?;
        (self.in_place_kernel)(&self.levels, planes, src_map, dst_map, nb_samples);
        Ok(())
    }
}

impl fmt::Debug for Rematrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rematrix")
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("levels", &self.levels)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Packing;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn packed<T: Sample>(values: &[T]) -> Vec<Vec<u8>> {
        let width = T::FORMAT.bytes_per_sample();
        let mut bytes = vec![0u8; values.len() * width];
        for (i, v) in values.iter().enumerate() {
            v.write(&mut bytes, i * width);
        }
        vec![bytes]
    }

    fn read_all<T: Sample>(plane: &[u8]) -> Vec<T> {
        let width = T::FORMAT.bytes_per_sample();
        (0..plane.len() / width).map(|i| T::read(plane, i * width)).collect()
    }

    /// Run a packed-to-packed rematrix over typed samples
    fn remix<T: Sample>(input: ChannelLayout, output: ChannelLayout, samples: &[T]) -> Vec<T> {
        let rematrix = Rematrix::new(input, output, T::FORMAT, MixLevels::default())
            .unwrap()
            .unwrap();
        let width = T::FORMAT.bytes_per_sample();
        let nb_samples = samples.len() / input.num_channels();
        let src = packed(samples);
        let mut dst = vec![vec![0u8; nb_samples * output.num_channels() * width]];
        rematrix
            .apply(
                &src,
                &ChannelMap::with_layout(Packing::Packed, input.num_channels(), width),
                &mut dst,
                &ChannelMap::with_layout(Packing::Packed, output.num_channels(), width),
                nb_samples,
            )
            .unwrap();
        read_all(&dst[0])
    }

    #[test_case(ChannelLayout::Stereo, ChannelLayout::Mono, Some(RematrixKind::StereoToMono))]
    #[test_case(ChannelLayout::Stereo, ChannelLayout::FivePointOne, Some(RematrixKind::StereoToFivePointOne))]
    #[test_case(ChannelLayout::Mono, ChannelLayout::Stereo, Some(RematrixKind::MonoToStereo))]
    #[test_case(ChannelLayout::FivePointOne, ChannelLayout::Stereo, Some(RematrixKind::FivePointOneToStereo))]
    #[test_case(ChannelLayout::SevenPointOne, ChannelLayout::Stereo, Some(RematrixKind::StereoDownmix))]
    #[test_case(ChannelLayout::Quad, ChannelLayout::Mono, Some(RematrixKind::MonoDownmix))]
    #[test_case(ChannelLayout::FivePointOne, ChannelLayout::Mono, Some(RematrixKind::MonoDownmix))]
    #[test_case(ChannelLayout::Quad, ChannelLayout::Quad, None)]
    fn test_select(input: ChannelLayout, output: ChannelLayout, expected: Option<RematrixKind>) {
        assert_eq!(RematrixKind::select(input, output).unwrap(), expected);
    }

    #[test_case(ChannelLayout::Mono, ChannelLayout::FivePointOne)]
    #[test_case(ChannelLayout::Stereo, ChannelLayout::SevenPointOne)]
    #[test_case(ChannelLayout::FivePointOne, ChannelLayout::Quad)]
    #[test_case(ChannelLayout::TwoPointOne, ChannelLayout::Surround)]
    fn test_select_unsupported(input: ChannelLayout, output: ChannelLayout) {
        assert!(matches!(
            RematrixKind::select(input, output),
            Err(ConvertError::UnsupportedLayoutConversion { .. })
        ));
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        assert_eq!(
            remix::<i16>(ChannelLayout::Mono, ChannelLayout::Stereo, &[500, -7]),
            vec![500, 500, -7, -7]
        );
        assert_eq!(
            remix::<f32>(ChannelLayout::Mono, ChannelLayout::Stereo, &[0.25]),
            vec![0.25, 0.25]
        );
    }

    #[test]
    fn test_stereo_to_mono_truncates_integers() {
        assert_eq!(
            remix::<i16>(ChannelLayout::Stereo, ChannelLayout::Mono, &[100, 300, 101, 300, -1, 0]),
            vec![200, 200, -1]
        );
        assert_eq!(
            remix::<u8>(ChannelLayout::Stereo, ChannelLayout::Mono, &[255, 255, 0, 1]),
            vec![255, 0]
        );
        assert_eq!(
            remix::<i32>(ChannelLayout::Stereo, ChannelLayout::Mono, &[i32::MAX, i32::MAX]),
            vec![i32::MAX]
        );
    }

    #[test]
    fn test_stereo_to_mono_divides_floats() {
        assert_eq!(
            remix::<f64>(ChannelLayout::Stereo, ChannelLayout::Mono, &[0.5, 0.25, -1.0, 0.0]),
            vec![0.375, -0.5]
        );
    }

    #[test]
    fn test_stereo_to_five_point_one() {
        assert_eq!(
            remix::<i16>(ChannelLayout::Stereo, ChannelLayout::FivePointOne, &[1000, 3001]),
            vec![1000, 3001, 2000, 0, 0, 0]
        );
        // Silence for unsigned samples is mid-scale
        assert_eq!(
            remix::<u8>(ChannelLayout::Stereo, ChannelLayout::FivePointOne, &[200, 100]),
            vec![200, 100, 150, 128, 128, 128]
        );
    }

    #[test]
    fn test_stereo_to_five_point_one_rear_gain() {
        let levels = MixLevels {
            rear_upmix: 0.5,
            ..MixLevels::default()
        };
        let rematrix = Rematrix::new(
            ChannelLayout::Stereo,
            ChannelLayout::FivePointOne,
            SampleFormat::S16,
            levels,
        )
        .unwrap()
        .unwrap();
        let src = packed::<i16>(&[1000, -3000]);
        let mut dst = vec![vec![0u8; 12]];
        rematrix
            .apply(
                &src,
                &ChannelMap::with_layout(Packing::Packed, 2, 2),
                &mut dst,
                &ChannelMap::with_layout(Packing::Packed, 6, 2),
                1,
            )
            .unwrap();
        assert_eq!(read_all::<i16>(&dst[0]), vec![1000, -3000, -1000, 0, 500, -1500]);
    }

    #[test]
    fn test_five_point_one_to_stereo_ignores_lfe() {
        let out = remix::<i16>(
            ChannelLayout::FivePointOne,
            ChannelLayout::Stereo,
            &[1000, 2000, 300, 999, 400, 600],
        );
        assert_eq!(out, vec![1410, 2510]);

        let without_lfe = remix::<i16>(
            ChannelLayout::FivePointOne,
            ChannelLayout::Stereo,
            &[1000, 2000, 300, 0, 400, 600],
        );
        assert_eq!(out, without_lfe);
    }

    #[test]
    fn test_five_point_one_to_stereo_saturates() {
        let out = remix::<i16>(
            ChannelLayout::FivePointOne,
            ChannelLayout::Stereo,
            &[30000, -30000, 20000, 0, 20000, -20000],
        );
        assert_eq!(out, vec![i16::MAX, -26000]);

        let unsigned = remix::<u8>(
            ChannelLayout::FivePointOne,
            ChannelLayout::Stereo,
            &[255, 0, 128, 128, 255, 0],
        );
        assert_eq!(unsigned, vec![255, 0]);
    }

    #[test]
    fn test_five_point_one_to_stereo_float() {
        let out = remix::<f32>(
            ChannelLayout::FivePointOne,
            ChannelLayout::Stereo,
            &[0.1, 0.2, 0.3, 0.9, 0.4, 0.6],
        );
        approx::assert_relative_eq!(out[0], 0.51, epsilon = 1e-6);
        approx::assert_relative_eq!(out[1], 0.71, epsilon = 1e-6);
    }

    #[test]
    fn test_generic_downmixes_use_first_two_channels() {
        let seven_one: Vec<i16> = vec![10, 20, 30, 40, 50, 60, 70, 80];
        assert_eq!(
            remix::<i16>(ChannelLayout::SevenPointOne, ChannelLayout::Stereo, &seven_one),
            vec![10, 20]
        );
        assert_eq!(
            remix::<i16>(ChannelLayout::Quad, ChannelLayout::Mono, &[11, 20, 1000, 1000]),
            vec![15]
        );
    }

    #[test]
    fn test_planar_matches_packed() {
        let rematrix = Rematrix::new(
            ChannelLayout::Stereo,
            ChannelLayout::Mono,
            SampleFormat::S32,
            MixLevels::default(),
        )
        .unwrap()
        .unwrap();
        let left = packed::<i32>(&[10, 20, 31]).remove(0);
        let right = packed::<i32>(&[30, 40, 50]).remove(0);
        let src = vec![left, right];
        let mut dst = vec![vec![0u8; 12]];
        rematrix
            .apply(
                &src,
                &ChannelMap::with_layout(Packing::Planar, 2, 4),
                &mut dst,
                &ChannelMap::with_layout(Packing::Planar, 1, 4),
                3,
            )
            .unwrap();
        assert_eq!(read_all::<i32>(&dst[0]), vec![20, 30, 40]);
    }

    #[test]
    fn test_in_place_downmix_packed() {
        let rematrix = Rematrix::new(
            ChannelLayout::FivePointOne,
            ChannelLayout::Stereo,
            SampleFormat::S16,
            MixLevels::default(),
        )
        .unwrap()
        .unwrap();
        let mut planes = packed::<i16>(&[1000, 2000, 300, 999, 400, 600, 0, 0, 0, 0, 100, 100]);
        rematrix
            .apply_in_place(
                &mut planes,
                &ChannelMap::with_layout(Packing::Packed, 6, 2),
                &ChannelMap::with_layout(Packing::Packed, 2, 2),
                2,
            )
            .unwrap();
        assert_eq!(&read_all::<i16>(&planes[0])[..4], &[1410, 2510, 50, 50]);
    }

    #[test_case(ChannelLayout::Stereo, ChannelLayout::Mono)]
    #[test_case(ChannelLayout::FivePointOne, ChannelLayout::Stereo)]
    #[test_case(ChannelLayout::SevenPointOne, ChannelLayout::Stereo)]
    #[test_case(ChannelLayout::Quad, ChannelLayout::Mono)]
    fn test_in_place_matches_separate_buffers(input: ChannelLayout, output: ChannelLayout) {
        let nb_samples = 5;
        let samples: Vec<i16> = (0..input.num_channels() * nb_samples)
            .map(|i| i as i16 * 700 - 9000)
            .collect();
        let expected = remix(input, output, &samples);

        let rematrix = Rematrix::new(input, output, SampleFormat::S16, MixLevels::default())
            .unwrap()
            .unwrap();
        let mut planes = packed(&samples);
        rematrix
            .apply_in_place(
                &mut planes,
                &ChannelMap::with_layout(Packing::Packed, input.num_channels(), 2),
                &ChannelMap::with_layout(Packing::Packed, output.num_channels(), 2),
                nb_samples,
            )
            .unwrap();
        assert_eq!(&read_all::<i16>(&planes[0])[..expected.len()], &expected[..]);
    }

    #[test]
    fn test_in_place_rejects_upmix() {
        let rematrix = Rematrix::new(
            ChannelLayout::Mono,
            ChannelLayout::Stereo,
            SampleFormat::S16,
            MixLevels::default(),
        )
        .unwrap()
        .unwrap();
        let mut planes = vec![vec![0u8; 8]];
        let result = rematrix.apply_in_place(
            &mut planes,
            &ChannelMap::with_layout(Packing::Packed, 1, 2),
            &ChannelMap::with_layout(Packing::Packed, 2, 2),
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_finite_levels() {
        let levels = MixLevels {
            center: f64::NAN,
            ..MixLevels::default()
        };
        assert!(Rematrix::new(ChannelLayout::FivePointOne, ChannelLayout::Stereo, SampleFormat::F32, levels).is_err());
    }

    #[test]
    fn test_identity_layout_needs_no_rematrix() {
        let rematrix = Rematrix::new(
            ChannelLayout::Stereo,
            ChannelLayout::Stereo,
            SampleFormat::F32,
            MixLevels::default(),
        )
        .unwrap();
        assert!(rematrix.is_none());
    }
}
