//! Strided sample-format conversion
//!
//! A [`SampleConverter`] binds the kernel for one (source, destination)
//! format pair when it is created; converting a batch then walks each
//! channel through its pointer/stride entry without any per-sample dispatch.

use std::fmt;

use crate::dsp::sample::{convert_sample, Sample};
use crate::engine::stride::{ChannelMap, ChannelPtr};
use crate::engine::SampleFormat;
use crate::error::{ConvertError, Result};

/// Kernel converting `len` values of one channel
pub type ConvertKernel = fn(src: &[u8], src_ptr: ChannelPtr, dst: &mut [u8], dst_ptr: ChannelPtr, len: usize);

fn convert_run<S: Sample, D: Sample>(
    src: &[u8],
    src_ptr: ChannelPtr,
    dst: &mut [u8],
    dst_ptr: ChannelPtr,
    len: usize,
) {
    for i in 0..len {
        let sample = S::read(src, src_ptr.position(i));
        convert_sample::<S, D>(sample).write(dst, dst_ptr.position(i));
    }
}

macro_rules! kernel_to {
    ($src:ty, $dst:expr) => {
        match $dst {
            SampleFormat::U8 => convert_run::<$src, u8> as ConvertKernel,
            SampleFormat::S16 => convert_run::<$src, i16> as ConvertKernel,
            SampleFormat::S32 => convert_run::<$src, i32> as ConvertKernel,
            SampleFormat::F32 => convert_run::<$src, f32> as ConvertKernel,
            SampleFormat::F64 => convert_run::<$src, f64> as ConvertKernel,
        }
    };
}

fn select_kernel(input: SampleFormat, output: SampleFormat) -> ConvertKernel {
    match input {
        SampleFormat::U8 => kernel_to!(u8, output),
        SampleFormat::S16 => kernel_to!(i16, output),
        SampleFormat::S32 => kernel_to!(i32, output),
        SampleFormat::F32 => kernel_to!(f32, output),
        SampleFormat::F64 => kernel_to!(f64, output),
    }
}

/// Converter for one source/destination format pair
///
/// Every pairing of the five formats has a kernel, so construction cannot
/// fail; invalid format names are rejected earlier, when they are parsed.
#[derive(Clone, Copy)]
pub struct SampleConverter {
    input: SampleFormat,
    output: SampleFormat,
    kernel: ConvertKernel,
}

impl SampleConverter {
    pub fn new(input: SampleFormat, output: SampleFormat) -> Self {
        Self {
            input,
            output,
            kernel: select_kernel(input, output),
        }
    }

    /// Convert one channel run between two planes
    pub fn convert_channel(
        &self,
        src: &[u8],
        src_ptr: ChannelPtr,
        dst: &mut [u8],
        dst_ptr: ChannelPtr,
        len: usize,
    ) {
        let in_width = self.input.bytes_per_sample();
        let contiguous = src_ptr.stride == in_width && dst_ptr.stride == in_width;
        if self.input == self.output && contiguous {
            let bytes = len * in_width;
            dst[dst_ptr.offset..dst_ptr.offset + bytes]
                .copy_from_slice(&src[src_ptr.offset..src_ptr.offset + bytes]);
        } else {
            (self.kernel)(src, src_ptr, dst, dst_ptr, len);
        }
    }

    /// Convert `len` values per channel entry from `src` into `dst`
    pub fn convert(
        &self,
        src: &[Vec<u8>],
        src_map: &ChannelMap,
        dst: &mut [Vec<u8>],
        dst_map: &ChannelMap,
        len: usize,
    ) -> Result<()> {
        if src_map.len() != dst_map.len() {
            return Err(ConvertError::InvalidFrame {
                reason: format!(
                    "channel count mismatch: {} source entries, {} destination entries",
                    src_map.len(),
                    dst_map.len()
                ),
            });
        }
        src_map.check_fits(src, len, self.input.bytes_per_sample())?;
        dst_map.check_fits(dst, len, self.output.bytes_per_sample())?;

        for (src_ptr, dst_ptr) in src_map.iter().zip(dst_map.iter()) {
            self.convert_channel(&src[src_ptr.plane], src_ptr, &mut dst[dst_ptr.plane], dst_ptr, len);
        }
        Ok(())
    }
}

impl fmt::Debug for SampleConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleConverter")
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}
