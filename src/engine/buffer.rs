//! Sample buffers and audio frames
//!
//! A [`SampleBuffer`] owns the raw planes of a batch: one plane for packed
//! streams, one per channel for planar streams. Samples are stored
//! native-endian. An [`AudioFrame`] pairs a shared buffer with the stream
//! format describing it, a sample count and an optional timestamp.

use std::ops::BitOr;
use std::sync::Arc;

use crate::dsp::sample::Sample;
use crate::engine::format::StreamFormat;
use crate::engine::layout::ChannelLayout;
use crate::engine::stride::ChannelMap;
use crate::error::{ConvertError, Result};

// ============================================================================
// Permissions
// ============================================================================

/// Access rights attached to a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferPerms(u8);

impl BufferPerms {
    pub const READ: BufferPerms = BufferPerms(0x01);
    pub const WRITE: BufferPerms = BufferPerms(0x02);
    /// The producer may hand the storage out again once it is released
    pub const REUSE: BufferPerms = BufferPerms(0x04);
    pub const ALL: BufferPerms = BufferPerms(0x07);

    #[inline]
    pub const fn contains(&self, other: BufferPerms) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for BufferPerms {
    fn default() -> Self {
        BufferPerms::ALL
    }
}

impl BitOr for BufferPerms {
    type Output = BufferPerms;

    fn bitor(self, rhs: BufferPerms) -> BufferPerms {
        BufferPerms(self.0 | rhs.0)
    }
}

// ============================================================================
// Sample Buffer
// ============================================================================

fn alloc_plane(len: usize) -> Result<Vec<u8>> {
    let mut plane = Vec::new();
    plane
        .try_reserve_exact(len)
        .map_err(|e| ConvertError::out_of_memory(format!("plane of {} bytes", len), Some(e)))?;
    plane.resize(len, 0);
    Ok(plane)
}

/// Raw storage for a batch of samples
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    planes: Vec<Vec<u8>>,
    /// Samples per channel the planes can hold
    capacity: usize,
    perms: BufferPerms,
}

impl SampleBuffer {
    /// Allocate zeroed planes able to hold `capacity` samples per channel.
    ///
    /// Allocation failure is reported as [`ConvertError::OutOfMemory`]
    /// instead of aborting.
    pub fn alloc(format: &StreamFormat, capacity: usize, perms: BufferPerms) -> Result<Self> {
        let plane_count = format.planes();
        let mut planes = Vec::new();
        planes
            .try_reserve_exact(plane_count)
            .map_err(|e| ConvertError::out_of_memory(format!("{} plane table", plane_count), Some(e)))?;
        let len = format.plane_len(capacity).ok_or_else(|| {
            ConvertError::out_of_memory(format!("{} samples of {} overflow a plane", capacity, format), None)
        })?;
        for _ in 0..plane_count {
            planes.push(alloc_plane(len)?);
        }
        Ok(Self {
            planes,
            capacity,
            perms,
        })
    }

    /// Wrap existing planes
    pub fn from_planes(planes: Vec<Vec<u8>>, capacity: usize, perms: BufferPerms) -> Self {
        Self {
            planes,
            capacity,
            perms,
        }
    }

    #[inline]
    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    #[inline]
    pub fn planes_mut(&mut self) -> &mut [Vec<u8>] {
        &mut self.planes
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn perms(&self) -> BufferPerms {
        self.perms
    }

    /// Whether the buffer has the planes and room for `nb_samples` in `format`
    pub fn fits(&self, format: &StreamFormat, nb_samples: usize) -> bool {
        let Some(needed) = format.plane_len(nb_samples) else {
            return false;
        };
        self.planes.len() == format.planes() && self.planes.iter().all(|p| p.len() >= needed)
    }

    /// Drop trailing planes after a planar channel reduction
    pub(crate) fn truncate_planes(&mut self, count: usize) {
        self.planes.truncate(count);
    }

    fn try_clone(&self) -> Result<Self> {
        let mut planes = Vec::new();
        planes
            .try_reserve_exact(self.planes.len())
            .map_err(|e| ConvertError::out_of_memory("plane table copy", Some(e)))?;
        for plane in &self.planes {
            let mut copy = alloc_plane(plane.len())?;
            copy.copy_from_slice(plane);
            planes.push(copy);
        }
        Ok(Self {
            planes,
            capacity: self.capacity,
            perms: BufferPerms::ALL,
        })
    }
}

// ============================================================================
// Audio Frame
// ============================================================================

/// One batch of samples in a known stream format
///
/// Cloning a frame shares its buffer; a shared buffer is read-only until
/// [`AudioFrame::make_writable`] gives this frame its own copy.
///
/// # Example
/// ```
/// use aconvert::engine::{AudioFrame, ChannelLayout};
///
/// let frame = AudioFrame::from_interleaved(&[1i16, 2, 3, 4], ChannelLayout::Stereo, 48000).unwrap();
/// assert_eq!(frame.nb_samples(), 2);
/// assert_eq!(frame.channel::<i16>(1).unwrap(), vec![2, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct AudioFrame {
    format: StreamFormat,
    sample_rate: u32,
    nb_samples: usize,
    pts: Option<i64>,
    buffer: Arc<SampleBuffer>,
}

impl AudioFrame {
    /// Build a frame over `buffer`, checking it matches `format`
    pub fn new(format: StreamFormat, sample_rate: u32, nb_samples: usize, buffer: SampleBuffer) -> Result<Self> {
        Self::from_shared(format, sample_rate, nb_samples, Arc::new(buffer))
    }

    pub(crate) fn from_shared(
        format: StreamFormat,
        sample_rate: u32,
        nb_samples: usize,
        buffer: Arc<SampleBuffer>,
    ) -> Result<Self> {
        if !buffer.fits(&format, nb_samples) {
            return Err(ConvertError::InvalidFrame {
                reason: format!(
                    "buffer with {} planes cannot hold {} samples of {}",
                    buffer.planes().len(),
                    nb_samples,
                    format
                ),
            });
        }
        Ok(Self {
            format,
            sample_rate,
            nb_samples,
            pts: None,
            buffer,
        })
    }

    /// Zero-filled frame with its own writable buffer
    pub fn alloc(format: StreamFormat, sample_rate: u32, nb_samples: usize) -> Result<Self> {
        let buffer = SampleBuffer::alloc(&format, nb_samples, BufferPerms::ALL)?;
        Self::new(format, sample_rate, nb_samples, buffer)
    }

    /// Frame built from raw planes
    pub fn from_planes(
        format: StreamFormat,
        sample_rate: u32,
        nb_samples: usize,
        planes: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let buffer = SampleBuffer::from_planes(planes, nb_samples, BufferPerms::ALL);
        Self::new(format, sample_rate, nb_samples, buffer)
    }

    /// Packed frame from interleaved typed samples (L, R, L, R, ... for stereo)
    pub fn from_interleaved<T: Sample>(samples: &[T], layout: ChannelLayout, sample_rate: u32) -> Result<Self> {
        let channels = layout.num_channels();
        if samples.len() % channels != 0 {
            return Err(ConvertError::InvalidFrame {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    samples.len(),
                    channels
                ),
            });
        }

        let format = StreamFormat::packed(T::FORMAT, layout);
        let nb_samples = samples.len() / channels;
        let mut frame = Self::alloc(format, sample_rate, nb_samples)?;
        let width = T::FORMAT.bytes_per_sample();
        let plane = &mut frame.planes_mut()?[0];
        for (i, sample) in samples.iter().enumerate() {
            sample.write(plane, i * width);
        }
        Ok(frame)
    }

    /// Planar frame from one typed slice per channel
    pub fn from_planar<T: Sample>(channels: &[&[T]], layout: ChannelLayout, sample_rate: u32) -> Result<Self> {
        if channels.len() != layout.num_channels() {
            return Err(ConvertError::InvalidFrame {
                reason: format!(
                    "layout {} has {} channels, {} given",
                    layout,
                    layout.num_channels(),
                    channels.len()
                ),
            });
        }
        let nb_samples = channels.first().map_or(0, |c| c.len());
        if channels.iter().any(|c| c.len() != nb_samples) {
            return Err(ConvertError::InvalidFrame {
                reason: "channels differ in length".to_string(),
            });
        }

        let format = StreamFormat::planar(T::FORMAT, layout);
        let mut frame = Self::alloc(format, sample_rate, nb_samples)?;
        let width = T::FORMAT.bytes_per_sample();
        for (plane, channel) in frame.planes_mut()?.iter_mut().zip(channels) {
            for (i, sample) in channel.iter().enumerate() {
                sample.write(plane, i * width);
            }
        }
        Ok(frame)
    }

    /// Set the presentation timestamp
    pub fn with_pts(mut self, pts: Option<i64>) -> Self {
        self.pts = pts;
        self
    }

    /// Replace the buffer permissions, copying the buffer if it is shared
    pub fn with_perms(mut self, perms: BufferPerms) -> Self {
        Arc::make_mut(&mut self.buffer).perms = perms;
        self
    }

    #[inline]
    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn nb_samples(&self) -> usize {
        self.nb_samples
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    #[inline]
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    #[inline]
    pub fn perms(&self) -> BufferPerms {
        self.buffer.perms()
    }

    #[inline]
    pub fn planes(&self) -> &[Vec<u8>] {
        self.buffer.planes()
    }

    /// Bytes of plane `index` that hold samples of this frame
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let len = self.format.plane_len(self.nb_samples)?;
        self.buffer.planes().get(index).map(|p| &p[..len])
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.nb_samples as f64 / self.sample_rate as f64
    }

    /// Writable when this frame is the sole owner and holds write permission
    pub fn is_writable(&self) -> bool {
        Arc::strong_count(&self.buffer) == 1
            && Arc::weak_count(&self.buffer) == 0
            && self.buffer.perms().contains(BufferPerms::WRITE)
    }

    /// Give this frame a private, writable copy of its buffer if needed
    pub fn make_writable(&mut self) -> Result<()> {
        if !self.is_writable() {
            self.buffer = Arc::new(self.buffer.try_clone()?);
        }
        Ok(())
    }

    /// Mutable planes, or [`ConvertError::NotWritable`] when shared
    pub fn planes_mut(&mut self) -> Result<&mut [Vec<u8>]> {
        if !self.buffer.perms().contains(BufferPerms::WRITE) {
            return Err(ConvertError::NotWritable);
        }
        Arc::get_mut(&mut self.buffer)
            .map(SampleBuffer::planes_mut)
            .ok_or(ConvertError::NotWritable)
    }

    /// Whether two frames reference the same storage
    pub fn shares_buffer(&self, other: &AudioFrame) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Take the storage back if no other frame references it
    pub fn try_into_buffer(self) -> std::result::Result<SampleBuffer, AudioFrame> {
        let AudioFrame {
            format,
            sample_rate,
            nb_samples,
            pts,
            buffer,
        } = self;
        Arc::try_unwrap(buffer).map_err(|buffer| AudioFrame {
            format,
            sample_rate,
            nb_samples,
            pts,
            buffer,
        })
    }

    /// Re-describe a writable frame after an in-place transform
    pub(crate) fn reformat(&mut self, format: StreamFormat) -> Result<()> {
        let buffer = Arc::get_mut(&mut self.buffer).ok_or(ConvertError::NotWritable)?;
        buffer.truncate_planes(format.planes());
        self.format = format;
        Ok(())
    }

    fn check_type<T: Sample>(&self) -> Result<()> {
        if T::FORMAT != self.format.sample_format {
            return Err(ConvertError::FormatMismatch {
                expected: T::FORMAT,
                actual: self.format.sample_format,
            });
        }
        Ok(())
    }

    /// Typed samples of one channel
    pub fn channel<T: Sample>(&self, index: usize) -> Result<Vec<T>> {
        self.check_type::<T>()?;
        let map = ChannelMap::for_stream(&self.format);
        let ptr = map.get(index).ok_or_else(|| ConvertError::InvalidFrame {
            reason: format!("channel {} out of range for {}", index, self.format.layout),
        })?;
        let plane = &self.buffer.planes()[ptr.plane];
        Ok((0..self.nb_samples).map(|i| T::read(plane, ptr.position(i))).collect())
    }

    /// Typed samples in interleaved order, whatever the packing
    pub fn to_interleaved<T: Sample>(&self) -> Result<Vec<T>> {
        self.check_type::<T>()?;
        let map = ChannelMap::for_stream(&self.format);
        let planes = self.buffer.planes();
        let mut out = Vec::with_capacity(self.nb_samples * map.len());
        for i in 0..self.nb_samples {
            for ptr in map.iter() {
                out.push(T::read(&planes[ptr.plane], ptr.position(i)));
            }
        }
        Ok(out)
    }

    /// Typed samples, one vector per channel
    pub fn to_planar<T: Sample>(&self) -> Result<Vec<Vec<T>>> {
        (0..self.channels()).map(|c| self.channel::<T>(c)).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Packing, SampleFormat};
    use pretty_assertions::assert_eq;

    // ------------------------------------------------------------------------
    // Buffer
    // ------------------------------------------------------------------------

    #[test]
    fn test_alloc_plane_sizes() {
        let planar = StreamFormat::planar(SampleFormat::S32, ChannelLayout::FivePointOne);
        let buffer = SampleBuffer::alloc(&planar, 10, BufferPerms::ALL).unwrap();
        assert_eq!(buffer.planes().len(), 6);
        assert!(buffer.planes().iter().all(|p| p.len() == 40));

        let packed = StreamFormat::packed(SampleFormat::S16, ChannelLayout::Stereo);
        let buffer = SampleBuffer::alloc(&packed, 10, BufferPerms::ALL).unwrap();
        assert_eq!(buffer.planes().len(), 1);
        assert_eq!(buffer.planes()[0].len(), 40);
        assert!(buffer.fits(&packed, 10));
        assert!(!buffer.fits(&packed, 11));
        assert!(!buffer.fits(&planar, 1));
    }

    #[test]
    fn test_perms() {
        let rw = BufferPerms::READ | BufferPerms::WRITE;
        assert!(rw.contains(BufferPerms::WRITE));
        assert!(!rw.contains(BufferPerms::REUSE));
        assert!(BufferPerms::ALL.contains(rw));
        assert_eq!(BufferPerms::default(), BufferPerms::ALL);
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    #[test]
    fn test_from_interleaved() {
        let frame = AudioFrame::from_interleaved(&[0.5f32, -0.5, 0.25, -0.25], ChannelLayout::Stereo, 44100).unwrap();
        assert_eq!(frame.format().packing, Packing::Packed);
        assert_eq!(frame.format().sample_format, SampleFormat::F32);
        assert_eq!(frame.nb_samples(), 2);
        assert_eq!(frame.channel::<f32>(0).unwrap(), vec![0.5, 0.25]);
        assert_eq!(frame.to_planar::<f32>().unwrap(), vec![vec![0.5, 0.25], vec![-0.5, -0.25]]);
    }

    #[test]
    fn test_from_interleaved_rejects_ragged() {
        let result = AudioFrame::from_interleaved(&[1i16, 2, 3], ChannelLayout::Stereo, 48000);
        assert!(matches!(result, Err(ConvertError::InvalidFrame { .. })));
    }

    #[test]
    fn test_from_planar_roundtrip() {
        let left = [1i32, 2, 3];
        let right = [4i32, 5, 6];
        let frame = AudioFrame::from_planar(&[&left, &right], ChannelLayout::Stereo, 48000).unwrap();
        assert_eq!(frame.planes().len(), 2);
        assert_eq!(frame.to_interleaved::<i32>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
        assert!(AudioFrame::from_planar(&[&left[..]], ChannelLayout::Stereo, 48000).is_err());
    }

    #[test]
    fn test_typed_access_checks_format() {
        let frame = AudioFrame::from_interleaved(&[1i16, 2], ChannelLayout::Stereo, 48000).unwrap();
        assert!(matches!(
            frame.channel::<f32>(0),
            Err(ConvertError::FormatMismatch { .. })
        ));
        assert!(frame.channel::<i16>(2).is_err());
    }

    #[test]
    fn test_shared_frame_is_not_writable() {
        let mut frame = AudioFrame::from_interleaved(&[1u8, 2], ChannelLayout::Mono, 8000).unwrap();
        assert!(frame.is_writable());

        let held = frame.clone();
        assert!(frame.shares_buffer(&held));
        assert!(!frame.is_writable());
        assert!(matches!(frame.planes_mut(), Err(ConvertError::NotWritable)));

        frame.make_writable().unwrap();
        assert!(!frame.shares_buffer(&held));
        frame.planes_mut().unwrap()[0][0] = 9;
        assert_eq!(held.channel::<u8>(0).unwrap(), vec![1, 2]);
        assert_eq!(frame.channel::<u8>(0).unwrap(), vec![9, 2]);
    }

    #[test]
    fn test_read_only_perms() {
        let mut frame = AudioFrame::from_interleaved(&[1i16], ChannelLayout::Mono, 8000)
            .unwrap()
            .with_perms(BufferPerms::READ);
        assert!(!frame.is_writable());
        assert!(frame.planes_mut().is_err());
        frame.make_writable().unwrap();
        assert!(frame.is_writable());
    }

    #[test]
    fn test_try_into_buffer() {
        let frame = AudioFrame::alloc(
            StreamFormat::packed(SampleFormat::F64, ChannelLayout::Quad),
            48000,
            4,
        )
        .unwrap();
        let held = frame.clone();
        let frame = frame.try_into_buffer().unwrap_err();
        drop(held);
        let buffer = frame.try_into_buffer().unwrap();
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.planes()[0].len(), 4 * 4 * 8);
    }

    #[test]
    fn test_plane_view_and_duration() {
        let format = StreamFormat::packed(SampleFormat::S16, ChannelLayout::Stereo);
        let buffer = SampleBuffer::alloc(&format, 100, BufferPerms::ALL).unwrap();
        let frame = AudioFrame::new(format, 48000, 24, buffer).unwrap().with_pts(Some(7));
        assert_eq!(frame.plane(0).map(|p| p.len()), Some(96));
        assert_eq!(frame.plane(1), None);
        assert_eq!(frame.pts(), Some(7));
        assert!((frame.duration_secs() - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_short_buffer() {
        let format = StreamFormat::planar(SampleFormat::S16, ChannelLayout::Stereo);
        let buffer = SampleBuffer::alloc(&format, 4, BufferPerms::ALL).unwrap();
        assert!(AudioFrame::new(format, 48000, 5, buffer).is_err());
    }

    #[test]
    fn test_oversized_sample_count_is_rejected() {
        let format = StreamFormat::packed(SampleFormat::S16, ChannelLayout::Mono);
        let result = AudioFrame::from_planes(format, 48000, 1usize << 63, vec![vec![]]);
        assert!(matches!(result, Err(ConvertError::InvalidFrame { .. })));

        let buffer = SampleBuffer::from_planes(vec![vec![0; 8]], 4, BufferPerms::ALL);
        assert!(!buffer.fits(&format, usize::MAX));
        let result = AudioFrame::new(format, 48000, usize::MAX, buffer);
        assert!(matches!(result, Err(ConvertError::InvalidFrame { .. })));

        let result = SampleBuffer::alloc(&format, usize::MAX, BufferPerms::ALL);
        assert!(matches!(result, Err(ConvertError::OutOfMemory { .. })));
    }
}
