//! Buffered frame source
//!
//! Producer side of a conversion chain: frames are pushed in with a declared
//! stream format and pulled out in arrival order.

use std::collections::VecDeque;
use std::str::FromStr;

use tracing::{error, info};

use crate::dsp::SampleConverter;
use crate::engine::buffer::AudioFrame;
use crate::engine::format::{Packing, StreamFormat};
use crate::engine::stride::ChannelMap;
use crate::error::{ConvertError, Result};

/// Frames the queue holds before refusing new ones
pub const FIFO_SIZE: usize = 8;

/// Bounded FIFO of frames in one declared stream format
#[derive(Debug)]
pub struct FrameQueue {
    format: StreamFormat,
    sample_rate: u32,
    fifo: VecDeque<AudioFrame>,
}

impl FrameQueue {
    pub fn new(format: StreamFormat, sample_rate: u32) -> Self {
        info!(
            "fmt:{} cl:{} packing:{} sr:{}",
            format.sample_format, format.layout, format.packing, sample_rate
        );
        Self {
            format,
            sample_rate,
            fifo: VecDeque::with_capacity(FIFO_SIZE),
        }
    }

    /// Parse `fmt:layout:rate` (packed) or `fmt:layout:packing:rate`
    pub fn from_args(args: &str) -> Result<Self> {
        let fields: Vec<&str> = args.split(':').collect();
        let (format, layout, packing, rate) = match fields.as_slice() {
            [format, layout, rate] => (*format, *layout, None, *rate),
            [format, layout, packing, rate] => (*format, *layout, Some(*packing), *rate),
            _ => {
                return Err(ConvertError::InvalidArguments {
                    reason: format!("expected fmt:layout[:packing]:rate, got '{}'", args),
                })
            }
        };

        let packing = match packing {
            Some(p) => Packing::from_str(p)?,
            None => Packing::Packed,
        };
        let rate: f64 = rate.trim().parse().map_err(|_| ConvertError::InvalidArguments {
            reason: format!("invalid value '{}' for rate", rate),
        })?;
        if rate < 0.0 || rate.fract() != 0.0 || rate > u32::MAX as f64 {
            return Err(ConvertError::InvalidArguments {
                reason: format!("invalid value '{}' for rate", rate),
            });
        }

        let format = StreamFormat::new(format.parse()?, layout.parse()?, packing);
        Ok(Self::new(format, rate as u32))
    }

    #[inline]
    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn check_space(&self) -> Result<()> {
        if self.fifo.len() >= FIFO_SIZE {
            error!("Buffering limit reached. Please consume some available frames before adding new ones.");
            return Err(ConvertError::BufferingLimit { capacity: FIFO_SIZE });
        }
        Ok(())
    }

    /// Queue a frame already in the declared format
    pub fn add_samples(&mut self, frame: AudioFrame) -> Result<()> {
        self.check_space()?;
        if *frame.format() != self.format {
            return Err(ConvertError::InvalidFrame {
                reason: format!("queue carries {}, frame is {}", self.format, frame.format()),
            });
        }
        self.fifo.push_back(frame);
        Ok(())
    }

    /// Queue raw interleaved bytes, splitting them into samples by the
    /// declared format. Trailing bytes that do not form a whole sample
    /// frame are dropped.
    pub fn add_buffer(&mut self, bytes: &[u8], pts: Option<i64>) -> Result<()> {
        self.check_space()?;
        let frame_bytes = self.format.bytes_per_sample() * self.format.channels();
        let nb_samples = bytes.len() / frame_bytes;
        let packed = StreamFormat::packed(self.format.sample_format, self.format.layout);

        let mut frame = AudioFrame::alloc(packed, self.sample_rate, nb_samples)?;
        frame.planes_mut()?[0].copy_from_slice(&bytes[..nb_samples * frame_bytes]);
        let frame = frame.with_pts(pts);

        if self.format.packing == Packing::Planar {
            // Declared planar: re-arrange so consumers see the declared packing
            return self.add_samples(repack(&frame, &self.format)?);
        }
        self.add_samples(frame)
    }

    /// Number of frames waiting
    #[inline]
    pub fn poll(&self) -> usize {
        self.fifo.len()
    }

    /// Pop the oldest frame, if any
    pub fn request_frame(&mut self) -> Option<AudioFrame> {
        let frame = self.fifo.pop_front();
        if frame.is_none() {
            error!("request_frame() called with no available frames!");
        }
        frame
    }
}

fn repack(frame: &AudioFrame, target: &StreamFormat) -> Result<AudioFrame> {
    let mut out = AudioFrame::alloc(*target, frame.sample_rate(), frame.nb_samples())?;
    let converter = SampleConverter::new(frame.format().sample_format, target.sample_format);
    converter.convert(
        frame.planes(),
        &ChannelMap::for_stream(frame.format()),
        out.planes_mut()?,
        &ChannelMap::for_stream(target),
        frame.nb_samples(),
    )?;
    Ok(out.with_pts(frame.pts()))
}
