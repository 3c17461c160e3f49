//! Conversion pipeline
//!
//! [`AudioConverter`] turns frames of one stream format into another:
//! rematrix first (in the input sample format), then sample format and
//! packing conversion. Buffers are sized to the largest frame seen so far
//! and recycled once downstream consumers release them.

pub mod options;
pub mod plan;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::engine::{AudioFrame, BufferPerms, SampleBuffer, StreamFormat};
use crate::error::{ConvertError, Result};

pub use options::ConvertOptions;
pub use plan::{ConversionPlan, ConvertStage, RematrixStage};

// ============================================================================
// State
// ============================================================================

/// Lifecycle of a converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConverterState {
    /// No input format known yet
    #[default]
    Unconfigured,
    /// Plan built, buffers not yet sized
    Configured,
    /// Buffers sized for the largest frame seen
    Ready,
    /// Halted after a resource failure; needs `configure` or `reset`
    Failed,
}

impl fmt::Display for ConverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterState::Unconfigured => write!(f, "Unconfigured"),
            ConverterState::Configured => write!(f, "Configured"),
            ConverterState::Ready => write!(f, "Ready"),
            ConverterState::Failed => write!(f, "Failed"),
        }
    }
}

// ============================================================================
// Converter
// ============================================================================

/// Frame-by-frame format, layout and packing converter
///
/// # Example
/// ```
/// use aconvert::convert::AudioConverter;
/// use aconvert::engine::{AudioFrame, ChannelLayout};
///
/// let mut converter = AudioConverter::from_args("s16:mono").unwrap();
/// let frame = AudioFrame::from_interleaved(&[100i16, 300, 101, 300], ChannelLayout::Stereo, 48000).unwrap();
/// let out = converter.process(frame).unwrap();
/// assert_eq!(out.to_interleaved::<i16>().unwrap(), vec![200, 200]);
/// ```
#[derive(Debug)]
pub struct AudioConverter {
    options: ConvertOptions,
    state: ConverterState,
    plan: Option<ConversionPlan>,
    /// Largest frame seen since the last (re)configuration
    capacity: usize,
    /// Intermediate buffer between rematrix and format conversion
    mix_buffer: Option<SampleBuffer>,
    /// Storage of the most recently emitted frame
    last_output: Option<Arc<SampleBuffer>>,
    halt_reason: Option<String>,
}

impl AudioConverter {
    pub fn new(options: ConvertOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            state: ConverterState::Unconfigured,
            plan: None,
            capacity: 0,
            mix_buffer: None,
            last_output: None,
            halt_reason: None,
        })
    }

    /// Build from a `fmt[:layout[:packing]]` argument string
    pub fn from_args(args: &str) -> Result<Self> {
        Self::new(ConvertOptions::from_args(args)?)
    }

    #[inline]
    pub fn state(&self) -> ConverterState {
        self.state
    }

    #[inline]
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    #[inline]
    pub fn plan(&self) -> Option<&ConversionPlan> {
        self.plan.as_ref()
    }

    /// Samples per channel the current buffers are sized for
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Setup summary of the current plan
    pub fn describe(&self) -> Option<String> {
        self.plan.as_ref().map(ConversionPlan::summary)
    }

    /// Plan the conversion for `input`, dropping any previous buffers.
    ///
    /// Configuration errors leave the converter unconfigured.
    pub fn configure(&mut self, input: &StreamFormat) -> Result<&ConversionPlan> {
        self.release_buffers();
        self.halt_reason = None;

        let plan = match ConversionPlan::build(input, &self.options) {
            Ok(plan) => plan,
            Err(e) => {
                self.plan = None;
                self.state = ConverterState::Unconfigured;
                error!(error = %e, "configuration failed for {}", input);
                return Err(e);
            }
        };

        info!("{}", plan.summary());
        self.state = ConverterState::Configured;
        Ok(self.plan.insert(plan))
    }

    /// Return to the unconfigured state
    pub fn reset(&mut self) {
        self.release_buffers();
        self.plan = None;
        self.halt_reason = None;
        self.state = ConverterState::Unconfigured;
    }

    fn release_buffers(&mut self) {
        self.capacity = 0;
        self.mix_buffer = None;
        self.last_output = None;
    }

    fn halt(&mut self, err: &ConvertError) {
        error!(error = %err, "halting stream");
        self.state = ConverterState::Failed;
        self.halt_reason = Some(err.to_string());
        self.release_buffers();
    }

    /// Convert one frame.
    ///
    /// The input is re-planned first if its stream format differs from the
    /// configured one. Identity conversions return the input frame itself.
    /// Allocation failure halts the converter: this and every later call
    /// fail until it is reconfigured.
    pub fn process(&mut self, frame: AudioFrame) -> Result<AudioFrame> {
        if self.state == ConverterState::Failed {
            let reason = self.halt_reason.clone().unwrap_or_default();
            warn!("frame dropped, stream halted: {}", reason);
            return Err(ConvertError::StreamHalted { reason });
        }

        let replan = match &self.plan {
            Some(plan) => plan.input != *frame.format(),
            None => true,
        };
        if replan {
            if let Some(plan) = &self.plan {
                debug!("input changed from {} to {}, re-planning", plan.input, frame.format());
            }
            self.configure(frame.format())?;
        }

        let nb_samples = frame.nb_samples();
        if nb_samples > self.capacity || self.state == ConverterState::Configured {
            if nb_samples > self.capacity {
                debug!("growing buffers from {} to {} samples", self.capacity, nb_samples);
                self.capacity = nb_samples;
                self.mix_buffer = None;
                self.last_output = None;
            }
            self.state = ConverterState::Ready;
        }

        let Self {
            options,
            plan,
            capacity,
            mix_buffer,
            last_output,
            ..
        } = &mut *self;
        let Some(plan) = plan.as_ref() else {
            return Err(ConvertError::StreamHalted {
                reason: "converter is not configured".to_string(),
            });
        };

        let buffers = StageBuffers {
            capacity: *capacity,
            max_bytes: options.max_buffer_bytes,
            mix_buffer,
            last_output,
        };
        match run_stages(plan, frame, buffers) {
            Ok(out) => Ok(out),
            Err(e @ ConvertError::OutOfMemory { .. }) => {
                self.halt(&e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Buffers a stage run may draw from
struct StageBuffers<'a> {
    /// Samples per channel to size new buffers for
    capacity: usize,
    max_bytes: Option<usize>,
    mix_buffer: &'a mut Option<SampleBuffer>,
    last_output: &'a mut Option<Arc<SampleBuffer>>,
}

impl StageBuffers<'_> {
    fn alloc(&self, format: &StreamFormat, perms: BufferPerms) -> Result<SampleBuffer> {
        if let Some(limit) = self.max_bytes {
            let total = format
                .plane_len(self.capacity)
                .and_then(|len| len.checked_mul(format.planes()));
            if total.map_or(true, |total| total > limit) {
                return Err(ConvertError::out_of_memory(
                    format!("{} samples of {} exceed the {} byte budget", self.capacity, format, limit),
                    None,
                ));
            }
        }
        SampleBuffer::alloc(format, self.capacity, perms)
    }

    /// Output storage for the next frame: the previous output when nobody
    /// else holds it any more, a fresh allocation otherwise.
    fn take_output(&mut self, format: &StreamFormat) -> Result<SampleBuffer> {
        if let Some(shared) = self.last_output.take() {
            match Arc::try_unwrap(shared) {
                Ok(buffer) if buffer.perms().contains(BufferPerms::REUSE) && buffer.fits(format, self.capacity) => {
                    return Ok(buffer);
                }
                Ok(_) => {}
                Err(_) => debug!("previous output still referenced downstream, allocating"),
            }
        }
        self.alloc(format, BufferPerms::ALL)
    }

    /// Intermediate planes for a rematrix that cannot run in place
    fn mix_planes(&mut self, format: &StreamFormat) -> Result<&mut [Vec<u8>]> {
        let buffer = match self.mix_buffer.take() {
            Some(buffer) if buffer.fits(format, self.capacity) => buffer,
            _ => self.alloc(format, BufferPerms::READ | BufferPerms::WRITE)?,
        };
        Ok(self.mix_buffer.insert(buffer).planes_mut())
    }
}

fn run_stages(plan: &ConversionPlan, frame: AudioFrame, mut buffers: StageBuffers<'_>) -> Result<AudioFrame> {
    let nb_samples = frame.nb_samples();
    let sample_rate = frame.sample_rate();
    let pts = frame.pts();

    let buffer = match (&plan.rematrix, &plan.convert) {
        (None, None) => return Ok(frame),

        (Some(stage), None) => {
            if stage.in_place && frame.is_writable() {
                let mut frame = frame;
                stage
                    .rematrix
                    .apply_in_place(frame.planes_mut()?, &stage.input_map, &stage.output_map, nb_samples)?;
                frame.reformat(stage.target)?;
                debug!("{} ran in place", stage.kind);
                return Ok(frame);
            }
            let mut out = buffers.take_output(&plan.output)?;
            stage
                .rematrix
                .apply(frame.planes(), &stage.input_map, out.planes_mut(), &stage.output_map, nb_samples)?;
            out
        }

        (None, Some(convert)) => {
            let mut out = buffers.take_output(&plan.output)?;
            let len = convert.strides.run_length(nb_samples, convert.source.channels());
            convert.converter.convert(
                frame.planes(),
                &convert.strides.input,
                out.planes_mut(),
                &convert.strides.output,
                len,
            )?;
            out
        }

        (Some(stage), Some(convert)) => {
            let len = convert.strides.run_length(nb_samples, convert.source.channels());
            let mut out = buffers.take_output(&plan.output)?;
            if stage.in_place && frame.is_writable() {
                let mut frame = frame;
                stage
                    .rematrix
                    .apply_in_place(frame.planes_mut()?, &stage.input_map, &stage.output_map, nb_samples)?;
                frame.reformat(stage.target)?;
                debug!("{} ran in place", stage.kind);
                convert.converter.convert(
                    frame.planes(),
                    &convert.strides.input,
                    out.planes_mut(),
                    &convert.strides.output,
                    len,
                )?;
            } else {
                let mix = buffers.mix_planes(&stage.target)?;
                stage
                    .rematrix
                    .apply(frame.planes(), &stage.input_map, mix, &stage.output_map, nb_samples)?;
                convert.converter.convert(
                    mix,
                    &convert.strides.input,
                    out.planes_mut(),
                    &convert.strides.output,
                    len,
                )?;
            }
            out
        }
    };

    let shared = Arc::new(buffer);
    *buffers.last_output = Some(Arc::clone(&shared));
    Ok(AudioFrame::from_shared(plan.output, sample_rate, nb_samples, shared)?.with_pts(pts))
}

// ============================================================================
// Tests
// ============================================================================
