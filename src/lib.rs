//! aconvert - Audio Format Conversion Stage
//!
//! Converts streams of audio frames between sample formats (U8, S16, S32,
//! F32, F64), channel layouts and packings (interleaved or planar).
//!
//! # Architecture
//!
//! - `engine`: stream description, frames and buffers, channel-pointer
//!   tables, a buffered frame source and WAV I/O
//! - `dsp`: per-format sample arithmetic, strided format conversion and
//!   channel rematrixing
//! - `convert`: the frame-by-frame orchestrator and its plans
//! - `cli`: command-line front end

pub mod cli;
pub mod convert;
pub mod dsp;
pub mod engine;
pub mod error;

pub use convert::{AudioConverter, ConversionPlan, ConvertOptions, ConverterState};
pub use dsp::{MixLevels, RematrixKind};
pub use engine::{AudioFrame, ChannelLayout, Packing, SampleFormat, StreamFormat};
pub use error::{ConvertError, Result};
