//! Audio Engine Module
//!
//! Stream description and sample storage:
//! - Sample formats, channel layouts and packing
//! - Buffers, frames and permissions
//! - Channel-pointer tables shared by every processing stage
//! - Buffered frame source and WAV file I/O

pub mod buffer;
pub mod format;
pub mod io;
pub mod layout;
pub mod source;
pub mod stride;

pub use buffer::{AudioFrame, BufferPerms, SampleBuffer};
pub use format::{Packing, SampleFormat, StreamFormat};
pub use io::{read_wav, write_wav, WavAudio};
pub use layout::{ChannelLayout, ChannelRole, MAX_CHANNELS};
pub use source::{FrameQueue, FIFO_SIZE};
pub use stride::{deinterleave, interleave, ChannelMap, ChannelPtr, StageStrides};
