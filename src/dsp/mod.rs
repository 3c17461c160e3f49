//! Sample processing kernels
//!
//! Format conversion and channel rematrixing, written once against the
//! [`Sample`] trait and bound to concrete formats at configuration time.

pub mod codec;
pub mod rematrix;
pub mod sample;

pub use codec::SampleConverter;
pub use rematrix::{MixLevels, Rematrix, RematrixKind};
pub use sample::{convert_sample, convert_samples, Sample};
