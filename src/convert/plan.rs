//! Conversion plans
//!
//! A [`ConversionPlan`] is everything derived from one (input, options) pair:
//! which stages run, the kernels they are bound to and the channel tables
//! they walk. It is rebuilt only when the input stream format changes.

use serde::Serialize;

use crate::convert::options::ConvertOptions;
use crate::dsp::{Rematrix, RematrixKind, SampleConverter};
use crate::engine::{ChannelMap, StageStrides, StreamFormat};
use crate::error::Result;

/// Channel rematrix step, run in the input sample format
#[derive(Debug, Clone, Serialize)]
pub struct RematrixStage {
    pub kind: RematrixKind,
    /// Stream produced by this step: input sample format with the output
    /// layout and packing
    pub target: StreamFormat,
    pub input_map: ChannelMap,
    pub output_map: ChannelMap,
    /// Whether the step may overwrite a writable input buffer instead of
    /// using a separate mix buffer
    pub in_place: bool,
    #[serde(skip)]
    pub(crate) rematrix: Rematrix,
}

/// Sample format / packing step
#[derive(Debug, Clone, Serialize)]
pub struct ConvertStage {
    pub source: StreamFormat,
    pub strides: StageStrides,
    #[serde(skip)]
    pub(crate) converter: SampleConverter,
}

/// Stages and tables for one input/output pair
#[derive(Debug, Clone, Serialize)]
pub struct ConversionPlan {
    pub input: StreamFormat,
    pub output: StreamFormat,
    pub needs_rematrix: bool,
    pub needs_format_convert: bool,
    pub needs_arrangement_convert: bool,
    pub rematrix: Option<RematrixStage>,
    pub convert: Option<ConvertStage>,
}

impl ConversionPlan {
    /// Plan the conversion of `input` according to `options`.
    ///
    /// Fails on invalid mix levels or a layout pair with no transform.
    pub fn build(input: &StreamFormat, options: &ConvertOptions) -> Result<Self> {
        options.validate()?;
        let output = options.resolve(input);

        let rematrix = Rematrix::new(input.layout, output.layout, input.sample_format, options.mix)?
            .map(|rematrix| {
                let target = StreamFormat::new(input.sample_format, output.layout, output.packing);
                RematrixStage {
                    kind: rematrix.kind(),
                    target,
                    input_map: ChannelMap::for_stream(input),
                    output_map: ChannelMap::for_stream(&target),
                    in_place: options.in_place && rematrix.reduces_channels() && input.packing == output.packing,
                    rematrix,
                }
            });

        let source = rematrix.as_ref().map_or(*input, |stage| stage.target);
        let convert = (source != output).then(|| ConvertStage {
            source,
            strides: StageStrides::for_conversion(&source, &output),
            converter: SampleConverter::new(source.sample_format, output.sample_format),
        });

        Ok(Self {
            input: *input,
            output,
            needs_rematrix: rematrix.is_some(),
            needs_format_convert: input.sample_format != output.sample_format,
            needs_arrangement_convert: input.packing != output.packing,
            rematrix,
            convert,
        })
    }

    /// Output is the input frame itself
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.rematrix.is_none() && self.convert.is_none()
    }

    /// Whether the rematrix output must go to an intermediate buffer
    #[inline]
    pub fn needs_mix_buffer(&self) -> bool {
        self.rematrix.is_some() && self.convert.is_some()
    }

    /// One-line description of the conversion
    pub fn summary(&self) -> String {
        format!(
            "fmt:{} cl:{} packing:{} -> fmt:{} cl:{} packing:{}",
            self.input.sample_format,
            self.input.layout,
            self.input.packing,
            self.output.sample_format,
            self.output.layout,
            self.output.packing
        )
    }
}
