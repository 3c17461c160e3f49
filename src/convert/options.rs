//! Requested output parameters

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::MixLevels;
use crate::engine::{ChannelLayout, Packing, SampleFormat, StreamFormat};
use crate::error::{ConvertError, Result};

/// What the converter should produce
///
/// Each target field is optional; `None` keeps the input's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub sample_format: Option<SampleFormat>,
    pub channel_layout: Option<ChannelLayout>,
    pub packing: Option<Packing>,
    pub mix: MixLevels,
    /// Allow channel-reducing rematrixes to run inside the input buffer
    pub in_place: bool,
    /// Largest intermediate or output buffer the converter may allocate.
    /// Growth past it fails like an allocation failure and halts the stream.
    pub max_buffer_bytes: Option<usize>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            sample_format: None,
            channel_layout: None,
            packing: None,
            mix: MixLevels::default(),
            in_place: true,
            max_buffer_bytes: None,
        }
    }
}

/// Empty fields and `-1` mean "keep the input's value"
fn is_unset(field: &str) -> bool {
    let field = field.trim();
    field.is_empty() || field == "-1"
}

impl ConvertOptions {
    /// Parse `fmt[:layout[:packing]]`, e.g. `s16:stereo`, `flt::planar` or
    /// `-1:mono`.
    pub fn from_args(args: &str) -> Result<Self> {
        let fields: Vec<&str> = args.split(':').collect();
        if fields.len() > 3 {
            return Err(ConvertError::InvalidArguments {
                reason: format!("expected fmt[:layout[:packing]], got '{}'", args),
            });
        }

        let mut options = Self::default();
        if let Some(field) = fields.first().filter(|f| !is_unset(f)) {
            options.sample_format = Some(field.parse()?);
        }
        if let Some(field) = fields.get(1).filter(|f| !is_unset(f)) {
            options.channel_layout = Some(field.parse()?);
        }
        if let Some(field) = fields.get(2).filter(|f| !is_unset(f)) {
            options.packing = Some(field.parse()?);
        }
        Ok(options)
    }

    /// Load options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn with_sample_format(mut self, format: SampleFormat) -> Self {
        self.sample_format = Some(format);
        self
    }

    pub fn with_channel_layout(mut self, layout: ChannelLayout) -> Self {
        self.channel_layout = Some(layout);
        self
    }

    pub fn with_packing(mut self, packing: Packing) -> Self {
        self.packing = Some(packing);
        self
    }

    pub fn with_mix(mut self, mix: MixLevels) -> Self {
        self.mix = mix;
        self
    }

    pub fn with_in_place(mut self, in_place: bool) -> Self {
        self.in_place = in_place;
        self
    }

    pub fn with_max_buffer_bytes(mut self, max_bytes: usize) -> Self {
        self.max_buffer_bytes = Some(max_bytes);
        self
    }

    /// Fill unset fields from the input format
    pub fn resolve(&self, input: &StreamFormat) -> StreamFormat {
        StreamFormat::new(
            self.sample_format.unwrap_or(input.sample_format),
            self.channel_layout.unwrap_or(input.layout),
            self.packing.unwrap_or(input.packing),
        )
    }

    pub fn validate(&self) -> Result<()> {
        self.mix.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("s16:stereo", Some(SampleFormat::S16), Some(ChannelLayout::Stereo), None)]
    #[test_case("flt", Some(SampleFormat::F32), None, None)]
    #[test_case("-1:mono", None, Some(ChannelLayout::Mono), None)]
    #[test_case(":5.1:planar", None, Some(ChannelLayout::FivePointOne), Some(Packing::Planar))]
    #[test_case("dbl:-1:packed", Some(SampleFormat::F64), None, Some(Packing::Packed))]
    #[test_case("", None, None, None)]
    fn test_from_args(
        args: &str,
        format: Option<SampleFormat>,
        layout: Option<ChannelLayout>,
        packing: Option<Packing>,
    ) {
        let options = ConvertOptions::from_args(args).unwrap();
        assert_eq!(options.sample_format, format);
        assert_eq!(options.channel_layout, layout);
        assert_eq!(options.packing, packing);
        assert!(options.in_place);
    }

    #[test]
    fn test_from_args_rejects_unknown_names() {
        assert!(matches!(
            ConvertOptions::from_args("s24"),
            Err(ConvertError::InvalidSampleFormat { .. })
        ));
        assert!(matches!(
            ConvertOptions::from_args("s16:hexaphonic"),
            Err(ConvertError::InvalidChannelLayout { .. })
        ));
        assert!(matches!(
            ConvertOptions::from_args("s16:stereo:zigzag"),
            Err(ConvertError::InvalidPacking { .. })
        ));
        assert!(ConvertOptions::from_args("s16:stereo:planar:extra").is_err());
    }

    #[test]
    fn test_resolve_keeps_unset_fields() {
        let input = StreamFormat::planar(SampleFormat::U8, ChannelLayout::Quad);
        let options = ConvertOptions::default().with_sample_format(SampleFormat::S32);
        assert_eq!(
            options.resolve(&input),
            StreamFormat::planar(SampleFormat::S32, ChannelLayout::Quad)
        );
        assert_eq!(ConvertOptions::default().resolve(&input), input);
    }

    #[test]
    fn test_from_json() {
        let options = ConvertOptions::from_json(
            r#"{ "sample_format": "s16", "channel_layout": "5.1", "mix": { "rear_upmix": 0.5 } }"#,
        )
        .unwrap();
        assert_eq!(options.sample_format, Some(SampleFormat::S16));
        assert_eq!(options.channel_layout, Some(ChannelLayout::FivePointOne));
        assert_eq!(options.packing, None);
        assert_eq!(options.mix.rear_upmix, 0.5);
        assert_eq!(options.mix.center, 0.7);
        assert!(options.in_place);
        assert_eq!(options.max_buffer_bytes, None);

        assert!(ConvertOptions::from_json(r#"{ "sample_format": "s24" }"#).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let options = ConvertOptions::default()
            .with_channel_layout(ChannelLayout::Mono)
            .with_packing(Packing::Planar)
            .with_in_place(false)
            .with_max_buffer_bytes(1 << 20);
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(ConvertOptions::from_json(&json).unwrap(), options);
    }
}
