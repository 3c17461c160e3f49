//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use tracing::info;

use crate::cli::ConvertArgs;
use crate::convert::{AudioConverter, ConversionPlan, ConvertOptions};
use crate::engine::{read_wav, write_wav, StreamFormat};
use crate::error::Result;

/// Outcome of a file conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertReport {
    pub input: StreamFormat,
    pub output: StreamFormat,
    pub frames: usize,
    pub samples: usize,
}

/// Merge the options file (if any) with command-line overrides
pub fn build_options(args: &ConvertArgs) -> Result<ConvertOptions> {
    let mut options = match &args.config {
        Some(path) => ConvertOptions::from_file(path)?,
        None => ConvertOptions::default(),
    };
    if let Some(format) = args.format {
        options.sample_format = Some(format);
    }
    if let Some(layout) = args.layout {
        options.channel_layout = Some(layout);
    }
    if let Some(packing) = args.packing {
        options.packing = Some(packing);
    }
    if let Some(gain) = args.rear_gain {
        options.mix.rear_upmix = gain;
    }
    if args.no_in_place {
        options.in_place = false;
    }
    options.validate()?;
    Ok(options)
}

/// Convert a WAV file frame by frame.
pub fn convert_file(input: &Path, output: &Path, options: ConvertOptions, block_size: usize) -> Result<ConvertReport> {
    info!("Converting {} -> {}", input.display(), output.display());

    let audio = read_wav(input, block_size)?;
    let mut converter = AudioConverter::new(options)?;
    let plan = converter.configure(&audio.format)?;
    let output_format = plan.output;

    let mut converted = Vec::with_capacity(audio.frames.len());
    for frame in audio.frames {
        converted.push(converter.process(frame)?);
    }
    write_wav(output, &converted)?;

    Ok(ConvertReport {
        input: audio.format,
        output: output_format,
        frames: converted.len(),
        samples: converted.iter().map(|f| f.nb_samples()).sum(),
    })
}

/// Run the `convert` command.
pub fn convert(args: &ConvertArgs) -> Result<()> {
    let options = build_options(args)?;
    let report = convert_file(&args.input, &args.output, options, args.block_size)?;

    println!("Converted: {}", args.output.display());
    println!("  {} -> {}", report.input, report.output);
    println!("  {} samples in {} frames", report.samples, report.frames);

    Ok(())
}

/// Render the plan for `from` as pretty JSON.
pub fn plan_json(from: &StreamFormat, to: &str) -> Result<String> {
    let options = ConvertOptions::from_args(to)?;
    let plan = ConversionPlan::build(from, &options)?;
    Ok(serde_json::to_string_pretty(&plan)?)
}

/// Run the `plan` command.
pub fn plan(from: &StreamFormat, to: &str) -> Result<()> {
    println!("{}", plan_json(from, to)?);
    Ok(())
}
