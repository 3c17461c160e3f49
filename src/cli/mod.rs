//! CLI Module
//!
//! Command-line interface for the aconvert conversion stage.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::{ChannelLayout, Packing, SampleFormat, StreamFormat};

/// aconvert - audio sample format, channel layout and packing converter
#[derive(Parser, Debug)]
#[command(name = "aconvert")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a WAV file
    #[command(name = "convert")]
    Convert(ConvertArgs),

    /// Print the conversion plan for a stream format as JSON
    #[command(name = "plan")]
    Plan {
        /// Input stream, as fmt:layout[:packing]
        #[arg(long)]
        from: StreamFormat,

        /// Requested output, as fmt[:layout[:packing]] (-1 or empty keeps a field)
        #[arg(long, default_value = "")]
        to: String,
    },
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input WAV file
    pub input: PathBuf,

    /// Output WAV file
    pub output: PathBuf,

    /// Output sample format (u8, s16, s32, flt)
    #[arg(short, long)]
    pub format: Option<SampleFormat>,

    /// Output channel layout (mono, stereo, 5.1, ...)
    #[arg(short, long)]
    pub layout: Option<ChannelLayout>,

    /// Packing of the converted frames (packed or planar)
    #[arg(short, long)]
    pub packing: Option<Packing>,

    /// JSON options file; flags given on the command line take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Samples per channel in each frame
    #[arg(short, long, default_value_t = 4096)]
    pub block_size: usize,

    /// Gain feeding the front pair into the rear pair on stereo to 5.1
    #[arg(long)]
    pub rear_gain: Option<f64>,

    /// Always use a separate mix buffer for downmixes
    #[arg(long)]
    pub no_in_place: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from([
            "aconvert", "convert", "in.wav", "out.wav", "-f", "s16", "-l", "5.1", "--rear-gain", "0.5",
        ])
        .unwrap();
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.format, Some(SampleFormat::S16));
        assert_eq!(args.layout, Some(ChannelLayout::FivePointOne));
        assert_eq!(args.rear_gain, Some(0.5));
        assert_eq!(args.block_size, 4096);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_plan_rejects_bad_format() {
        assert!(Cli::try_parse_from(["aconvert", "plan", "--from", "s24:stereo"]).is_err());
        assert!(Cli::try_parse_from(["aconvert", "-v", "plan", "--from", "s16:stereo", "--to", "flt"]).is_ok());
    }
}
