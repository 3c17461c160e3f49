//! WAV file I/O
//!
//! Reads WAV files into packed frames in the closest canonical sample format
//! and writes frames back out. No sample-rate or format conversion happens
//! here; that is the converter's job.

use std::path::Path;

use hound::{WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::dsp::sample::Sample;
use crate::engine::buffer::AudioFrame;
use crate::engine::format::{SampleFormat, StreamFormat};
use crate::engine::layout::ChannelLayout;
use crate::error::{ConvertError, Result};

/// Decoded contents of a WAV file
#[derive(Debug, Clone)]
pub struct WavAudio {
    /// Packed stream format of every frame
    pub format: StreamFormat,
    pub sample_rate: u32,
    pub frames: Vec<AudioFrame>,
}

impl WavAudio {
    /// Total samples per channel across all frames
    pub fn nb_samples(&self) -> usize {
        self.frames.iter().map(|f| f.nb_samples()).sum()
    }
}

/// Layout assumed for a WAV file with `channels` channels
pub fn layout_for_channels(channels: usize) -> Result<ChannelLayout> {
    match channels {
        1 => Ok(ChannelLayout::Mono),
        2 => Ok(ChannelLayout::Stereo),
        3 => Ok(ChannelLayout::Surround),
        4 => Ok(ChannelLayout::Quad),
        5 => Ok(ChannelLayout::FivePointZero),
        6 => Ok(ChannelLayout::FivePointOne),
        8 => Ok(ChannelLayout::SevenPointOne),
        _ => Err(ConvertError::UnsupportedFormat {
            format: format!("{}-channel audio", channels),
        }),
    }
}

/// Read a WAV file into packed frames of at most `block` samples each.
///
/// 8-bit files load as U8, 16-bit as S16, 24 and 32-bit integer as S32
/// (left-aligned) and 32-bit float as F32. Each frame's pts is the index of
/// its first sample.
pub fn read_wav(path: &Path, block: usize) -> Result<WavAudio> {
    if block == 0 {
        return Err(ConvertError::InvalidArguments {
            reason: "block size must be at least one sample".to_string(),
        });
    }

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let layout = layout_for_channels(spec.channels as usize)?;
    let rate = spec.sample_rate;

    let frames = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 8) => {
            // hound re-centres unsigned 8-bit data around zero
            let samples = read_samples::<i8, _, _>(&mut reader, |v| (v as i16 + 128) as u8)?;
            split_frames(&samples, layout, rate, block)?
        }
        (hound::SampleFormat::Int, 16) => {
            let samples = read_samples::<i16, _, _>(&mut reader, |v| v)?;
            split_frames(&samples, layout, rate, block)?
        }
        (hound::SampleFormat::Int, 24) => {
            let samples = read_samples::<i32, _, _>(&mut reader, |v| v << 8)?;
            split_frames(&samples, layout, rate, block)?
        }
        (hound::SampleFormat::Int, 32) => {
            let samples = read_samples::<i32, _, _>(&mut reader, |v| v)?;
            split_frames(&samples, layout, rate, block)?
        }
        (hound::SampleFormat::Float, 32) => {
            let samples = read_samples::<f32, _, _>(&mut reader, |v| v)?;
            split_frames(&samples, layout, rate, block)?
        }
        (format, bits) => {
            return Err(ConvertError::UnsupportedFormat {
                format: format!("{}-bit {:?} WAV", bits, format),
            })
        }
    };

    let format = match frames.first() {
        Some(frame) => *frame.format(),
        None => StreamFormat::packed(wav_sample_format(&spec)?, layout),
    };
    debug!(
        path = %path.display(),
        frames = frames.len(),
        "read {} at {} Hz",
        format,
        rate
    );

    Ok(WavAudio {
        format,
        sample_rate: rate,
        frames,
    })
}

fn wav_sample_format(spec: &WavSpec) -> Result<SampleFormat> {
    match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 8) => Ok(SampleFormat::U8),
        (hound::SampleFormat::Int, 16) => Ok(SampleFormat::S16),
        (hound::SampleFormat::Int, 24 | 32) => Ok(SampleFormat::S32),
        (hound::SampleFormat::Float, 32) => Ok(SampleFormat::F32),
        (format, bits) => Err(ConvertError::UnsupportedFormat {
            format: format!("{}-bit {:?} WAV", bits, format),
        }),
    }
}

fn read_samples<S, T, F>(reader: &mut WavReader<std::io::BufReader<std::fs::File>>, map: F) -> Result<Vec<T>>
where
    S: hound::Sample,
    F: Fn(S) -> T,
{
    reader
        .samples::<S>()
        .map(|s| s.map(&map).map_err(ConvertError::from))
        .collect()
}

fn split_frames<T: Sample>(
    samples: &[T],
    layout: ChannelLayout,
    sample_rate: u32,
    block: usize,
) -> Result<Vec<AudioFrame>> {
    let chunk = block * layout.num_channels();
    samples
        .chunks(chunk)
        .enumerate()
        .map(|(i, data)| {
            AudioFrame::from_interleaved(data, layout, sample_rate).map(|f| f.with_pts(Some((i * block) as i64)))
        })
        .collect()
}

fn write_samples<T, W, F>(
    writer: &mut WavWriter<std::io::BufWriter<std::fs::File>>,
    frames: &[AudioFrame],
    map: F,
) -> Result<()>
where
    T: Sample,
    W: hound::Sample,
    F: Fn(T) -> W,
{
    for frame in frames {
        for v in frame.to_interleaved::<T>()? {
            writer.write_sample(map(v))?;
        }
    }
    Ok(())
}

/// Write frames to a WAV file.
///
/// All frames must share one stream format and sample rate; planar frames
/// are interleaved on the way out. F64 has no WAV mapping and is rejected.
pub fn write_wav(path: &Path, frames: &[AudioFrame]) -> Result<()> {
    let first = frames.first().ok_or_else(|| ConvertError::InvalidArguments {
        reason: "no frames to write".to_string(),
    })?;
    let format = *first.format();
    let sample_rate = first.sample_rate();
    if let Some(other) = frames
        .iter()
        .find(|f| *f.format() != format || f.sample_rate() != sample_rate)
    {
        return Err(ConvertError::InvalidFrame {
            reason: format!(
                "mixed frames: {} at {} Hz and {} at {} Hz",
                format,
                sample_rate,
                other.format(),
                other.sample_rate()
            ),
        });
    }

    let (bits_per_sample, sample_format) = match format.sample_format {
        SampleFormat::U8 => (8, hound::SampleFormat::Int),
        SampleFormat::S16 => (16, hound::SampleFormat::Int),
        SampleFormat::S32 => (32, hound::SampleFormat::Int),
        SampleFormat::F32 => (32, hound::SampleFormat::Float),
        SampleFormat::F64 => {
            return Err(ConvertError::UnsupportedFormat {
                format: "64-bit float WAV output".to_string(),
            })
        }
    };
    let spec = WavSpec {
        channels: format.channels() as u16,
        sample_rate,
        bits_per_sample,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec)?;
    match format.sample_format {
        SampleFormat::U8 => write_samples::<u8, _, _>(&mut writer, frames, |v| (v as i16 - 128) as i8)?,
        SampleFormat::S16 => write_samples::<i16, _, _>(&mut writer, frames, |v| v)?,
        SampleFormat::S32 => write_samples::<i32, _, _>(&mut writer, frames, |v| v)?,
        SampleFormat::F32 => write_samples::<f32, _, _>(&mut writer, frames, |v| v)?,
        SampleFormat::F64 => {
            return Err(ConvertError::UnsupportedFormat {
                format: "64-bit float WAV output".to_string(),
            })
        }
    }
    writer.finalize()?;

    debug!(path = %path.display(), frames = frames.len(), "wrote {}", format);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_layout_for_channels() {
        assert_eq!(layout_for_channels(6).unwrap(), ChannelLayout::FivePointOne);
        assert_eq!(layout_for_channels(3).unwrap(), ChannelLayout::Surround);
        assert!(layout_for_channels(7).is_err());
        assert!(layout_for_channels(0).is_err());
    }

    #[test]
    fn test_round_trip_s16_in_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s16.wav");
        let samples: Vec<i16> = (0..20).map(|i| i * 100 - 1000).collect();
        let frame = AudioFrame::from_interleaved(&samples, ChannelLayout::Stereo, 22050).unwrap();
        write_wav(&path, &[frame]).unwrap();

        let audio = read_wav(&path, 4).unwrap();
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.format, StreamFormat::packed(SampleFormat::S16, ChannelLayout::Stereo));
        assert_eq!(audio.frames.len(), 3);
        assert_eq!(audio.nb_samples(), 10);
        let pts: Vec<Option<i64>> = audio.frames.iter().map(|f| f.pts()).collect();
        assert_eq!(pts, vec![Some(0), Some(4), Some(8)]);

        let read: Vec<i16> = audio
            .frames
            .iter()
            .flat_map(|f| f.to_interleaved::<i16>().unwrap())
            .collect();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_round_trip_u8_keeps_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("u8.wav");
        let frame = AudioFrame::from_interleaved(&[0u8, 128, 255], ChannelLayout::Mono, 8000).unwrap();
        write_wav(&path, &[frame]).unwrap();

        let audio = read_wav(&path, 1024).unwrap();
        assert_eq!(audio.format.sample_format, SampleFormat::U8);
        assert_eq!(audio.frames[0].channel::<u8>(0).unwrap(), vec![0, 128, 255]);
    }

    #[test]
    fn test_planar_frames_are_interleaved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("planar.wav");
        let frame = AudioFrame::from_planar(&[&[0.5f32, 0.25][..], &[-0.5, -0.25][..]], ChannelLayout::Stereo, 48000)
            .unwrap();
        write_wav(&path, &[frame]).unwrap();

        let audio = read_wav(&path, 16).unwrap();
        assert_eq!(audio.frames[0].to_interleaved::<f32>().unwrap(), vec![0.5, -0.5, 0.25, -0.25]);
    }

    #[test]
    fn test_write_rejects_f64_and_mixed_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        let f64_frame = AudioFrame::from_interleaved(&[0.0f64], ChannelLayout::Mono, 48000).unwrap();
        assert!(matches!(
            write_wav(&path, &[f64_frame]),
            Err(ConvertError::UnsupportedFormat { .. })
        ));

        let a = AudioFrame::from_interleaved(&[0i16], ChannelLayout::Mono, 48000).unwrap();
        let b = AudioFrame::from_interleaved(&[0i16], ChannelLayout::Mono, 44100).unwrap();
        assert!(write_wav(&path, &[a, b]).is_err());
        assert!(write_wav(&path, &[]).is_err());
    }

    #[test]
    fn test_read_nonexistent_file() {
        let result = read_wav(Path::new("/nonexistent/path/audio.wav"), 1024);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_rejects_zero_block() {
        let result = read_wav(Path::new("/nonexistent/path/audio.wav"), 0);
        assert!(matches!(result, Err(ConvertError::InvalidArguments { .. })));
    }
}
