//! WAV file capture.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use hound::{SampleFormat as HoundFormat, WavReader};
use sondeo_analysis::{ChannelLayout, SampleFormat, WaveFormat};

use crate::capture::{CaptureEvent, CaptureSource, SampleBuffer};
use crate::{Error, Result};

/// WAV file metadata extracted without loading sample data.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Total number of sample frames (samples per channel).
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl WavInfo {
    fn from_reader<R: std::io::Read>(reader: &WavReader<R>) -> Self {
        let spec = reader.spec();
        let num_frames = u64::from(reader.duration());
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            num_frames,
            duration_secs: num_frames as f64 / f64::from(spec.sample_rate.max(1)),
        }
    }
}

/// Read WAV metadata without loading sample data.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    Ok(WavInfo::from_reader(&reader))
}

enum Decoding {
    Float,
    Int16,
    // 8, 24 and 32 bit integers, scaled to -1..1
    Int { scale: f32 },
}

/// Streams a WAV file as capture buffers of a fixed frame count.
///
/// 16-bit files are delivered as [`SampleFormat::I16`], everything else as
/// [`SampleFormat::F32`]. The stream starts with a format event and ends
/// with the last, possibly shorter, buffer.
pub struct WavCapture {
    reader: WavReader<BufReader<File>>,
    info: WavInfo,
    format: WaveFormat,
    decoding: Decoding,
    buffer_frames: usize,
    announced: bool,
    frames_read: u64,
    realtime: Option<Instant>,
}

impl std::fmt::Debug for WavCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavCapture")
            .field("info", &self.info)
            .field("format", &self.format)
            .field("buffer_frames", &self.buffer_frames)
            .field("frames_read", &self.frames_read)
            .finish_non_exhaustive()
    }
}

impl WavCapture {
    /// Opens `path` for reading `buffer_frames` frames per buffer.
    pub fn open<P: AsRef<Path>>(path: P, buffer_frames: usize) -> Result<Self> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let info = WavInfo::from_reader(&reader);

        let layout = ChannelLayout::from_channel_count(usize::from(spec.channels)).ok_or_else(
            || Error::UnsupportedFormat(format!("{} channels", spec.channels)),
        )?;
        let decoding = match (spec.sample_format, spec.bits_per_sample) {
            (HoundFormat::Float, 32) => Decoding::Float,
            (HoundFormat::Int, 16) => Decoding::Int16,
            (HoundFormat::Int, bits @ (8 | 24 | 32)) => Decoding::Int {
                scale: 1.0 / (1i64 << (bits - 1)) as f32,
            },
            (format, bits) => {
                return Err(Error::UnsupportedFormat(format!("{format:?} {bits} bit")));
            }
        };
        let format = WaveFormat {
            sample_rate: spec.sample_rate,
            format: if matches!(decoding, Decoding::Int16) {
                SampleFormat::I16
            } else {
                SampleFormat::F32
            },
            layout,
        };

        tracing::debug!(
            channels = info.channels,
            sample_rate = info.sample_rate,
            bits = info.bits_per_sample,
            frames = info.num_frames,
            "wav capture opened"
        );

        Ok(Self {
            reader,
            info,
            format,
            decoding,
            buffer_frames: buffer_frames.max(1),
            announced: false,
            frames_read: 0,
            realtime: None,
        })
    }

    /// Paces buffers to the file's sample rate when enabled.
    pub fn realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled.then(Instant::now);
        self
    }

    /// File metadata.
    pub fn info(&self) -> &WavInfo {
        &self.info
    }

    /// Stream format announced by the first event.
    pub fn format(&self) -> &WaveFormat {
        &self.format
    }

    /// Frames delivered so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn read_buffer(&mut self) -> Result<SampleBuffer> {
        let count = self.buffer_frames * usize::from(self.info.channels);
        let buffer = match self.decoding {
            Decoding::Float => SampleBuffer::F32(
                self.reader
                    .samples::<f32>()
                    .take(count)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Decoding::Int16 => SampleBuffer::I16(
                self.reader
                    .samples::<i16>()
                    .take(count)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Decoding::Int { scale } => SampleBuffer::F32(
                self.reader
                    .samples::<i32>()
                    .take(count)
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?,
            ),
        };
        Ok(buffer)
    }

    fn pace(&self) {
        let Some(start) = self.realtime else {
            return;
        };
        let due = start
            + Duration::from_secs_f64(
                self.frames_read as f64 / f64::from(self.info.sample_rate.max(1)),
            );
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl CaptureSource for WavCapture {
    fn next_event(&mut self) -> Result<Option<CaptureEvent>> {
        if !self.announced {
            self.announced = true;
            if let Some(start) = &mut self.realtime {
                *start = Instant::now();
            }
            return Ok(Some(CaptureEvent::Format(self.format.clone())));
        }

        let buffer = self.read_buffer()?;
        if buffer.is_empty() {
            return Ok(None);
        }
        self.frames_read += (buffer.len() / usize::from(self.info.channels)) as u64;
        self.pace();
        Ok(Some(CaptureEvent::Buffer(buffer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write(path: &Path, channels: u16, bits: u16, float: bool, frames: usize) {
        let spec = WavSpec {
            channels,
            sample_rate: 48000,
            bits_per_sample: bits,
            sample_format: if float {
                HoundFormat::Float
            } else {
                HoundFormat::Int
            },
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..frames * usize::from(channels) {
            let v = if i % 2 == 0 { 0.5f32 } else { -0.25 };
            match (float, bits) {
                (true, _) => writer.write_sample(v).unwrap(),
                (false, 16) => writer.write_sample((v * 32768.0) as i16).unwrap(),
                (false, _) => writer.write_sample((v * 8_388_608.0) as i32).unwrap(),
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_i16_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.wav");
        write(&path, 2, 16, false, 1000);

        let mut capture = WavCapture::open(&path, 480).unwrap();
        assert_eq!(capture.info().num_frames, 1000);
        assert_eq!(capture.format().format, SampleFormat::I16);
        assert_eq!(capture.format().layout, ChannelLayout::stereo());

        assert!(matches!(capture.next_event().unwrap(), Some(CaptureEvent::Format(_))));
        let mut lens = Vec::new();
        while let Some(event) = capture.next_event().unwrap() {
            let CaptureEvent::Buffer(buffer) = event else {
                panic!("unexpected event");
            };
            lens.push(buffer.len());
        }
        assert_eq!(lens, [960, 960, 80]);
        assert_eq!(capture.frames_read(), 1000);
    }

    #[test]
    fn test_24_bit_is_scaled_to_float() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("b.wav");
        write(&path, 1, 24, false, 4);

        let mut capture = WavCapture::open(&path, 16).unwrap();
        assert_eq!(capture.format().format, SampleFormat::F32);
        capture.next_event().unwrap();
        let Some(CaptureEvent::Buffer(SampleBuffer::F32(samples))) = capture.next_event().unwrap()
        else {
            panic!("expected a float buffer");
        };
        assert_eq!(samples, [0.5, -0.25, 0.5, -0.25]);
    }

    #[test]
    fn test_unsupported_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.wav");
        write(&path, 5, 32, true, 4);
        assert!(matches!(WavCapture::open(&path, 16), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            WavCapture::open("/nonexistent/file.wav", 16),
            Err(Error::Wav(_))
        ));
    }
}
