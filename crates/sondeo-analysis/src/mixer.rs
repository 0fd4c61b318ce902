//! Splits interleaved capture buffers into per-channel mono waves.

use std::collections::BTreeMap;

use crate::channel::{Channel, ChannelLayout};

/// Sample encoding of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit float.
    F32,
    /// 16-bit signed integer, scaled by 1/32768.
    I16,
}

/// Format of a capture stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Sample encoding.
    pub format: SampleFormat,
    /// Interleaved channels.
    pub layout: ChannelLayout,
}

impl WaveFormat {
    /// Interleaved channel count.
    pub fn channels_count(&self) -> usize {
        self.layout.len()
    }
}

/// Borrowed interleaved samples.
#[derive(Debug, Clone, Copy)]
pub enum SampleData<'a> {
    /// Float samples.
    F32(&'a [f32]),
    /// 16-bit samples.
    I16(&'a [i16]),
}

impl SampleData<'_> {
    /// Number of samples, all channels counted.
    pub fn len(&self) -> usize {
        match self {
            Self::F32(s) => s.len(),
            Self::I16(s) => s.len(),
        }
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn sample(&self, i: usize) -> f32 {
        match self {
            Self::F32(s) => s[i],
            Self::I16(s) => f32::from(s[i]) / 32768.0,
        }
    }
}

/// Per-channel waves of the last capture buffer.
#[derive(Debug, Default)]
pub struct ChannelMixer {
    layout: Option<ChannelLayout>,
    waves: BTreeMap<Channel, Vec<f32>>,
}

impl ChannelMixer {
    /// Mixer without a format; every channel is absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a new stream format and drops stored waves.
    pub fn set_format(&mut self, format: &WaveFormat) {
        self.waves.clear();
        for &channel in format.layout.channels() {
            self.waves.insert(channel, Vec::new());
        }
        self.waves.insert(Channel::Auto, Vec::new());
        self.layout = Some(format.layout.clone());
    }

    /// Current layout.
    pub fn layout(&self) -> Option<&ChannelLayout> {
        self.layout.as_ref()
    }

    /// De-interleaves `data`; a trailing partial frame is ignored.
    ///
    /// `Auto` is the average of every channel, or a copy for mono.
    pub fn decompose(&mut self, data: SampleData<'_>) {
        let Some(layout) = &self.layout else {
            return;
        };
        let channels = layout.len();
        if channels == 0 {
            return;
        }
        let frames = data.len() / channels;

        for (index, &channel) in layout.channels().iter().enumerate() {
            if let Some(wave) = self.waves.get_mut(&channel) {
                wave.clear();
                wave.extend((0..frames).map(|f| data.sample(f * channels + index)));
            }
        }

        let scale = 1.0 / channels as f32;
        if let Some(auto) = self.waves.get_mut(&Channel::Auto) {
            auto.clear();
            auto.extend((0..frames).map(|f| {
                let frame = f * channels;
                let sum: f32 = (0..channels).map(|c| data.sample(frame + c)).sum();
                if channels == 1 { sum } else { sum * scale }
            }));
        }
    }

    /// Zero-fills `frames` samples on every present channel.
    pub fn fill_silence(&mut self, frames: usize) {
        for wave in self.waves.values_mut() {
            wave.clear();
            wave.resize(frames, 0.0);
        }
    }

    /// Wave of `channel`, `None` if the layout lacks it.
    pub fn channel_data(&self, channel: Channel) -> Option<&[f32]> {
        self.waves.get(&channel).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_f32() -> WaveFormat {
        WaveFormat {
            sample_rate: 48000,
            format: SampleFormat::F32,
            layout: ChannelLayout::stereo(),
        }
    }

    #[test]
    fn test_deinterleave_and_auto() {
        let mut mixer = ChannelMixer::new();
        mixer.set_format(&stereo_f32());
        mixer.decompose(SampleData::F32(&[1.0, 0.0, 0.5, -0.5, 0.25]));

        assert_eq!(mixer.channel_data(Channel::FrontLeft), Some(&[1.0, 0.5][..]));
        assert_eq!(mixer.channel_data(Channel::FrontRight), Some(&[0.0, -0.5][..]));
        assert_eq!(mixer.channel_data(Channel::Auto), Some(&[0.5, 0.0][..]));
        assert_eq!(mixer.channel_data(Channel::Center), None);
    }

    #[test]
    fn test_i16_scaling_and_mono_auto() {
        let mut mixer = ChannelMixer::new();
        mixer.set_format(&WaveFormat {
            sample_rate: 8000,
            format: SampleFormat::I16,
            layout: ChannelLayout::mono(),
        });
        mixer.decompose(SampleData::I16(&[16384, -32768]));
        assert_eq!(mixer.channel_data(Channel::Center), Some(&[0.5, -1.0][..]));
        assert_eq!(mixer.channel_data(Channel::Auto), Some(&[0.5, -1.0][..]));
    }

    #[test]
    fn test_silence_fills_every_channel() {
        let mut mixer = ChannelMixer::new();
        mixer.set_format(&stereo_f32());
        mixer.decompose(SampleData::F32(&[1.0; 8]));
        mixer.fill_silence(3);
        for channel in [Channel::FrontLeft, Channel::FrontRight, Channel::Auto] {
            assert_eq!(mixer.channel_data(channel), Some(&[0.0; 3][..]));
        }
    }

    #[test]
    fn test_no_format_no_channels() {
        let mut mixer = ChannelMixer::new();
        mixer.decompose(SampleData::F32(&[1.0; 4]));
        assert!(mixer.channel_data(Channel::Auto).is_none());
    }
}
