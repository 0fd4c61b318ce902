//! Audio channel identities and layouts.

use std::fmt;
use std::str::FromStr;

/// One audio channel, or the `Auto` mix of all channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
    /// Front centre.
    Center,
    /// Low-frequency effects.
    LowFrequency,
    /// Back left.
    BackLeft,
    /// Back right.
    BackRight,
    /// Side left.
    SideLeft,
    /// Side right.
    SideRight,
    /// Back centre.
    CenterBack,
    /// Average of every channel in the layout.
    Auto,
}

impl Channel {
    /// Every channel, in layout order, `Auto` last.
    pub const ALL: [Channel; 10] = [
        Self::FrontLeft,
        Self::FrontRight,
        Self::Center,
        Self::LowFrequency,
        Self::BackLeft,
        Self::BackRight,
        Self::SideLeft,
        Self::SideRight,
        Self::CenterBack,
        Self::Auto,
    ];

    /// Canonical name used as a snapshot key.
    pub fn technical_name(self) -> &'static str {
        match self {
            Self::FrontLeft => "left",
            Self::FrontRight => "right",
            Self::Center => "center",
            Self::LowFrequency => "lfe",
            Self::BackLeft => "back-left",
            Self::BackRight => "back-right",
            Self::SideLeft => "side-left",
            Self::SideRight => "side-right",
            Self::CenterBack => "center-back",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.technical_name())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "left" | "l" | "fl" | "frontleft" => Ok(Self::FrontLeft),
            "right" | "r" | "fr" | "frontright" => Ok(Self::FrontRight),
            "center" | "centre" | "c" | "frontcenter" => Ok(Self::Center),
            "lfe" | "lowfrequency" | "subwoofer" => Ok(Self::LowFrequency),
            "backleft" | "bl" | "rearleft" => Ok(Self::BackLeft),
            "backright" | "br" | "rearright" => Ok(Self::BackRight),
            "sideleft" | "sl" => Ok(Self::SideLeft),
            "sideright" | "sr" => Ok(Self::SideRight),
            "centerback" | "backcenter" | "cb" => Ok(Self::CenterBack),
            "auto" | "mix" => Ok(Self::Auto),
            _ => Err(format!("unknown channel: {s}")),
        }
    }
}

/// Ordered channels of an interleaved stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    name: &'static str,
    channels: Vec<Channel>,
}

impl ChannelLayout {
    /// Standard layout for a channel count: mono, stereo, 2.1, quad, 5.1, 7.1.
    pub fn from_channel_count(count: usize) -> Option<Self> {
        use Channel::{
            BackLeft, BackRight, Center, FrontLeft, FrontRight, LowFrequency, SideLeft, SideRight,
        };
        let (name, channels) = match count {
            1 => ("mono", vec![Center]),
            2 => ("stereo", vec![FrontLeft, FrontRight]),
            3 => ("2.1", vec![FrontLeft, FrontRight, LowFrequency]),
            4 => ("quad", vec![FrontLeft, FrontRight, BackLeft, BackRight]),
            6 => (
                "5.1",
                vec![FrontLeft, FrontRight, Center, LowFrequency, BackLeft, BackRight],
            ),
            8 => (
                "7.1",
                vec![
                    FrontLeft,
                    FrontRight,
                    Center,
                    LowFrequency,
                    BackLeft,
                    BackRight,
                    SideLeft,
                    SideRight,
                ],
            ),
            _ => return None,
        };
        Some(Self { name, channels })
    }

    /// Mono layout.
    pub fn mono() -> Self {
        Self {
            name: "mono",
            channels: vec![Channel::Center],
        }
    }

    /// Stereo layout.
    pub fn stereo() -> Self {
        Self {
            name: "stereo",
            channels: vec![Channel::FrontLeft, Channel::FrontRight],
        }
    }

    /// Layout name, e.g. `5.1`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Physical channels in interleave order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of interleaved channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True for a layout without channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Interleave index of `channel`.
    pub fn index_of(&self, channel: Channel) -> Option<usize> {
        self.channels.iter().position(|&c| c == channel)
    }

    /// True if the channel can be produced; `Auto` always can.
    pub fn contains(&self, channel: Channel) -> bool {
        channel == Channel::Auto || self.channels.contains(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("Left".parse::<Channel>(), Ok(Channel::FrontLeft));
        assert_eq!("front_right".parse::<Channel>(), Ok(Channel::FrontRight));
        assert_eq!("LFE".parse::<Channel>(), Ok(Channel::LowFrequency));
        assert_eq!("auto".parse::<Channel>(), Ok(Channel::Auto));
        assert!("top".parse::<Channel>().is_err());
        for ch in Channel::ALL {
            assert_eq!(ch.to_string().parse::<Channel>(), Ok(ch));
        }
    }

    #[test]
    fn test_layouts() {
        let surround = ChannelLayout::from_channel_count(6).unwrap();
        assert_eq!(surround.name(), "5.1");
        assert_eq!(surround.index_of(Channel::LowFrequency), Some(3));
        assert!(surround.contains(Channel::Auto));
        assert!(!surround.contains(Channel::SideLeft));
        assert!(ChannelLayout::from_channel_count(5).is_none());
        assert_eq!(ChannelLayout::from_channel_count(1), Some(ChannelLayout::mono()));
    }
}
