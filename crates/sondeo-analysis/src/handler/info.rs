//! Handler-specific snapshot data and property lookup.

use std::fmt;

use sondeo_core::Buffer2D;

use crate::image::Color;

/// Per-cascade FFT facts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CascadeInfo {
    /// Hz per bin.
    pub bin_width: f64,
    /// Highest representable frequency.
    pub nyquist: f64,
    /// Last DC magnitude.
    pub dc: f32,
}

/// Introspection data copied into the snapshot with the values.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HandlerInfo {
    /// Nothing to report.
    #[default]
    None,
    /// FFT analyzer facts.
    Fft {
        /// Transform size.
        size: usize,
        /// Overlap fraction.
        overlap: f64,
        /// One entry per cascade.
        cascades: Vec<CascadeInfo>,
    },
    /// Band boundaries, `bands + 1` frequencies.
    Bands {
        /// Ascending boundary frequencies.
        freqs: Vec<f32>,
    },
    /// Block level facts.
    Block {
        /// Samples per block.
        block_size: usize,
        /// Attack time in ms.
        attack: f64,
        /// Decay time in ms.
        decay: f64,
    },
    /// Loudness meter facts.
    Loudness {
        /// Samples per micro-block.
        block_size: usize,
        /// Micro-blocks in the window.
        blocks_count: usize,
    },
    /// Rendered image.
    Image {
        /// Samples per line.
        block_size: usize,
        /// Lines, oldest first.
        image: Buffer2D<Color>,
        /// True if every line is background.
        empty: bool,
        /// Image width as configured.
        width: usize,
        /// Image height as configured.
        height: usize,
    },
}

impl HandlerInfo {
    /// Writes the property `name` to `out`; false if the property is unknown.
    ///
    /// Indexed properties take a 1-based index after the name, e.g.
    /// `"lower bound 3"`. Without an index the first entry is used; an index
    /// out of range prints `0`.
    pub fn prop(&self, name: &str, out: &mut dyn fmt::Write) -> bool {
        let name = name.trim().to_ascii_lowercase();
        let written = match self {
            Self::None => return false,
            Self::Fft {
                size,
                overlap,
                cascades,
            } => match name.as_str() {
                "size" => write!(out, "{size}"),
                "overlap" => write!(out, "{overlap}"),
                "cascades count" => write!(out, "{}", cascades.len()),
                _ => {
                    let (field, index) = if let Some(i) = indexed(&name, "bin width") {
                        (0, i)
                    } else if let Some(i) = indexed(&name, "nyquist frequency") {
                        (1, i)
                    } else if let Some(i) = indexed(&name, "dc") {
                        (2, i)
                    } else {
                        return false;
                    };
                    match resolve(index, cascades.len()).map(|i| &cascades[i]) {
                        None => out.write_str("0"),
                        Some(c) if field == 0 => write!(out, "{}", c.bin_width),
                        Some(c) if field == 1 => write!(out, "{}", c.nyquist),
                        Some(c) => write!(out, "{}", c.dc),
                    }
                }
            },
            Self::Bands { freqs } => {
                let bands = freqs.len().saturating_sub(1);
                if name == "bands count" {
                    write!(out, "{bands}")
                } else {
                    let (field, index) = if let Some(i) = indexed(&name, "lower bound") {
                        (0, i)
                    } else if let Some(i) = indexed(&name, "upper bound") {
                        (1, i)
                    } else if let Some(i) = indexed(&name, "central frequency") {
                        (2, i)
                    } else {
                        return false;
                    };
                    match resolve(index, bands) {
                        None => out.write_str("0"),
                        Some(b) => {
                            let (low, high) = (freqs[b], freqs[b + 1]);
                            let value = match field {
                                0 => low,
                                1 => high,
                                _ => (low + high) * 0.5,
                            };
                            write!(out, "{value}")
                        }
                    }
                }
            }
            Self::Block {
                block_size,
                attack,
                decay,
            } => match name.as_str() {
                "block size" => write!(out, "{block_size}"),
                "attack" => write!(out, "{attack}"),
                "decay" => write!(out, "{decay}"),
                _ => return false,
            },
            Self::Loudness {
                block_size,
                blocks_count,
            } => match name.as_str() {
                "block size" => write!(out, "{block_size}"),
                "blocks count" => write!(out, "{blocks_count}"),
                _ => return false,
            },
            Self::Image {
                block_size,
                empty,
                width,
                height,
                ..
            } => match name.as_str() {
                "block size" => write!(out, "{block_size}"),
                "width" => write!(out, "{width}"),
                "height" => write!(out, "{height}"),
                "image empty" => write!(out, "{}", u8::from(*empty)),
                _ => return false,
            },
        };
        written.is_ok()
    }
}

/// `Some(None)` for a bare `prefix`, `Some(Some(n))` for `prefix n`.
fn indexed(name: &str, prefix: &str) -> Option<Option<usize>> {
    let rest = name.strip_prefix(prefix)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Some(None);
    }
    rest.parse().ok().map(Some)
}

/// 1-based index into `0..len`; no index means the first entry.
fn resolve(index: Option<usize>, len: usize) -> Option<usize> {
    match index {
        None if len > 0 => Some(0),
        Some(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(info: &HandlerInfo, name: &str) -> Option<String> {
        let mut s = String::new();
        info.prop(name, &mut s).then_some(s)
    }

    #[test]
    fn test_band_props() {
        let info = HandlerInfo::Bands {
            freqs: vec![100.0, 200.0, 400.0],
        };
        assert_eq!(prop(&info, "bands count").as_deref(), Some("2"));
        assert_eq!(prop(&info, "lower bound").as_deref(), Some("100"));
        assert_eq!(prop(&info, "Upper Bound 2").as_deref(), Some("400"));
        assert_eq!(prop(&info, "central frequency 1").as_deref(), Some("150"));
        assert_eq!(prop(&info, "lower bound 3").as_deref(), Some("0"));
        assert_eq!(prop(&info, "lower bound x"), None);
        assert_eq!(prop(&info, "size"), None);
    }

    #[test]
    fn test_fft_props() {
        let info = HandlerInfo::Fft {
            size: 1024,
            overlap: 0.5,
            cascades: vec![
                CascadeInfo {
                    bin_width: 46.875,
                    nyquist: 24000.0,
                    dc: 0.0,
                },
                CascadeInfo {
                    bin_width: 23.4375,
                    nyquist: 12000.0,
                    dc: 0.25,
                },
            ],
        };
        assert_eq!(prop(&info, "size").as_deref(), Some("1024"));
        assert_eq!(prop(&info, "cascades count").as_deref(), Some("2"));
        assert_eq!(prop(&info, "bin width").as_deref(), Some("46.875"));
        assert_eq!(prop(&info, "nyquist frequency 2").as_deref(), Some("12000"));
        assert_eq!(prop(&info, "dc 2").as_deref(), Some("0.25"));
    }

    #[test]
    fn test_none_has_no_props() {
        assert_eq!(prop(&HandlerInfo::None, "block size"), None);
    }
}
