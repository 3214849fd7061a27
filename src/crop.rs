//! Output size resolution for perspective crops.
//!
//! A crop is either a fixed size or derived from the quadrilateral itself,
//! scaled down by a gain. With [`Gain::Auto`] the gain is picked per
//! quadrilateral so the result fits inside `max_width` x `max_height`.

use crate::error::{CropError, Result};
use crate::geometry::Quad;

/// Scale-down factor applied to the quad's pixel extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gain {
    Fixed(f64),
    Auto,
}

impl Gain {
    /// Parses a gain the way the dataset scripts spell it: `-1` or `auto`
    /// means automatic, anything else must be a positive number.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Gain::Auto);
        }
        let value: f64 = s.parse().map_err(|_| format!("Invalid gain: {}", s))?;
        if value == -1.0 {
            Ok(Gain::Auto)
        } else if value > 0.0 && value.is_finite() {
            Ok(Gain::Fixed(value))
        } else {
            Err(format!("Gain must be positive or -1 (auto), got {}", s))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropSpec {
    Fixed {
        width: u32,
        height: u32,
    },
    /// `max_width` / `max_height` only bound the result under [`Gain::Auto`].
    /// A cap of zero disables that axis.
    Dynamic {
        max_width: u32,
        max_height: u32,
        gain: Gain,
    },
}

impl CropSpec {
    pub fn validate(&self) -> Result<()> {
        match *self {
            CropSpec::Fixed { width, height } => {
                if width == 0 || height == 0 {
                    return Err(CropError::Configuration(format!(
                        "fixed crop size must be positive, got {}x{}",
                        width, height
                    )));
                }
            }
            CropSpec::Dynamic { gain, .. } => {
                if let Gain::Fixed(g) = gain {
                    if !(g > 0.0 && g.is_finite()) {
                        return Err(CropError::Configuration(format!(
                            "gain must be a positive number, got {}",
                            g
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Pick the gain for one quadrilateral of extent `full_width` x `full_height`.
///
/// The larger of the two per-axis ratios keeps both sides within their caps.
/// An axis whose cap is zero drops out; with both out the gain is 1.0.
pub fn resolve_gain(
    full_width: f64,
    full_height: f64,
    max_width: u32,
    max_height: u32,
    gain: Gain,
) -> f64 {
    match gain {
        Gain::Fixed(g) => g,
        Gain::Auto => {
            let gain_w = if max_width > 0 {
                full_width / max_width as f64
            } else {
                0.0
            };
            let gain_h = if max_height > 0 {
                full_height / max_height as f64
            } else {
                0.0
            };

            if gain_w == 0.0 && gain_h == 0.0 {
                1.0
            } else if gain_w == 0.0 {
                gain_h
            } else if gain_h == 0.0 {
                gain_w
            } else {
                gain_w.max(gain_h)
            }
        }
    }
}

/// Truncate toward zero, then clamp to at least one pixel.
fn to_pixels(value: f64) -> u32 {
    let truncated = value.trunc();
    if truncated.is_nan() || truncated < 1.0 {
        1
    } else if truncated >= u32::MAX as f64 {
        u32::MAX
    } else {
        truncated as u32
    }
}

/// Output `(width, height)` for a canonical quad under `spec`.
///
/// A collapsed quad still yields 1x1 here so that size resolution never fails;
/// the warp itself rejects degenerate corners.
pub fn resolve_output_size(quad: &Quad, spec: &CropSpec) -> (u32, u32) {
    match *spec {
        CropSpec::Fixed { width, height } => (width, height),
        CropSpec::Dynamic {
            max_width,
            max_height,
            gain,
        } => {
            let (full_width, full_height) = quad.edge_extent();
            let gain = resolve_gain(full_width, full_height, max_width, max_height, gain);
            (to_pixels(full_width / gain), to_pixels(full_height / gain))
        }
    }
}
