//! Fractional-index table reads.
//!
//! Buffer-reading generators pick an [`Interpolation`] at construction and call
//! [`Interpolation::read`] with a fractional index. Reads wrap at the table
//! boundaries so looping playback is seamless.

use libm::floorf;

use crate::math::wrap;

/// Interpolation mode for fractional table reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Truncate to the sample at or before the index.
    None,
    /// Linear interpolation between adjacent samples.
    #[default]
    Linear,
    /// 4-point Hermite interpolation.
    Cubic,
}

impl Interpolation {
    /// Parse a mode name (`none`, `linear`, `cubic`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Interpolation::None),
            "linear" => Some(Interpolation::Linear),
            "cubic" => Some(Interpolation::Cubic),
            _ => None,
        }
    }

    /// Lowercase name of the mode.
    pub const fn name(self) -> &'static str {
        match self {
            Interpolation::None => "none",
            Interpolation::Linear => "linear",
            Interpolation::Cubic => "cubic",
        }
    }

    /// Read `table` at a fractional `index`, wrapping at both ends.
    ///
    /// An empty table or a non-finite index reads as 0.
    #[inline]
    pub fn read(self, table: &[f32], index: f32) -> f32 {
        let len = table.len();
        if len == 0 || !index.is_finite() {
            return 0.0;
        }
        let pos = wrap(index, len as f32);
        let i0 = (floorf(pos) as usize).min(len - 1);
        let frac = pos - i0 as f32;
        match self {
            Interpolation::None => table[i0],
            Interpolation::Linear => {
                let i1 = (i0 + 1) % len;
                table[i0] + (table[i1] - table[i0]) * frac
            }
            Interpolation::Cubic => {
                let im1 = (i0 + len - 1) % len;
                let i1 = (i0 + 1) % len;
                let i2 = (i0 + 2) % len;
                hermite(table[im1], table[i0], table[i1], table[i2], frac)
            }
        }
    }
}

/// 4-point, 3rd-order Hermite interpolation between `y0` and `y1`.
#[inline]
fn hermite(ym1: f32, y0: f32, y1: f32, y2: f32, t: f32) -> f32 {
    let c1 = 0.5 * (y1 - ym1);
    let c2 = ym1 - 2.5 * y0 + 2.0 * y1 - 0.5 * y2;
    let c3 = 0.5 * (y2 - ym1) + 1.5 * (y0 - y1);
    ((c3 * t + c2) * t + c1) * t + y0
}
