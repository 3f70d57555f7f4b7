//! Mathematical utility functions for unit generators.
//!
//! All functions are allocation-free and safe to call from `generate`.
//!
//! # Waveshaping
//!
//! | Function | Character |
//! |----------|-----------|
//! | [`soft_clip`] | Smooth tanh saturation |
//! | [`hard_clip`] | Symmetric clamp |
//! | [`foldback`] | Folds excess back below the threshold |
//!
//! # Utilities
//!
//! - [`lerp`] - Linear interpolation
//! - [`wrap`] - Floating-point wrap into `[0, len)`
//! - [`finite_or`] - Replace non-finite values with a fallback
//! - [`Rng`] - Seedable xorshift noise source

use libm::{cosf, floorf, logf, sqrtf, tanhf};

/// Soft clipping using tanh.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    tanhf(x)
}

/// Hard clip to `[-threshold, threshold]`.
///
/// A non-positive threshold silences the signal.
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return 0.0;
    }
    x.clamp(-threshold, threshold)
}

/// Foldback distortion.
///
/// When |x| exceeds the threshold the signal folds back instead of clipping.
/// Iterative so that very large inputs cannot recurse deeply.
#[inline]
pub fn foldback(x: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 || !x.is_finite() {
        return 0.0;
    }
    // Triangle-wave fold with period 4 * threshold.
    let period = 4.0 * threshold;
    let shifted = wrap(x + threshold, period);
    if shifted < 2.0 * threshold {
        shifted - threshold
    } else {
        3.0 * threshold - shifted
    }
}

/// Linear interpolation between `a` and `b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Wrap `x` into `[0, len)`.
///
/// Returns 0 for a non-positive length or a non-finite input.
#[inline]
pub fn wrap(x: f32, len: f32) -> f32 {
    if len <= 0.0 || !x.is_finite() {
        return 0.0;
    }
    let r = x - len * floorf(x / len);
    // Rounding can land exactly on len for tiny negative x.
    if r >= len { 0.0 } else { r }
}

/// Return `x` if it is finite, otherwise `fallback`.
#[inline]
pub fn finite_or(x: f32, fallback: f32) -> f32 {
    if x.is_finite() { x } else { fallback }
}

/// Seedable xorshift32 pseudo-random generator.
///
/// Deterministic for a given seed, cheap enough to run per sample.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u32,
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

impl Rng {
    /// Create a generator. A zero seed is replaced by a fixed non-zero one.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x1234_5678 } else { seed },
        }
    }

    /// Next raw 32-bit value.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform value in `[0, 1)`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        // 24 bits of mantissa keeps the result strictly below 1.0.
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }

    /// Uniform value in `[-1, 1)`.
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }

    /// Uniform value in `(0, 1]`, safe to pass to `ln`.
    #[inline]
    pub fn next_open(&mut self) -> f32 {
        1.0 - self.next_f32()
    }

    /// Standard normal sample (Box-Muller).
    pub fn next_gaussian(&mut self) -> f32 {
        let u1 = self.next_open();
        let u2 = self.next_f32();
        sqrtf(-2.0 * logf(u1)) * cosf(core::f32::consts::TAU * u2)
    }
}
