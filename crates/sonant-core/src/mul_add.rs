//! `mul`/`add` post-processing strategies.
//!
//! Every node may carry `mul` and `add` inputs applied after its generation
//! function: `out[i] = out[i] * mul[i * mul_stride] + add[i * add_stride]`.
//! The strategy is chosen once when inputs change ([`MulAdd::select`]), so
//! the per-sample loop never branches on rate.

use crate::rate::Rate;

/// Selected post-processing strategy for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MulAdd {
    /// Neither `mul` nor `add` is connected.
    #[default]
    Identity,
    /// Audio-rate mul, audio-rate add.
    ArMulArAdd,
    /// Audio-rate mul, block-constant add.
    ArMulKrAdd,
    /// Block-constant mul, audio-rate add.
    KrMulArAdd,
    /// Block-constant mul, block-constant add.
    KrMulKrAdd,
}

/// Read when `mul` is not connected.
pub const UNITY: [f32; 1] = [1.0];
/// Read when `add` is not connected.
pub const ZERO: [f32; 1] = [0.0];

impl MulAdd {
    /// Pick the strategy for a consumer at `consumer` rate.
    ///
    /// `None` means the input is unconnected. A non-audio consumer always
    /// reads its inputs at index 0.
    pub fn select(consumer: Rate, mul: Option<Rate>, add: Option<Rate>) -> Self {
        if mul.is_none() && add.is_none() {
            return MulAdd::Identity;
        }
        let per_sample = |r: Option<Rate>| consumer.is_audio() && r.is_some_and(Rate::is_audio);
        match (per_sample(mul), per_sample(add)) {
            (true, true) => MulAdd::ArMulArAdd,
            (true, false) => MulAdd::ArMulKrAdd,
            (false, true) => MulAdd::KrMulArAdd,
            (false, false) => MulAdd::KrMulKrAdd,
        }
    }

    /// Apply the strategy in place.
    ///
    /// Pass [`UNITY`] / [`ZERO`] for unconnected inputs. Audio-rate buffers
    /// shorter than `out` leave the tail unprocessed rather than panicking.
    #[inline]
    pub fn apply(self, out: &mut [f32], mul: &[f32], add: &[f32]) {
        match self {
            MulAdd::Identity => {}
            MulAdd::ArMulArAdd => ar_mul_ar_add(out, mul, add),
            MulAdd::ArMulKrAdd => ar_mul_kr_add(out, mul, first(add, 0.0)),
            MulAdd::KrMulArAdd => kr_mul_ar_add(out, first(mul, 1.0), add),
            MulAdd::KrMulKrAdd => kr_mul_kr_add(out, first(mul, 1.0), first(add, 0.0)),
        }
    }
}

#[inline]
fn first(buf: &[f32], fallback: f32) -> f32 {
    buf.first().copied().unwrap_or(fallback)
}

fn ar_mul_ar_add(out: &mut [f32], mul: &[f32], add: &[f32]) {
    for ((o, &m), &a) in out.iter_mut().zip(mul).zip(add) {
        *o = *o * m + a;
    }
}

fn ar_mul_kr_add(out: &mut [f32], mul: &[f32], add: f32) {
    for (o, &m) in out.iter_mut().zip(mul) {
        *o = *o * m + add;
    }
}

fn kr_mul_ar_add(out: &mut [f32], mul: f32, add: &[f32]) {
    for (o, &a) in out.iter_mut().zip(add) {
        *o = *o * mul + a;
    }
}

fn kr_mul_kr_add(out: &mut [f32], mul: f32, add: f32) {
    for o in out.iter_mut() {
        *o = *o * mul + add;
    }
}
