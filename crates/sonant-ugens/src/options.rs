//! Option and edge-detection helpers shared by the generators.

use std::sync::atomic::{AtomicU32, Ordering};

use sonant_core::{BuildContext, Error, Interpolation, Result};

/// Option `interpolation` (none|linear|cubic), or `default` when absent.
pub(crate) fn interpolation(ctx: &BuildContext<'_>, default: Interpolation) -> Result<Interpolation> {
    match ctx.options.get("interpolation") {
        None => Ok(default),
        Some(_) => ctx
            .options
            .text("interpolation")
            .and_then(Interpolation::parse)
            .ok_or_else(|| Error::invalid_option(ctx.spec.id, "interpolation", "expected none, linear or cubic")),
    }
}

/// Required option `buffer`: the name of a sample buffer.
pub(crate) fn buffer_name(ctx: &BuildContext<'_>) -> Result<String> {
    ctx.options
        .text("buffer")
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_option(ctx.spec.id, "buffer", "expected a buffer name"))
}

/// Required non-empty list option.
pub(crate) fn list(ctx: &BuildContext<'_>, key: &str) -> Result<Vec<f32>> {
    ctx.options
        .list(key)
        .filter(|values| !values.is_empty())
        .ok_or_else(|| Error::invalid_option(ctx.spec.id, key, "expected a non-empty list of numbers"))
}

/// Non-negative integer option with a default.
pub(crate) fn count(ctx: &BuildContext<'_>, key: &str, default: usize) -> Result<usize> {
    match ctx.options.get(key) {
        None => Ok(default),
        Some(_) => ctx
            .options
            .usize(key)
            .ok_or_else(|| Error::invalid_option(ctx.spec.id, key, "expected a non-negative integer")),
    }
}

static NEXT_SEED: AtomicU32 = AtomicU32::new(0x9E37_79B9);

/// Option `seed`, or a fresh seed so sibling noise nodes decorrelate.
pub(crate) fn seed(ctx: &BuildContext<'_>) -> u32 {
    match ctx.options.number("seed") {
        Some(seed) => seed as u32,
        None => NEXT_SEED.fetch_add(0x6D2B_79F5, Ordering::Relaxed),
    }
}

/// Rising-edge detector for trigger and gate inputs.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Edge {
    prev: f32,
}

impl Edge {
    /// True when the signal crosses from `<= 0` to `> 0`.
    #[inline]
    pub(crate) fn rising(&mut self, value: f32) -> bool {
        let rose = self.prev <= 0.0 && value > 0.0;
        self.prev = value;
        rose
    }
}

/// A trigger offset waiting for the next block.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PendingRestart(Option<usize>);

impl PendingRestart {
    pub(crate) fn set(&mut self, offset: usize) {
        self.0 = Some(offset);
    }

    /// Take the pending offset as an index into a block of `num_samples`.
    /// Offsets past the block land on its last sample, so a control-rate
    /// node restarts on its next output.
    pub(crate) fn take(&mut self, num_samples: usize) -> Option<usize> {
        self.0.take().map(|offset| offset.min(num_samples.saturating_sub(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_detects_each_crossing_once() {
        let mut edge = Edge::default();
        let rises: Vec<bool> = [0.0, 1.0, 1.0, 0.0, 0.5].iter().map(|&v| edge.rising(v)).collect();
        assert_eq!(rises, [false, true, false, false, true]);
    }

    #[test]
    fn pending_restart_clamps_to_block() {
        let mut restart = PendingRestart::default();
        assert_eq!(restart.take(64), None);
        restart.set(5);
        assert_eq!(restart.take(64), Some(5));
        assert_eq!(restart.take(64), None);
        restart.set(5);
        assert_eq!(restart.take(1), Some(0));
        restart.set(100);
        assert_eq!(restart.take(32), Some(31));
    }
}
