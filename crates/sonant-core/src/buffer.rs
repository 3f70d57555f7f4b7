//! Signal buffers and PCM sample storage.
//!
//! [`SignalBuffer`] is the unit of data flow between nodes: a block of samples
//! whose length is fixed when the owning node is created. [`SampleBuffer`] and
//! [`BufferStore`] hold the raw PCM data supplied by collaborators for the
//! buffer reader and writer generators.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// A fixed-length block of samples.
///
/// Backed by a boxed slice, so the length cannot change after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    samples: Box<[f32]>,
}

impl SignalBuffer {
    /// Create a silent buffer of `len` samples (at least one).
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len.max(1)].into_boxed_slice(),
        }
    }

    /// Create a buffer holding a copy of `samples` (a single 0.0 when empty).
    pub fn from_slice(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self::new(1);
        }
        Self {
            samples: samples.into(),
        }
    }

    /// Borrow the samples.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Mutably borrow the samples.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Set every sample to `value`.
    #[inline]
    pub fn fill(&mut self, value: f32) {
        self.samples.fill(value);
    }

    /// The first sample, read by consumers of non-audio-rate producers.
    #[inline]
    pub fn first(&self) -> f32 {
        self.samples[0]
    }

    /// Replace every non-finite sample with 0. Returns true if any were replaced.
    pub fn sanitize(&mut self) -> bool {
        let mut replaced = false;
        for s in self.samples.iter_mut() {
            if !s.is_finite() {
                *s = 0.0;
                replaced = true;
            }
        }
        replaced
    }
}

impl Deref for SignalBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.samples
    }
}

impl DerefMut for SignalBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }
}

/// Planar PCM data with a sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f32,
}

impl SampleBuffer {
    /// Wrap planar channel data. Channels are truncated to the shortest one.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: f32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(frames);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Single-channel buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: f32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Silent buffer with the given shape.
    pub fn silent(num_channels: usize, frames: usize, sample_rate: f32) -> Self {
        Self::new(vec![vec![0.0; frames]; num_channels.max(1)], sample_rate)
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Sample rate of the recorded data.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Duration in seconds. Zero for an invalid sample rate.
    pub fn duration(&self) -> f32 {
        if self.sample_rate > 0.0 {
            self.frames() as f32 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Borrow one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Mutably borrow one channel.
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }
}

/// Named sample buffers shared by reader and writer generators.
#[derive(Debug, Default, Clone)]
pub struct BufferStore {
    buffers: HashMap<String, SampleBuffer>,
}

impl BufferStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a buffer, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, buffer: SampleBuffer) -> Option<SampleBuffer> {
        self.buffers.insert(name.into(), buffer)
    }

    /// Look up a buffer.
    pub fn get(&self, name: &str) -> Option<&SampleBuffer> {
        self.buffers.get(name)
    }

    /// Look up a buffer mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut SampleBuffer> {
        self.buffers.get_mut(name)
    }

    /// Remove a buffer.
    pub fn remove(&mut self, name: &str) -> Option<SampleBuffer> {
        self.buffers.remove(name)
    }

    /// Whether a buffer with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    /// Number of stored buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_buffer_has_minimum_length() {
        assert_eq!(SignalBuffer::new(0).len(), 1);
        assert_eq!(SignalBuffer::from_slice(&[]).len(), 1);
        assert_eq!(SignalBuffer::new(64).len(), 64);
    }

    #[test]
    fn sanitize_replaces_non_finite() {
        let mut buf = SignalBuffer::from_slice(&[0.5, f32::NAN, f32::INFINITY, -0.25]);
        assert!(buf.sanitize());
        assert_eq!(buf.as_slice(), &[0.5, 0.0, 0.0, -0.25]);
        assert!(!buf.sanitize());
    }

    #[test]
    fn sample_buffer_truncates_ragged_channels() {
        let buf = SampleBuffer::new(vec![vec![1.0; 10], vec![2.0; 7]], 48000.0);
        assert_eq!(buf.frames(), 7);
        assert_eq!(buf.num_channels(), 2);
    }

    #[test]
    fn sample_buffer_duration() {
        let buf = SampleBuffer::silent(1, 24000, 48000.0);
        assert!((buf.duration() - 0.5).abs() < 1e-6);
        assert_eq!(SampleBuffer::silent(1, 10, 0.0).duration(), 0.0);
    }

    #[test]
    fn store_insert_replace_remove() {
        let mut store = BufferStore::new();
        assert!(store.insert("a", SampleBuffer::mono(vec![1.0], 100.0)).is_none());
        assert!(store.insert("a", SampleBuffer::mono(vec![2.0], 100.0)).is_some());
        assert_eq!(store.get("a").and_then(|b| b.channel(0)), Some(&[2.0][..]));
        assert!(store.remove("a").is_some());
        assert!(store.is_empty());
    }
}
