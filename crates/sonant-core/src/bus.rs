//! Shared accumulation buses.
//!
//! Buses are laid out as `[outputs | inputs | interconnect]`. The first
//! `num_channels` are the engine's output channels, the next
//! `num_input_buses` are reserved for external input, and the rest are
//! private buses handed out by [`BusAllocator`]. Every bus is cleared at the
//! start of each block; writers sum into it and readers later in the node
//! order see the sum.

use crate::buffer::SignalBuffer;
use crate::error::{Error, Result};

/// The bus set for one environment.
#[derive(Debug, Clone)]
pub struct Buses {
    buses: Vec<SignalBuffer>,
    num_channels: usize,
    num_input_buses: usize,
}

impl Buses {
    /// Create `num_buses` silent audio-rate buses of `block_size` samples.
    pub fn new(num_buses: usize, block_size: usize, num_channels: usize, num_input_buses: usize) -> Self {
        Self {
            buses: (0..num_buses).map(|_| SignalBuffer::new(block_size)).collect(),
            num_channels,
            num_input_buses,
        }
    }

    /// Total number of buses.
    pub fn len(&self) -> usize {
        self.buses.len()
    }

    /// Whether there are no buses.
    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Index of the first interconnect bus.
    pub fn first_interconnect_bus(&self) -> usize {
        self.num_channels + self.num_input_buses
    }

    /// Silence every bus.
    pub fn clear(&mut self) {
        for bus in &mut self.buses {
            bus.fill(0.0);
        }
    }

    /// Read a bus.
    pub fn read(&self, bus: usize) -> Option<&[f32]> {
        self.buses.get(bus).map(|b| b.as_slice())
    }

    /// Add `samples` into a bus. Out-of-range buses are ignored.
    #[inline]
    pub fn mix_into(&mut self, bus: usize, samples: &[f32]) {
        if let Some(target) = self.buses.get_mut(bus) {
            for (t, &s) in target.iter_mut().zip(samples) {
                *t += s;
            }
        }
    }
}

/// Counter-based allocator for interconnect buses.
#[derive(Debug, Clone)]
pub struct BusAllocator {
    first: usize,
    next: usize,
    total: usize,
}

impl BusAllocator {
    /// Allocator handing out buses `first..total`.
    pub fn new(first: usize, total: usize) -> Self {
        Self {
            first,
            next: first,
            total,
        }
    }

    /// The next free interconnect bus.
    pub fn acquire(&mut self) -> Result<usize> {
        if self.next >= self.total {
            return Err(Error::BusesExhausted {
                requested: self.next,
                available: self.total,
            });
        }
        let bus = self.next;
        self.next += 1;
        Ok(bus)
    }

    /// Forget every allocation.
    pub fn reset(&mut self) {
        self.next = self.first;
    }
}
