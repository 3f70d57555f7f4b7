//! The unit-generator contract.
//!
//! A unit generator is the per-family signal algorithm behind a node. The
//! engine owns everything around it (input wiring, strides, `mul`/`add`,
//! output buffers), so an implementation only fills its output buffers from
//! its inputs and internal state.
//!
//! ## Implementing a generator
//!
//! ```rust,ignore
//! static SPEC: UgenSpec = UgenSpec {
//!     id: "halve",
//!     inputs: &[InputSpec::required("source")],
//!     rates: &[Rate::Audio, Rate::Control],
//!     default_rate: Rate::Audio,
//! };
//!
//! struct Halve;
//!
//! impl UnitGenerator for Halve {
//!     fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
//!         let source = inputs.get(0);
//!         for (i, s) in out[0][..ctx.num_samples].iter_mut().enumerate() {
//!             *s = source.at(i) * 0.5;
//!         }
//!     }
//! }
//! ```

use crate::buffer::{BufferStore, SignalBuffer};
use crate::bus::Buses;
use crate::descriptor::Options;
use crate::node::{InputSlot, Slot, resolve};
use crate::rate::Rate;

/// Name of the implicit amplitude-scale input.
pub const MUL: &str = "mul";
/// Name of the implicit offset input.
pub const ADD: &str = "add";

/// Declaration of one named input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSpec {
    /// Input name as used in descriptors and `set_input`.
    pub name: &'static str,
    /// Value used when the descriptor omits the input. `None` means required.
    pub default: Option<f32>,
    /// Maximum channel count a connected node may expose.
    pub max_channels: usize,
}

impl InputSpec {
    /// Single-channel input with a default value.
    pub const fn new(name: &'static str, default: f32) -> Self {
        Self {
            name,
            default: Some(default),
            max_channels: 1,
        }
    }

    /// Single-channel input that must be supplied.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            default: None,
            max_channels: 1,
        }
    }

    /// Required input accepting any number of channels.
    pub const fn multi(name: &'static str) -> Self {
        Self {
            name,
            default: None,
            max_channels: usize::MAX,
        }
    }

    /// Override the channel limit.
    pub const fn with_max_channels(mut self, max_channels: usize) -> Self {
        self.max_channels = max_channels;
        self
    }
}

/// Static description of a generator type.
#[derive(Debug)]
pub struct UgenSpec {
    /// Type identifier used as the registry key.
    pub id: &'static str,
    /// Declared inputs, in the order [`Inputs::get`] indexes them.
    pub inputs: &'static [InputSpec],
    /// Rates the generator can run at.
    pub rates: &'static [Rate],
    /// Rate used when a descriptor does not pick one.
    pub default_rate: Rate,
}

impl UgenSpec {
    /// Position of a declared input.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.name == name)
    }

    /// Whether the generator can run at `rate`.
    pub fn supports(&self, rate: Rate) -> bool {
        self.rates.contains(&rate)
    }
}

/// Read view over one connected input for the current block.
#[derive(Debug, Clone, Copy)]
pub struct InputSignal<'a> {
    rate: Rate,
    stride: usize,
    channels: &'a [SignalBuffer],
}

const SILENT: &[SignalBuffer] = &[];

impl<'a> InputSignal<'a> {
    /// An unconnected or unavailable input: reads as a held 0.
    pub const fn silent() -> Self {
        Self {
            rate: Rate::Constant,
            stride: 0,
            channels: SILENT,
        }
    }

    /// Sample for output index `i` of channel 0, honouring the stride.
    #[inline]
    pub fn at(&self, i: usize) -> f32 {
        self.channel_at(0, i)
    }

    /// Sample for output index `i` of channel `ch`.
    #[inline]
    pub fn channel_at(&self, ch: usize, i: usize) -> f32 {
        match self.channels.get(ch) {
            Some(buf) => buf.get(i * self.stride).copied().unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// First sample of channel 0: the block value of a control-rate input.
    #[inline]
    pub fn value(&self) -> f32 {
        self.at(0)
    }

    /// Raw samples of channel `ch` (empty when absent).
    pub fn channel(&self, ch: usize) -> &'a [f32] {
        self.channels.get(ch).map_or(&[], |b| b.as_slice())
    }

    /// Number of channels the producer exposes (0 when unconnected).
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Producer rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Stride the consumer reads with.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Whether the input is connected and its producer is live.
    pub fn is_connected(&self) -> bool {
        !self.channels.is_empty()
    }
}

/// The declared inputs of the node being generated.
pub struct Inputs<'a> {
    slots: &'a [InputSlot],
    arena: &'a [Slot],
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(slots: &'a [InputSlot], arena: &'a [Slot]) -> Self {
        Self { slots, arena }
    }

    /// Input at declaration index `index`.
    ///
    /// Unconnected inputs, destroyed producers, and producers still being
    /// evaluated higher up the stack (feedback) all read as silence.
    pub fn get(&self, index: usize) -> InputSignal<'a> {
        let Some(slot) = self.slots.get(index) else {
            return InputSignal::silent();
        };
        slot.id
            .and_then(|id| resolve(self.arena, id))
            .map_or_else(InputSignal::silent, |node| InputSignal {
                rate: node.rate(),
                stride: slot.stride,
                channels: node.outputs(),
            })
    }

    /// Block value (index 0) of input `index`.
    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        self.get(index).value()
    }

    /// Number of declared inputs.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the generator declares no inputs.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Per-block context handed to [`UnitGenerator::generate`].
pub struct GenContext<'a> {
    /// Engine sample rate in Hz.
    pub sample_rate: f32,
    /// Configured block size.
    pub block_size: usize,
    /// Samples this node must produce: the block length for audio-rate
    /// nodes, 1 otherwise.
    pub num_samples: usize,
    /// Index of the block being evaluated.
    pub block: u64,
    /// Shared accumulation buses.
    pub buses: &'a mut Buses,
    /// Named PCM buffers.
    pub buffers: &'a mut BufferStore,
}

/// Everything a constructor needs to build a generator.
pub struct BuildContext<'a> {
    /// The generator's static spec.
    pub spec: &'static UgenSpec,
    /// Rate the node will run at.
    pub rate: Rate,
    /// Generator-specific options.
    pub options: &'a Options,
    /// Engine sample rate in Hz.
    pub sample_rate: f32,
    /// Configured block size.
    pub block_size: usize,
    /// Channel count of the node connected to each declared input.
    pub input_channels: &'a [usize],
}

impl BuildContext<'_> {
    /// Channel count connected to declared input `index` (1 if unknown).
    pub fn channels_of(&self, index: usize) -> usize {
        self.input_channels.get(index).copied().unwrap_or(1)
    }
}

/// A signal-processing algorithm driven by the graph.
///
/// `generate` must not block, perform I/O, or allocate unboundedly, and it
/// must not panic on bad input data.
pub trait UnitGenerator: Send {
    /// Fill `outputs` for `ctx.num_samples` samples.
    ///
    /// Advances internal state; it is never called twice for the same block.
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, outputs: &mut [SignalBuffer]);

    /// Output channel count, fixed for the node's lifetime.
    fn num_outputs(&self) -> usize {
        1
    }

    /// Called after any declared input is replaced, with the producer rate of
    /// each declared input (`Constant` for unconnected ones).
    fn on_input_changed(&mut self, _rates: &[Rate]) {}

    /// Whether the output just generated is final. A constant-rate node whose
    /// generator returns false is generated again on the next block.
    fn is_settled(&self) -> bool {
        true
    }

    /// Sample-accurate trigger at `offset` within the next block.
    ///
    /// Returns false if the generator does not respond to triggers.
    fn trigger_at(&mut self, _offset: usize) -> bool {
        false
    }

    /// Replace the generator's value in place. Returns false if unsupported
    /// or if `value` has the wrong shape.
    fn set_value(&mut self, _value: &[f32]) -> bool {
        false
    }

    /// Release anything registered outside the node.
    fn destroy(&mut self) {}
}
