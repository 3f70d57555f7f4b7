//! Node handles and node state.

use core::fmt;

use crate::buffer::SignalBuffer;
use crate::mul_add::{MulAdd, UNITY, ZERO};
use crate::rate::Rate;
use crate::ugen::{ADD, GenContext, Inputs, MUL, UgenSpec, UnitGenerator};

/// Stable handle to a node in a [`Graph`](crate::Graph).
///
/// Handles are generational: once a node is destroyed its handle never
/// resolves again, even after the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// One input connection plus the stride derived from the producer's rate.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InputSlot {
    pub(crate) id: Option<NodeId>,
    pub(crate) stride: usize,
}

/// Arena slot. `node` is `None` while free or while the node is being
/// evaluated.
pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) node: Option<Node>,
}

/// Resolve a handle against the arena.
#[inline]
pub(crate) fn resolve(arena: &[Slot], id: NodeId) -> Option<&Node> {
    arena
        .get(id.index as usize)
        .filter(|slot| slot.generation == id.generation)
        .and_then(|slot| slot.node.as_ref())
}

/// A live unit-generator node.
pub struct Node {
    pub(crate) name: Option<String>,
    pub(crate) spec: &'static UgenSpec,
    pub(crate) rate: Rate,
    pub(crate) ugen: Box<dyn UnitGenerator>,
    pub(crate) inputs: Vec<InputSlot>,
    pub(crate) mul: InputSlot,
    pub(crate) add: InputSlot,
    pub(crate) mul_add: MulAdd,
    pub(crate) outputs: Vec<SignalBuffer>,
    pub(crate) last_block: Option<u64>,
    pub(crate) dirty: bool,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("ugen", &self.spec.id)
            .field("name", &self.name)
            .field("rate", &self.rate)
            .field("channels", &self.outputs.len())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub(crate) fn new(
        spec: &'static UgenSpec,
        rate: Rate,
        name: Option<String>,
        ugen: Box<dyn UnitGenerator>,
        block_size: usize,
    ) -> Self {
        let channels = ugen.num_outputs().max(1);
        Self {
            name,
            spec,
            rate,
            ugen,
            inputs: vec![InputSlot::default(); spec.inputs.len()],
            mul: InputSlot::default(),
            add: InputSlot::default(),
            mul_add: MulAdd::Identity,
            outputs: (0..channels)
                .map(|_| SignalBuffer::new(rate.buffer_len(block_size)))
                .collect(),
            last_block: None,
            dirty: true,
        }
    }

    /// Optional lookup name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Generator type identifier.
    pub fn ugen_id(&self) -> &'static str {
        self.spec.id
    }

    /// Generator spec.
    pub fn spec(&self) -> &'static UgenSpec {
        self.spec
    }

    /// Node rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Output channel count.
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Output buffers, one per channel.
    pub fn outputs(&self) -> &[SignalBuffer] {
        &self.outputs
    }

    /// Samples of output channel `ch`.
    pub fn output(&self, ch: usize) -> Option<&[f32]> {
        self.outputs.get(ch).map(|b| b.as_slice())
    }

    /// The node connected to input `name` (declared, `mul` or `add`).
    pub fn input(&self, name: &str) -> Option<NodeId> {
        self.slot(name).and_then(|s| s.id)
    }

    /// Names of inputs that currently have a connection.
    pub fn connected_inputs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.spec
            .inputs
            .iter()
            .zip(&self.inputs)
            .filter(|(_, slot)| slot.id.is_some())
            .map(|(spec, _)| spec.name)
            .chain(self.mul.id.map(|_| MUL))
            .chain(self.add.id.map(|_| ADD))
    }

    /// Every connected input node, declared inputs first, then `mul`, `add`.
    pub fn input_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs
            .iter()
            .chain([&self.mul, &self.add])
            .filter_map(|s| s.id)
    }

    pub(crate) fn slot(&self, name: &str) -> Option<&InputSlot> {
        match name {
            MUL => Some(&self.mul),
            ADD => Some(&self.add),
            _ => self.spec.input_index(name).map(|i| &self.inputs[i]),
        }
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut InputSlot> {
        match name {
            MUL => Some(&mut self.mul),
            ADD => Some(&mut self.add),
            _ => self.spec.input_index(name).map(|i| &mut self.inputs[i]),
        }
    }

    /// Whether the node already has output for `block`.
    pub(crate) fn is_current(&self, block: u64) -> bool {
        match self.rate {
            Rate::Constant => !self.dirty || self.last_block == Some(block),
            _ => self.last_block == Some(block),
        }
    }

    /// Recompute strides and the mul/add strategy, then notify the generator.
    pub(crate) fn refresh_inputs(&mut self, arena: &[Slot]) {
        let producer_rate = |slot: &InputSlot| slot.id.and_then(|id| resolve(arena, id)).map(Node::rate);
        let audio = self.rate.is_audio();
        let mut rates = Vec::with_capacity(self.inputs.len());
        for slot in &mut self.inputs {
            let rate = producer_rate(slot);
            slot.stride = stride_for(audio, rate);
            rates.push(rate.unwrap_or(Rate::Constant));
        }
        let mul_rate = producer_rate(&self.mul);
        let add_rate = producer_rate(&self.add);
        self.mul.stride = stride_for(audio, mul_rate);
        self.add.stride = stride_for(audio, add_rate);
        self.mul_add = MulAdd::select(self.rate, mul_rate, add_rate);
        self.ugen.on_input_changed(&rates);
        self.dirty = true;
    }

    /// Run the generator and post-processing for one block.
    pub(crate) fn run(&mut self, arena: &[Slot], ctx: &mut GenContext<'_>, block: u64) {
        let n = if self.rate.is_audio() {
            ctx.num_samples.min(ctx.block_size).max(1)
        } else {
            1
        };
        let requested = ctx.num_samples;
        ctx.num_samples = n;
        {
            let inputs = Inputs::new(&self.inputs, arena);
            self.ugen.generate(ctx, &inputs, &mut self.outputs);
        }
        ctx.num_samples = requested;

        if self.mul_add != MulAdd::Identity {
            let mul = self.post_input(arena, self.mul, &UNITY);
            let add = self.post_input(arena, self.add, &ZERO);
            for out in &mut self.outputs {
                self.mul_add.apply(&mut out[..n], mul, add);
            }
        }

        for out in &mut self.outputs {
            if out.sanitize() {
                out.fill(0.0);
            }
        }

        self.last_block = Some(block);
        self.dirty = !self.ugen.is_settled();
    }

    fn post_input<'a>(&self, arena: &'a [Slot], slot: InputSlot, fallback: &'a [f32]) -> &'a [f32] {
        slot.id
            .and_then(|id| resolve(arena, id))
            .and_then(|node| node.output(0))
            .unwrap_or(fallback)
    }
}

/// Audio consumers follow the producer's stride; everything else holds index 0.
#[inline]
fn stride_for(consumer_is_audio: bool, producer: Option<Rate>) -> usize {
    match producer {
        Some(rate) if consumer_is_audio => rate.stride(),
        _ => 0,
    }
}
