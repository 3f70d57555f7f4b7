//! Node arena and recursive block evaluation.
//!
//! [`Graph`] owns every node, live or merely built, in slots addressed by
//! generational [`NodeId`]s. Destroyed slots go on a free list and are reused
//! with a bumped generation, so stale handles resolve to nothing instead of to
//! a stranger.
//!
//! # Evaluation
//!
//! [`Graph::evaluate`] pulls a node for the current block: it evaluates the
//! node's inputs first (depth-first), then runs the node's generator,
//! `mul`/`add` post-processing, and non-finite sanitizing. Each node records
//! the last block it generated, so an input shared by several consumers is
//! computed once per block. Constant-rate nodes generate once and again only
//! after their value changes.
//!
//! While a node is being evaluated it is taken out of its slot. A consumer
//! that reaches it through a feedback cycle therefore reads silence for that
//! block instead of recursing forever.

use crate::buffer::SignalBuffer;
use crate::descriptor::{InputDef, NodeDescriptor};
use crate::error::{Error, Result};
use crate::node::{Node, NodeId, Slot, resolve};
use crate::node_list::NodeTree;
use crate::rate::Rate;
use crate::registry::UgenRegistry;
use crate::ugen::{ADD, BuildContext, GenContext, MUL, UgenSpec};
use crate::value::{VALUE_SPEC, Value};

/// Arena of nodes.
pub struct Graph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    sample_rate: f32,
    block_size: usize,
}

impl Graph {
    /// Create an empty arena for nodes at `sample_rate` with `block_size`
    /// sample audio buffers.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            sample_rate,
            block_size: block_size.max(1),
        }
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Whether `id` refers to a node in the arena.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        resolve(&self.slots, id)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    /// Handles of every node in the arena.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.node
                .as_ref()
                .map(|_| NodeId::new(i as u32, slot.generation))
        })
    }

    /// Output buffers of a node.
    pub fn outputs(&self, id: NodeId) -> Option<&[SignalBuffer]> {
        self.node(id).map(Node::outputs)
    }

    /// The node connected to input `name` of `id`.
    pub fn input(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id).and_then(|n| n.input(name))
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Build a node and its input tree from a descriptor.
    ///
    /// Scalars become constant `value` nodes, arrays become multi-channel
    /// `value` nodes, omitted inputs take their declared defaults. On error
    /// every node created along the way is destroyed again.
    pub fn build(&mut self, desc: &NodeDescriptor, registry: &UgenRegistry) -> Result<NodeId> {
        let mut created = Vec::new();
        self.build_into(desc, registry, &mut created)
            .inspect_err(|_| self.rollback(created))
    }

    /// Build (or validate) the node an input assignment refers to.
    pub fn build_input(&mut self, def: &InputDef, registry: &UgenRegistry) -> Result<NodeId> {
        let mut created = Vec::new();
        self.build_input_into(def, registry, &mut created)
            .inspect_err(|_| self.rollback(created))
    }

    fn rollback(&mut self, created: Vec<NodeId>) {
        for id in created.into_iter().rev() {
            self.destroy(id);
        }
    }

    fn build_input_into(
        &mut self,
        def: &InputDef,
        registry: &UgenRegistry,
        created: &mut Vec<NodeId>,
    ) -> Result<NodeId> {
        match def {
            InputDef::Scalar(v) => Ok(self.add_value(vec![*v], created)),
            InputDef::Array(values) => Ok(self.add_value(values.clone(), created)),
            InputDef::Node(desc) => self.build_into(desc, registry, created),
            InputDef::Existing(id) => {
                if self.contains(*id) {
                    Ok(*id)
                } else {
                    Err(Error::NodeNotFound(*id))
                }
            }
        }
    }

    fn add_value(&mut self, values: Vec<f32>, created: &mut Vec<NodeId>) -> NodeId {
        let node = Node::new(
            &VALUE_SPEC,
            Rate::Constant,
            None,
            Box::new(Value::new(values)),
            self.block_size,
        );
        let id = self.insert(node);
        created.push(id);
        id
    }

    fn build_into(
        &mut self,
        desc: &NodeDescriptor,
        registry: &UgenRegistry,
        created: &mut Vec<NodeId>,
    ) -> Result<NodeId> {
        let spec = registry
            .spec(&desc.ugen)
            .ok_or_else(|| Error::UnknownUgen(desc.ugen.clone()))?;
        let rate = desc.rate.unwrap_or(spec.default_rate);
        if !spec.supports(rate) {
            return Err(Error::UnsupportedRate {
                ugen: spec.id.to_string(),
                rate,
            });
        }
        if let Some((name, _)) = desc
            .inputs
            .iter()
            .find(|(name, _)| max_channels(spec, name).is_none())
        {
            return Err(Error::UnknownInput {
                ugen: spec.id.to_string(),
                input: name.clone(),
            });
        }

        let mut connected = Vec::with_capacity(spec.inputs.len());
        let mut channels = Vec::with_capacity(spec.inputs.len());
        for input in spec.inputs {
            let id = match (desc.get_input(input.name), input.default) {
                (Some(def), _) => self.build_input_into(def, registry, created)?,
                (None, Some(default)) => self.add_value(vec![default], created),
                (None, None) => {
                    return Err(Error::MissingInput {
                        ugen: spec.id.to_string(),
                        input: input.name.to_string(),
                    });
                }
            };
            channels.push(self.check_channels(spec, input.name, id)?);
            connected.push(id);
        }

        let mut post = [None, None];
        for (slot, name) in post.iter_mut().zip([MUL, ADD]) {
            if let Some(def) = desc.get_input(name) {
                let id = self.build_input_into(def, registry, created)?;
                self.check_channels(spec, name, id)?;
                *slot = Some(id);
            }
        }

        let ugen = registry.build(
            spec.id,
            &BuildContext {
                spec,
                rate,
                options: &desc.options,
                sample_rate: self.sample_rate,
                block_size: self.block_size,
                input_channels: &channels,
            },
        )?;

        let mut node = Node::new(spec, rate, desc.name.clone(), ugen, self.block_size);
        for (slot, id) in node.inputs.iter_mut().zip(connected) {
            slot.id = Some(id);
        }
        node.mul.id = post[0];
        node.add.id = post[1];
        node.refresh_inputs(&self.slots);

        let id = self.insert(node);
        created.push(id);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_build: {} node {id} at {rate} rate", spec.id);
        Ok(id)
    }

    fn check_channels(&self, spec: &UgenSpec, name: &str, input: NodeId) -> Result<usize> {
        let found = self
            .node(input)
            .map(Node::num_outputs)
            .ok_or(Error::NodeNotFound(input))?;
        let max = max_channels(spec, name).ok_or_else(|| Error::UnknownInput {
            ugen: spec.id.to_string(),
            input: name.to_string(),
        })?;
        if found > max {
            return Err(Error::ChannelMismatch {
                ugen: spec.id.to_string(),
                input: name.to_string(),
                max,
                found,
            });
        }
        Ok(found)
    }

    fn insert(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId::new(index, 0)
        }
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Destroy a node, running its destroy hook. Returns false for stale ids.
    ///
    /// Consumers still pointing at the node read silence from then on.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
        else {
            return false;
        };
        let Some(mut node) = slot.node.take() else {
            return false;
        };
        node.ugen.destroy();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_destroy: {} node {id}", node.spec.id);
        true
    }

    /// Destroy every node.
    pub fn clear(&mut self) {
        let ids: Vec<NodeId> = self.ids().collect();
        for id in ids {
            self.destroy(id);
        }
    }

    /// Validate connecting `input` to input `name` of `id`.
    pub fn check_input(&self, id: NodeId, name: &str, input: NodeId) -> Result<()> {
        let node = self.node(id).ok_or(Error::NodeNotFound(id))?;
        self.check_channels(node.spec, name, input).map(|_| ())
    }

    /// Connect `input` (or nothing) to input `name` of `id`, returning the
    /// previous connection.
    ///
    /// Recomputes strides and the `mul`/`add` strategy and notifies the
    /// generator.
    pub fn set_input(&mut self, id: NodeId, name: &str, input: Option<NodeId>) -> Result<Option<NodeId>> {
        match input {
            Some(input) => self.check_input(id, name, input)?,
            None => {
                let node = self.node(id).ok_or(Error::NodeNotFound(id))?;
                max_channels(node.spec, name).ok_or_else(|| Error::UnknownInput {
                    ugen: node.spec.id.to_string(),
                    input: name.to_string(),
                })?;
            }
        }
        let index = id.index() as usize;
        let Some(mut node) = self.slots[index].node.take() else {
            return Err(Error::NodeNotFound(id));
        };
        let previous = match node.slot_mut(name) {
            Some(slot) => core::mem::replace(&mut slot.id, input),
            None => None,
        };
        node.refresh_inputs(&self.slots);
        self.slots[index].node = Some(node);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_set_input: {id}.{name} = {input:?} (was {previous:?})");
        Ok(previous)
    }

    /// Point every consumer of `old` at `new` instead. Returns the number of
    /// rewired connections.
    pub fn replace_references(&mut self, old: NodeId, new: NodeId) -> Result<usize> {
        let mut rewires = Vec::new();
        for consumer in self.ids() {
            let Some(node) = self.node(consumer) else {
                continue;
            };
            for name in node.connected_inputs() {
                if node.input(name) == Some(old) {
                    rewires.push((consumer, name));
                }
            }
        }
        for &(consumer, name) in &rewires {
            if consumer != new {
                self.check_input(consumer, name, new)?;
            }
        }
        let mut count = 0;
        for (consumer, name) in rewires {
            if consumer != new {
                self.set_input(consumer, name, Some(new))?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Whether any node in the arena has `id` as an input.
    pub fn is_referenced(&self, id: NodeId) -> bool {
        self.slots
            .iter()
            .filter_map(|slot| slot.node.as_ref())
            .any(|node| node.input_ids().any(|input| input == id))
    }

    /// Replace a node's value in place (for `value` nodes). Returns false if
    /// the generator rejects it.
    pub fn set_value(&mut self, id: NodeId, value: &[f32]) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                let accepted = node.ugen.set_value(value);
                if accepted {
                    node.dirty = true;
                }
                accepted
            }
            None => false,
        }
    }

    /// Forward a sample-accurate trigger to a node's generator.
    pub fn trigger_at(&mut self, id: NodeId, offset: usize) -> bool {
        self.node_mut(id).is_some_and(|node| node.ugen.trigger_at(offset))
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Evaluate `id` (and, first, its inputs) for `block`.
    ///
    /// Nodes already current for this block, stale handles, and nodes
    /// currently on the evaluation stack are skipped.
    pub fn evaluate(&mut self, id: NodeId, ctx: &mut GenContext<'_>, block: u64) {
        let index = id.index() as usize;
        let Some(slot) = self
            .slots
            .get_mut(index)
            .filter(|slot| slot.generation == id.generation())
        else {
            return;
        };
        if slot.node.as_ref().is_none_or(|node| node.is_current(block)) {
            return;
        }
        let Some(mut node) = slot.node.take() else {
            return;
        };
        for input in node.input_ids() {
            self.evaluate(input, ctx, block);
        }
        node.run(&self.slots, ctx, block);
        self.slots[index].node = Some(node);
    }
}

impl NodeTree for Graph {
    fn node_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(Node::name)
    }

    fn input_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.input_ids().collect())
            .unwrap_or_default()
    }
}

/// Channel limit of input `name`, or `None` if the generator lacks it.
fn max_channels(spec: &UgenSpec, name: &str) -> Option<usize> {
    match name {
        MUL | ADD => Some(1),
        _ => spec
            .input_index(name)
            .map(|i| spec.inputs[i].max_channels),
    }
}
