//! The evaluation loop and the public face of the engine.
//!
//! An [`Environment`] owns the node arena, the ordered [`NodeList`], the
//! [`Scheduler`], the bus set, and the named sample buffers. It is passed
//! explicitly to everything that needs it; there is no process-wide default.
//!
//! # Block evaluation
//!
//! [`Environment::generate`] runs one block:
//!
//! 1. fire scheduled actions due within the block (callbacks get `&mut self`
//!    and may mutate the graph; they run before any node is evaluated)
//! 2. clear every bus
//! 3. evaluate each node-list entry in order; each pulls its inputs first
//! 4. advance the sample clock
//!
//! Structural mutation needs `&mut self`, so it can only happen between
//! blocks or from scheduled callbacks at a block boundary, never while a
//! node is generating.
//!
//! # Node lifetime
//!
//! [`Environment::build`] creates nodes that are not yet live. Inserting a
//! tree makes it live. Removing, swapping, or replacing a tree destroys every
//! removed node that is no longer in the node list and no longer an input of
//! any other node.

use crate::buffer::{BufferStore, SampleBuffer, SignalBuffer};
use crate::bus::{BusAllocator, Buses};
use crate::config::EnvironmentConfig;
use crate::descriptor::{InputDef, NodeDescriptor};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::node_list::{NodeList, Position, subtree};
use crate::registry::UgenRegistry;
use crate::scheduler::{Fire, HasScheduler, ScheduleHandle, Scheduler, TimeConverter, TimeUnit};
use crate::ugen::GenContext;

/// Transport state of an environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayState {
    /// Not rendering; graph state retained.
    #[default]
    Stopped,
    /// [`Environment::render`] produces audio.
    Playing,
    /// Same mechanics as stopped, different intent.
    Paused,
}

/// The engine: graph, node list, scheduler, buses, and buffers.
pub struct Environment {
    config: EnvironmentConfig,
    registry: UgenRegistry,
    graph: Graph,
    nodes: NodeList,
    scheduler: Scheduler<Environment>,
    buses: Buses,
    bus_allocator: BusAllocator,
    buffers: BufferStore,
    state: PlayState,
    block: u64,
    tempo: f64,
    /// Set by `reset`; lets `generate` drop a block reset by a callback.
    was_reset: bool,
}

impl HasScheduler for Environment {
    fn scheduler(&mut self) -> &mut Scheduler<Environment> {
        &mut self.scheduler
    }
}

impl Environment {
    /// Default tempo in beats per minute.
    pub const DEFAULT_TEMPO: f64 = 120.0;

    /// Create an environment. Fails if the configuration is invalid.
    pub fn new(config: EnvironmentConfig, registry: UgenRegistry) -> Result<Self> {
        config.validate()?;
        let buses = Buses::new(
            config.num_buses,
            config.block_size,
            config.num_channels,
            config.num_input_buses,
        );
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "environment: {} Hz, block {}, {} channels, {} buses, {} ugen types",
            config.sample_rate,
            config.block_size,
            config.num_channels,
            config.num_buses,
            registry.len()
        );
        Ok(Self {
            graph: Graph::new(config.sample_rate, config.block_size),
            nodes: NodeList::new(),
            scheduler: Scheduler::new(f64::from(config.sample_rate)),
            bus_allocator: BusAllocator::new(buses.first_interconnect_bus(), buses.len()),
            buses,
            buffers: BufferStore::new(),
            state: PlayState::Stopped,
            block: 0,
            tempo: Self::DEFAULT_TEMPO,
            was_reset: false,
            config,
            registry,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// The generator registry.
    pub fn registry(&self) -> &UgenRegistry {
        &self.registry
    }

    /// The node arena.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The ordered node list.
    pub fn node_list(&self) -> &NodeList {
        &self.nodes
    }

    /// Transport state.
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Whether [`render`](Self::render) produces audio.
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Number of blocks generated since creation or the last reset.
    pub fn blocks_generated(&self) -> u64 {
        self.block
    }

    /// Current time in samples.
    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    // ------------------------------------------------------------------------
    // Graph construction and membership
    // ------------------------------------------------------------------------

    /// Build a node tree without making it live.
    pub fn build(&mut self, desc: &NodeDescriptor) -> Result<NodeId> {
        self.graph.build(desc, &self.registry)
    }

    /// Build a node tree and insert it at `position`.
    pub fn add(&mut self, desc: &NodeDescriptor, position: Position) -> Result<NodeId> {
        let id = self.build(desc)?;
        if let Err(err) = self.nodes.insert_tree(&self.graph, id, position) {
            self.release_tree(id);
            return Err(err);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("node_list_add: {} {id} at {position:?}", desc.ugen);
        Ok(id)
    }

    /// Add a tree at the tail and start playing.
    pub fn play(&mut self, desc: &NodeDescriptor) -> Result<NodeId> {
        let id = self.add(desc, Position::Tail)?;
        self.start();
        Ok(id)
    }

    /// Insert a single built node. Returns its index.
    pub fn insert(&mut self, id: NodeId, position: Position) -> Result<usize> {
        self.require(id)?;
        self.nodes.insert(&self.graph, id, position)
    }

    /// Insert a built node and its input tree. Returns the root's index.
    pub fn insert_tree(&mut self, id: NodeId, position: Position) -> Result<usize> {
        self.require(id)?;
        self.nodes.insert_tree(&self.graph, id, position)
    }

    /// Remove one occurrence of a node (its inputs stay live).
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.nodes.remove(&self.graph, id) {
            return false;
        }
        self.release(vec![id]);
        true
    }

    /// Remove a node and its input tree.
    pub fn remove_tree(&mut self, id: NodeId) -> bool {
        let removed = self.nodes.remove_tree(&self.graph, id);
        if removed.is_empty() {
            return false;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("node_list_remove_tree: {id} ({} entries)", removed.len());
        self.release(removed);
        true
    }

    /// Replace live node `old` with built node `new` at `old`'s position,
    /// moving the inputs named in `preserve` from `old` onto `new`.
    ///
    /// Consumers of `old` are rewired to `new`. `old`'s remaining subtree is
    /// removed and `new`'s subtree is inserted in its place.
    pub fn swap_tree(&mut self, new: NodeId, old: NodeId, preserve: &[&str]) -> Result<()> {
        self.check_swap(new, old)?;
        let carried: Vec<(&str, NodeId)> = preserve
            .iter()
            .filter_map(|&name| self.graph.input(old, name).map(|input| (name, input)))
            .collect();
        for &(name, input) in &carried {
            self.graph.check_input(new, name, input)?;
        }
        self.graph.replace_references(old, new)?;

        let mut displaced = Vec::new();
        for &(name, input) in &carried {
            if let Some(previous) = self.graph.set_input(new, name, Some(input))? {
                displaced.push(previous);
            }
            self.graph.set_input(old, name, None)?;
        }
        let carried_ids: Vec<NodeId> = carried.iter().map(|&(_, id)| id).collect();
        let removed = self.nodes.swap_tree(&self.graph, new, old, &carried_ids)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("node_list_swap: {old} -> {new}, carried {preserve:?}");
        self.release(removed);
        for previous in displaced {
            self.release_tree(previous);
        }
        Ok(())
    }

    /// Remove `old`'s entire tree and insert `new`'s entire tree at the same
    /// position. Consumers of `old` are rewired to `new`.
    pub fn replace_tree(&mut self, new: NodeId, old: NodeId) -> Result<()> {
        self.check_swap(new, old)?;
        self.graph.replace_references(old, new)?;
        let removed = self.nodes.replace_tree(&self.graph, new, old)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("node_list_replace: {old} -> {new}");
        self.release(removed);
        Ok(())
    }

    /// Empty the node list and destroy every node.
    pub fn clear_all(&mut self) {
        self.nodes.clear_all();
        self.graph.clear();
        #[cfg(feature = "tracing")]
        tracing::debug!("node_list_clear_all");
    }

    /// Destroy a built node tree that was never made live. Nodes that are
    /// live or still referenced elsewhere survive.
    pub fn destroy_tree(&mut self, id: NodeId) {
        self.release_tree(id);
    }

    fn require(&self, id: NodeId) -> Result<()> {
        if self.graph.contains(id) {
            Ok(())
        } else {
            Err(Error::NodeNotFound(id))
        }
    }

    fn check_swap(&self, new: NodeId, old: NodeId) -> Result<()> {
        self.require(new)?;
        self.require(old)?;
        if self.nodes.contains(new) {
            return Err(Error::AlreadyLive(new));
        }
        if !self.nodes.contains(old) {
            return Err(Error::PositionNotFound(old));
        }
        Ok(())
    }

    /// Destroy removed nodes that are neither listed nor referenced.
    /// `removed` is leaves-first; consumers are considered before inputs.
    fn release(&mut self, removed: Vec<NodeId>) {
        for id in removed.into_iter().rev() {
            if !self.nodes.contains(id) && !self.graph.is_referenced(id) {
                self.graph.destroy(id);
            }
        }
    }

    fn release_tree(&mut self, id: NodeId) {
        let tree = subtree(&self.graph, id);
        self.release(tree);
    }

    // ------------------------------------------------------------------------
    // Inputs and lookup
    // ------------------------------------------------------------------------

    /// Replace input `name` of node `id`.
    ///
    /// A scalar or array assigned over an existing `value` node of the same
    /// shape updates it in place. Otherwise the new input is built, inserted
    /// before the consumer if the consumer is live, and the previous input
    /// tree is removed and destroyed once nothing references it.
    pub fn set_input(&mut self, id: NodeId, name: &str, value: impl Into<InputDef>) -> Result<()> {
        let value = value.into();
        self.require(id)?;

        if let Some(current) = self.graph.input(id, name) {
            let updated = match &value {
                InputDef::Scalar(v) => self.graph.set_value(current, &[*v]),
                InputDef::Array(values) => self.graph.set_value(current, values),
                _ => false,
            };
            if updated {
                return Ok(());
            }
        }

        let input = self.graph.build_input(&value, &self.registry)?;
        let previous = match self.graph.set_input(id, name, Some(input)) {
            Ok(previous) => previous,
            Err(err) => {
                if !matches!(value, InputDef::Existing(_)) {
                    self.release_tree(input);
                }
                return Err(err);
            }
        };

        if self.nodes.contains(id) {
            self.nodes.insert_tree(&self.graph, input, Position::Before(id))?;
            if let Some(previous) = previous {
                let removed = self.nodes.remove_tree(&self.graph, previous);
                self.release(removed);
                self.release_tree(previous);
            }
        } else if let Some(previous) = previous {
            self.release_tree(previous);
        }
        Ok(())
    }

    /// The node connected to input `name` of `id`.
    pub fn get_input(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.graph.input(id, name)
    }

    /// Live node registered under `name` (most recent wins).
    pub fn get_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.get(name)
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    /// Output buffers of a node, one per channel.
    pub fn output(&self, id: NodeId) -> Option<&[SignalBuffer]> {
        self.graph.outputs(id)
    }

    /// Replace a `value` node's contents in place.
    pub fn set_value(&mut self, id: NodeId, value: &[f32]) -> bool {
        self.graph.set_value(id, value)
    }

    /// Trigger a node at `offset` samples into the next block.
    pub fn trigger_at(&mut self, id: NodeId, offset: usize) -> bool {
        self.graph.trigger_at(id, offset)
    }

    // ------------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------------

    /// The scheduler.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler<Environment> {
        &mut self.scheduler
    }

    /// Run `callback` once, `delay` from now.
    pub fn once<F>(&mut self, delay: f64, unit: impl TimeConverter, callback: F) -> ScheduleHandle
    where
        F: FnMut(&mut Environment, Fire) + Send + 'static,
    {
        self.scheduler.once(delay, unit, callback)
    }

    /// Run `callback` once, `beats` from now at the current tempo.
    pub fn once_beats<F>(&mut self, beats: f64, callback: F) -> ScheduleHandle
    where
        F: FnMut(&mut Environment, Fire) + Send + 'static,
    {
        let unit = TimeUnit::Beats { bpm: self.tempo };
        self.scheduler.once(beats, unit, callback)
    }

    /// Run `callback` every `interval`.
    pub fn repeat<F>(&mut self, interval: f64, unit: impl TimeConverter, callback: F) -> ScheduleHandle
    where
        F: FnMut(&mut Environment, Fire) + Send + 'static,
    {
        self.scheduler.repeat(interval, unit, callback)
    }

    /// Run `callback` every `beats` at the current tempo.
    pub fn repeat_beats<F>(&mut self, beats: f64, callback: F) -> ScheduleHandle
    where
        F: FnMut(&mut Environment, Fire) + Send + 'static,
    {
        let unit = TimeUnit::Beats { bpm: self.tempo };
        self.scheduler.repeat(beats, unit, callback)
    }

    /// Cancel a scheduled action.
    pub fn clear(&mut self, handle: ScheduleHandle) -> bool {
        self.scheduler.clear(handle)
    }

    /// Cancel every repeating action with this interval.
    pub fn clear_repeat(&mut self, interval: f64, unit: impl TimeConverter) -> usize {
        self.scheduler.clear_repeat(interval, unit)
    }

    /// Cancel every scheduled action.
    pub fn clear_schedule(&mut self) {
        self.scheduler.clear_all();
    }

    /// Tempo in beats per minute.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Set the tempo used by the `*_beats` helpers. Negative or non-finite
    /// values are stored as 0 (beat durations then convert to 0 samples).
    pub fn set_tempo(&mut self, bpm: f64) {
        self.tempo = if bpm.is_finite() && bpm > 0.0 { bpm } else { 0.0 };
    }

    // ------------------------------------------------------------------------
    // Buses and buffers
    // ------------------------------------------------------------------------

    /// Allocate the next free interconnect bus.
    pub fn acquire_next_bus(&mut self) -> Result<usize> {
        let bus = self.bus_allocator.acquire()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("bus_acquire: {bus}");
        Ok(bus)
    }

    /// The bus set.
    pub fn buses(&self) -> &Buses {
        &self.buses
    }

    /// Read one bus.
    pub fn bus(&self, bus: usize) -> Option<&[f32]> {
        self.buses.read(bus)
    }

    /// Store a PCM buffer under `name`.
    pub fn set_buffer(&mut self, name: impl Into<String>, buffer: SampleBuffer) -> Option<SampleBuffer> {
        self.buffers.insert(name, buffer)
    }

    /// Look up a PCM buffer.
    pub fn buffer(&self, name: &str) -> Option<&SampleBuffer> {
        self.buffers.get(name)
    }

    /// Remove a PCM buffer.
    pub fn remove_buffer(&mut self, name: &str) -> Option<SampleBuffer> {
        self.buffers.remove(name)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Start rendering.
    pub fn start(&mut self) {
        self.transition(PlayState::Playing);
    }

    /// Stop rendering; the graph is kept.
    pub fn stop(&mut self) {
        self.transition(PlayState::Stopped);
    }

    /// Pause rendering; identical to [`stop`](Self::stop) mechanically.
    pub fn pause(&mut self) {
        self.transition(PlayState::Paused);
    }

    fn transition(&mut self, state: PlayState) {
        #[cfg(feature = "tracing")]
        if self.state != state {
            tracing::debug!("environment: {:?} -> {state:?}", self.state);
        }
        self.state = state;
    }

    /// Stop, clear the node list, destroy every node, cancel scheduled
    /// actions, and recreate the buses. Sample buffers are kept.
    pub fn reset(&mut self) {
        self.stop();
        self.clear_all();
        self.scheduler.reset();
        self.buses = Buses::new(
            self.config.num_buses,
            self.config.block_size,
            self.config.num_channels,
            self.config.num_input_buses,
        );
        self.bus_allocator.reset();
        self.block = 0;
        self.was_reset = true;
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Evaluate one block of up to `block_size` samples. Returns the number
    /// of samples generated.
    ///
    /// A callback that calls [`reset`](Self::reset) abandons the block: the
    /// buses stay silent, the clock stays at 0, and 0 is returned.
    pub fn generate(&mut self, num_samples: usize) -> usize {
        let n = num_samples.min(self.config.block_size);
        if n == 0 {
            return 0;
        }
        self.was_reset = false;
        Scheduler::run_due(self, n);
        if self.was_reset {
            self.buses.clear();
            return 0;
        }

        self.buses.clear();
        self.block += 1;
        let block = self.block;
        let mut ctx = GenContext {
            sample_rate: self.config.sample_rate,
            block_size: self.config.block_size,
            num_samples: n,
            block,
            buses: &mut self.buses,
            buffers: &mut self.buffers,
        };
        for id in self.nodes.iter() {
            self.graph.evaluate(id, &mut ctx, block);
        }
        self.scheduler.advance(n);
        n
    }

    /// Fill `out` with interleaved frames from the output buses.
    ///
    /// Writes silence and leaves time frozen unless playing. A callback that
    /// stops playback takes effect after the block it fires in. Returns the
    /// number of frames rendered.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        let channels = self.config.num_channels;
        let frames = out.len() / channels;
        let mut done = 0;
        while done < frames && self.is_playing() {
            let n = self.generate((frames - done).min(self.config.block_size));
            if n == 0 {
                break;
            }
            for frame in 0..n {
                let base = (done + frame) * channels;
                for (ch, sample) in out[base..base + channels].iter_mut().enumerate() {
                    *sample = self.buses.read(ch).map_or(0.0, |bus| bus[frame]);
                }
            }
            done += n;
        }
        out[done * channels..].fill(0.0);
        done
    }
}
