//! Sample-buffer players, readers, and writers.
//!
//! Buffers live in the environment's [`sonant_core::BufferStore`] and are
//! looked up by name on every block, so a buffer supplied after the node was
//! built (or replaced while it plays) is picked up at the next block.

use libm::roundf;
use sonant_core::{
    BuildContext, Error, GenContext, InputSpec, Inputs, Interpolation, Rate, Result, SampleBuffer, SignalBuffer,
    UgenCategory, UgenDescriptor, UgenRegistry, UgenSpec, UnitGenerator, finite_or,
};

use crate::options::{self, Edge};

/// Spec for `playBuffer`.
pub static PLAY_BUFFER_SPEC: UgenSpec = UgenSpec {
    id: "playBuffer",
    inputs: &[
        InputSpec::new("speed", 1.0),
        InputSpec::new("loop", 0.0),
        InputSpec::new("trigger", 1.0),
        InputSpec::new("start", 0.0),
        InputSpec::new("end", 1.0),
    ],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

/// Spec for `readBuffer`.
pub static READ_BUFFER_SPEC: UgenSpec = UgenSpec {
    id: "readBuffer",
    inputs: &[InputSpec::new("phase", 0.0)],
    rates: &[Rate::Audio, Rate::Control],
    default_rate: Rate::Audio,
};

/// Spec for `writeBuffer`.
pub static WRITE_BUFFER_SPEC: UgenSpec = UgenSpec {
    id: "writeBuffer",
    inputs: &[
        InputSpec::multi("sources"),
        InputSpec::new("start", 0.0),
        InputSpec::new("loop", 0.0),
    ],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

const METADATA_RATES: &[Rate] = &[Rate::Control, Rate::Constant];

/// Spec for `bufferDuration`.
pub static BUFFER_DURATION_SPEC: UgenSpec = UgenSpec {
    id: "bufferDuration",
    inputs: &[],
    rates: METADATA_RATES,
    default_rate: Rate::Control,
};

/// Spec for `bufferLength`.
pub static BUFFER_LENGTH_SPEC: UgenSpec = UgenSpec {
    id: "bufferLength",
    inputs: &[],
    rates: METADATA_RATES,
    default_rate: Rate::Control,
};

/// Warns once per node about a missing buffer.
#[derive(Debug, Clone, Default)]
struct MissingBuffer {
    warned: bool,
}

impl MissingBuffer {
    fn warn(&mut self, ugen: &str, name: &str) {
        if !self.warned {
            self.warned = true;
            tracing::warn!(ugen, buffer = name, "buffer not found, outputting silence");
        }
    }
}

// ---------------------------------------------------------------------------
// PlayBuffer
// ---------------------------------------------------------------------------

/// Plays a region of a buffer at `speed`, optionally looping.
///
/// `start` and `end` are fractions of the buffer length. A rising `trigger`
/// restarts playback; the default trigger of 1 starts it on the first block.
#[derive(Debug, Clone)]
pub struct PlayBuffer {
    buffer: String,
    channel: usize,
    interpolation: Interpolation,
    position: f32,
    playing: bool,
    trigger: Edge,
    missing: MissingBuffer,
}

impl UnitGenerator for PlayBuffer {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let n = ctx.num_samples;
        let Some(buffer) = ctx.buffers.get(&self.buffer) else {
            self.missing.warn(PLAY_BUFFER_SPEC.id, &self.buffer);
            out[0][..n].fill(0.0);
            return;
        };
        let Some(data) = buffer.channel(self.channel.min(buffer.num_channels().saturating_sub(1))) else {
            out[0][..n].fill(0.0);
            return;
        };
        let frames = data.len() as f32;
        let ratio = buffer.sample_rate() / ctx.sample_rate;
        let (speed, looping, trigger) = (inputs.get(0), inputs.get(1), inputs.get(2));
        let (start, end) = (inputs.get(3), inputs.get(4));

        for i in 0..n {
            let a = finite_or(start.at(i), 0.0).clamp(0.0, 1.0) * frames;
            let b = finite_or(end.at(i), 1.0).clamp(0.0, 1.0) * frames;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let span = hi - lo;
            let speed = finite_or(speed.at(i), 0.0) * ratio;

            if self.trigger.rising(trigger.at(i)) {
                self.playing = true;
                self.position = if speed < 0.0 { (hi - 1.0).max(lo) } else { lo };
            }
            if !self.playing || span < 1.0 {
                out[0][i] = 0.0;
                continue;
            }

            out[0][i] = self.interpolation.read(data, self.position);
            self.position += speed;
            if self.position >= hi || self.position < lo {
                if looping.at(i) > 0.0 {
                    self.position = lo + (self.position - lo).rem_euclid(span);
                } else {
                    self.playing = false;
                }
            }
        }
    }
}

fn build_play_buffer(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    Ok(Box::new(PlayBuffer {
        buffer: options::buffer_name(ctx)?,
        channel: options::count(ctx, "channel", 0)?,
        interpolation: options::interpolation(ctx, Interpolation::Linear)?,
        position: 0.0,
        playing: false,
        trigger: Edge::default(),
        missing: MissingBuffer::default(),
    }))
}

// ---------------------------------------------------------------------------
// ReadBuffer
// ---------------------------------------------------------------------------

/// Reads a buffer at `phase` (0..1 across its length).
#[derive(Debug, Clone)]
pub struct ReadBuffer {
    buffer: String,
    channel: usize,
    interpolation: Interpolation,
    missing: MissingBuffer,
}

impl UnitGenerator for ReadBuffer {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let n = ctx.num_samples;
        let data = ctx.buffers.get(&self.buffer).and_then(|b| b.channel(self.channel));
        let Some(data) = data else {
            self.missing.warn(READ_BUFFER_SPEC.id, &self.buffer);
            out[0][..n].fill(0.0);
            return;
        };
        let frames = data.len() as f32;
        let phase = inputs.get(0);
        for i in 0..n {
            out[0][i] = self.interpolation.read(data, phase.at(i) * frames);
        }
    }
}

fn build_read_buffer(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    Ok(Box::new(ReadBuffer {
        buffer: options::buffer_name(ctx)?,
        channel: options::count(ctx, "channel", 0)?,
        interpolation: options::interpolation(ctx, Interpolation::Linear)?,
        missing: MissingBuffer::default(),
    }))
}

// ---------------------------------------------------------------------------
// WriteBuffer
// ---------------------------------------------------------------------------

/// Records `sources` into a buffer and passes them through.
///
/// Writing begins at sample index `start` (read once, on the first block).
/// Without `loop` it stops at the end of the buffer; with it, it wraps.
/// Option `duration` (seconds) creates a silent buffer when none exists.
/// That buffer is allocated when the node is built and moved into the store
/// on the first block that finds the name missing.
#[derive(Debug, Clone)]
pub struct WriteBuffer {
    buffer: String,
    pending: Option<(String, SampleBuffer)>,
    channels: usize,
    position: Option<usize>,
    done: bool,
    missing: MissingBuffer,
}

impl UnitGenerator for WriteBuffer {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let n = ctx.num_samples;
        let (sources, start, looping) = (inputs.get(0), inputs.get(1), inputs.get(2));
        for (ch, buf) in out.iter_mut().enumerate() {
            for i in 0..n {
                buf[i] = sources.channel_at(ch, i);
            }
        }

        if !ctx.buffers.contains(&self.buffer)
            && let Some((name, created)) = self.pending.take()
        {
            ctx.buffers.insert(name, created);
        }
        let Some(target) = ctx.buffers.get_mut(&self.buffer) else {
            self.missing.warn(WRITE_BUFFER_SPEC.id, &self.buffer);
            return;
        };
        let frames = target.frames();
        if frames == 0 || self.done {
            return;
        }
        let mut pos = *self
            .position
            .get_or_insert_with(|| finite_or(start.value(), 0.0).max(0.0) as usize);

        for i in 0..n {
            if pos >= frames {
                if looping.at(i) > 0.0 {
                    pos %= frames;
                } else {
                    self.done = true;
                    break;
                }
            }
            for (ch, buf) in out.iter().enumerate() {
                if let Some(data) = target.channel_mut(ch) {
                    data[pos] = buf[i];
                }
            }
            pos += 1;
        }
        self.position = Some(pos);
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }
}

fn build_write_buffer(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let duration = match ctx.options.get("duration") {
        None => None,
        Some(_) => Some(
            ctx.options
                .f32("duration")
                .filter(|d| d.is_finite() && *d >= 0.0)
                .ok_or_else(|| {
                    Error::invalid_option(ctx.spec.id, "duration", "expected seconds >= 0")
                })?,
        ),
    };
    let buffer = options::buffer_name(ctx)?;
    let channels = ctx.channels_of(0).max(1);
    let pending = duration.map(|seconds| {
        let frames = roundf(seconds * ctx.sample_rate).max(0.0) as usize;
        (buffer.clone(), SampleBuffer::silent(channels, frames, ctx.sample_rate))
    });
    Ok(Box::new(WriteBuffer {
        buffer,
        pending,
        channels,
        position: None,
        done: false,
        missing: MissingBuffer::default(),
    }))
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Which metadata field a [`BufferInfo`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferField {
    /// Length in seconds.
    Duration,
    /// Length in frames.
    Length,
}

/// Reports a buffer's duration or length; 0 while the buffer is missing.
///
/// At constant rate the value is looked up every block until the buffer
/// shows up, then held.
#[derive(Debug, Clone)]
pub struct BufferInfo {
    buffer: String,
    field: BufferField,
    found: bool,
}

impl UnitGenerator for BufferInfo {
    fn generate(&mut self, ctx: &mut GenContext<'_>, _inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let buffer = ctx.buffers.get(&self.buffer);
        self.found = buffer.is_some();
        let value = buffer.map_or(0.0, |b| match self.field {
            BufferField::Duration => b.duration(),
            BufferField::Length => b.frames() as f32,
        });
        out[0][..ctx.num_samples].fill(value);
    }

    fn is_settled(&self) -> bool {
        self.found
    }
}

fn build_buffer_info(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let field = if ctx.spec.id == BUFFER_DURATION_SPEC.id {
        BufferField::Duration
    } else {
        BufferField::Length
    };
    Ok(Box::new(BufferInfo {
        buffer: options::buffer_name(ctx)?,
        field,
        found: false,
    }))
}

/// Register the buffer family.
pub fn register(registry: &mut UgenRegistry) {
    let buffer = |name, description, spec| UgenDescriptor {
        name,
        description,
        category: UgenCategory::Buffer,
        spec,
    };
    registry.register(
        buffer("Play Buffer", "Region playback with speed and looping", &PLAY_BUFFER_SPEC),
        build_play_buffer,
    );
    registry.register(
        buffer("Read Buffer", "Phase-driven buffer lookup", &READ_BUFFER_SPEC),
        build_read_buffer,
    );
    registry.register(
        buffer("Write Buffer", "Records its sources into a buffer", &WRITE_BUFFER_SPEC),
        build_write_buffer,
    );
    registry.register(
        buffer("Buffer Duration", "Buffer length in seconds", &BUFFER_DURATION_SPEC),
        build_buffer_info,
    );
    registry.register(
        buffer("Buffer Length", "Buffer length in frames", &BUFFER_LENGTH_SPEC),
        build_buffer_info,
    );
}
