//! Bus writers and readers.
//!
//! Buses are cleared at the start of every block. Writers mix into them, so a
//! reader placed later in the node list sees the sum of every earlier writer.

use sonant_core::{
    BuildContext, Error, GenContext, InputSpec, Inputs, Rate, Result, SignalBuffer, UgenCategory, UgenDescriptor,
    UgenRegistry, UgenSpec, UnitGenerator, finite_or,
};

use crate::options;

/// Spec for `out`.
pub static OUT_SPEC: UgenSpec = UgenSpec {
    id: "out",
    inputs: &[
        InputSpec::multi("sources"),
        InputSpec::new("bus", 0.0),
        InputSpec::new("expand", 1.0),
    ],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

/// Spec for `in`.
pub static IN_SPEC: UgenSpec = UgenSpec {
    id: "in",
    inputs: &[InputSpec::new("bus", 0.0)],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

#[inline]
fn bus_index(value: f32) -> usize {
    finite_or(value, 0.0).max(0.0) as usize
}

/// Mixes `sources` onto consecutive buses starting at `bus`, and passes them
/// through as its own output.
///
/// A mono source is spread over `expand` buses. Bus writes see the sources
/// before this node's own `mul`/`add`.
#[derive(Debug, Clone)]
pub struct Out {
    channels: usize,
}

impl UnitGenerator for Out {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let n = ctx.num_samples;
        let (sources, bus, expand) = (inputs.get(0), inputs.get(1), inputs.get(2));
        for (ch, buf) in out.iter_mut().enumerate() {
            for i in 0..n {
                buf[i] = sources.channel_at(ch, i);
            }
        }

        let first = bus_index(bus.value());
        if self.channels == 1 {
            let expand = bus_index(expand.value()).clamp(1, ctx.buses.len().max(1));
            for offset in 0..expand {
                ctx.buses.mix_into(first.saturating_add(offset), &out[0][..n]);
            }
        } else {
            for (ch, buf) in out.iter().enumerate() {
                ctx.buses.mix_into(first.saturating_add(ch), &buf[..n]);
            }
        }
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }
}

/// Reads `channels` consecutive buses starting at `bus`.
#[derive(Debug, Clone)]
pub struct In {
    channels: usize,
}

impl UnitGenerator for In {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let n = ctx.num_samples;
        let first = bus_index(inputs.value(0));
        for (ch, buf) in out.iter_mut().enumerate() {
            match ctx.buses.read(first.saturating_add(ch)) {
                Some(samples) => buf[..n].copy_from_slice(&samples[..n]),
                None => buf[..n].fill(0.0),
            }
        }
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }
}

fn build_in(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let channels = options::count(ctx, "channels", 1)?;
    if channels == 0 {
        return Err(Error::invalid_option(ctx.spec.id, "channels", "expected at least one channel"));
    }
    Ok(Box::new(In { channels }))
}

/// Register the bus family.
pub fn register(registry: &mut UgenRegistry) {
    let bus = |name, description, spec| UgenDescriptor {
        name,
        description,
        category: UgenCategory::Bus,
        spec,
    };
    registry.register(
        bus("Out", "Mixes its sources onto buses", &OUT_SPEC),
        |ctx| {
            Ok(Box::new(Out {
                channels: ctx.channels_of(0).max(1),
            }))
        },
    );
    registry.register(bus("In", "Reads consecutive buses", &IN_SPEC), build_in);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{env, render};
    use sonant_core::{NodeDescriptor, Position};

    #[test]
    fn out_writes_and_passes_through() {
        let mut env = env(64);
        let desc = NodeDescriptor::new("out").input("sources", NodeDescriptor::new("sinOsc").input("freq", 1000.0));
        let (id, out) = render(&mut env, &desc, 1);
        assert_eq!(env.bus(0).unwrap(), out.as_slice());
        assert!(out.iter().any(|&s| s != 0.0));
        assert!(env.bus(1).unwrap().iter().all(|&s| s == 0.0));
        assert_eq!(env.output(id).unwrap().len(), 1);
    }

    #[test]
    fn multichannel_sources_take_consecutive_buses() {
        let mut env = env(16);
        let desc = NodeDescriptor::new("out").input("sources", vec![0.25, -0.5]);
        let (id, _) = render(&mut env, &desc, 1);
        assert_eq!(env.output(id).unwrap().len(), 2);
        assert!(env.bus(0).unwrap().iter().all(|&s| s == 0.25));
        assert!(env.bus(1).unwrap().iter().all(|&s| s == -0.5));
    }

    #[test]
    fn mono_source_expands() {
        let mut env = env(16);
        let desc = NodeDescriptor::new("out").input("sources", 0.5).input("expand", 2.0);
        render(&mut env, &desc, 1);
        assert!(env.bus(0).unwrap().iter().all(|&s| s == 0.5));
        assert!(env.bus(1).unwrap().iter().all(|&s| s == 0.5));
    }

    #[test]
    fn out_of_range_bus_is_ignored() {
        let mut env = env(16);
        let desc = NodeDescriptor::new("out").input("sources", 1.0).input("bus", 1000.0);
        let (_, out) = render(&mut env, &desc, 1);
        assert!(out.iter().all(|&s| s == 1.0));
        for bus in 0..env.buses().len() {
            assert!(env.bus(bus).unwrap().iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn in_reads_an_interconnect_bus() {
        let mut env = env(16);
        let bus = env.acquire_next_bus().unwrap();
        let writer = NodeDescriptor::new("out")
            .input("sources", 0.75)
            .input("bus", bus as f32);
        env.add(&writer, Position::Tail).unwrap();
        let (_, read) = render(&mut env, &NodeDescriptor::new("in").input("bus", bus as f32), 1);
        assert!(read.iter().all(|&s| s == 0.75));
        // Output buses stay silent.
        assert!(env.bus(0).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn multichannel_in() {
        let mut env = env(16);
        env.add(&NodeDescriptor::new("out").input("sources", vec![0.1, 0.2]), Position::Tail)
            .unwrap();
        let (id, _) = render(&mut env, &NodeDescriptor::new("in").option("channels", 2), 1);
        let outputs = env.output(id).unwrap();
        assert!(outputs[1].iter().all(|&s| s == 0.2));
        assert!(env.build(&NodeDescriptor::new("in").option("channels", 0)).is_err());
    }
}
