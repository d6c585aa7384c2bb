//! Effect chain factory
//!
//! Every voice plays through a freshly built effect chain picked at random
//! from a registered table of builders. Each builder randomizes its internal
//! parameters within ranges that stay musical (feedback below runaway,
//! filter resonance below self-oscillation) and returns a chain that tracks
//! every node it allocated so teardown releases all of them.

use crate::audio::{AudioGraph, FilterShape, NodeId, NodeSpec};
use crate::choices::{bool_choice, numeric_choice, uniform, uniform_int};
use crate::error::EngineResult;

/// An owned, disposable slice of the audio graph: one entry node upstream
/// wiring connects into, one or more exit nodes routed to the destination,
/// and the full list of allocated nodes for teardown.
///
/// Disposal consumes the chain, so a connected chain is released exactly once
/// by construction.
#[derive(Debug)]
pub struct EffectChain {
    name: &'static str,
    entry: NodeId,
    exits: Vec<NodeId>,
    nodes: Vec<NodeId>,
}

impl EffectChain {
    fn new(name: &'static str, entry: NodeId, exits: Vec<NodeId>, nodes: Vec<NodeId>) -> Self {
        Self {
            name,
            entry,
            exits,
            nodes,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The node upstream audio (the voice's panner) connects into.
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Route the chain's output to the final mix destination.
    pub fn connect(&self, graph: &mut dyn AudioGraph) -> EngineResult<()> {
        for exit in &self.exits {
            graph.connect_to_destination(*exit)?;
        }
        Ok(())
    }

    /// Release every node the chain allocated. Safe on a chain that was
    /// never connected.
    pub fn dispose(self, graph: &mut dyn AudioGraph) -> EngineResult<()> {
        for node in self.nodes {
            graph.dispose(node)?;
        }
        Ok(())
    }
}

/// A chain constructor: allocates nodes, wires them internally, randomizes
/// parameters.
pub type EffectBuilder =
    fn(&mut dyn AudioGraph, &mut fastrand::Rng) -> EngineResult<EffectChain>;

/// Builders loop and drone voices draw from.
pub fn sustained_effects() -> Vec<EffectBuilder> {
    vec![ping_pong_delay, filter_delay, double_delay, rand_delay]
}

/// Builders one-shot voices draw from. Pitch shifting is reserved for
/// transient material; a permanently shifted loop bed gets wearing.
pub fn one_shot_effects() -> Vec<EffectBuilder> {
    vec![
        ping_pong_delay,
        filter_delay,
        pitch_shift,
        double_delay,
        rand_delay,
    ]
}

/// Build one chain picked uniformly from `table`.
pub fn build_random(
    graph: &mut dyn AudioGraph,
    rng: &mut fastrand::Rng,
    table: &[EffectBuilder],
) -> EngineResult<EffectChain> {
    assert!(!table.is_empty(), "effect table must not be empty");
    let builder = table[numeric_choice(rng, table.len())];
    let chain = builder(graph, rng)?;
    log::debug!("built {} effect chain", chain.name());
    Ok(chain)
}

/// Stereo ping-pong delay straight to the destination.
pub fn ping_pong_delay(
    graph: &mut dyn AudioGraph,
    rng: &mut fastrand::Rng,
) -> EngineResult<EffectChain> {
    let delay = graph.create(NodeSpec::PingPongDelay {
        delay_time: uniform(rng, 0.4, 1.0),
        feedback: uniform(rng, 0.2, 0.4),
        wet: uniform(rng, 0.2, 0.4),
    });
    Ok(EffectChain::new("ping-pong delay", delay, vec![delay], vec![delay]))
}

fn random_shape(rng: &mut fastrand::Rng) -> FilterShape {
    match numeric_choice(rng, 3) {
        0 => FilterShape::Lowpass,
        1 => FilterShape::Bandpass,
        _ => FilterShape::Highpass,
    }
}

fn swept_frequency(rng: &mut fastrand::Rng, shape: FilterShape) -> f64 {
    match shape {
        FilterShape::Lowpass => uniform(rng, 400.0, 1600.0),
        FilterShape::Bandpass => uniform(rng, 200.0, 4000.0),
        FilterShape::Highpass => uniform(rng, 200.0, 2000.0),
    }
}

fn fixed_frequency(rng: &mut fastrand::Rng, shape: FilterShape) -> f64 {
    match shape {
        FilterShape::Lowpass => uniform(rng, 400.0, 1600.0),
        FilterShape::Bandpass => uniform(rng, 800.0, 2000.0),
        FilterShape::Highpass => uniform(rng, 200.0, 2000.0),
    }
}

fn sweep_octaves(rng: &mut fastrand::Rng, shape: FilterShape) -> f64 {
    match shape {
        FilterShape::Lowpass | FilterShape::Highpass => uniform_int(rng, 1, 4) as f64,
        FilterShape::Bandpass => uniform_int(rng, 2, 4) as f64,
    }
}

/// Feedback delay behind a filter. Half the time the filter is swept by an
/// LFO, otherwise it sits at a fixed frequency with zero resonance so a
/// randomly resonant spot in the sample cannot distort.
pub fn filter_delay(
    graph: &mut dyn AudioGraph,
    rng: &mut fastrand::Rng,
) -> EngineResult<EffectChain> {
    let delay = graph.create(NodeSpec::FeedbackDelay {
        delay_time: uniform(rng, 0.01, 1.0),
        feedback: uniform(rng, 0.2, 0.6),
    });
    let shape = random_shape(rng);

    let filter = if bool_choice(rng, 0.5) {
        graph.create(NodeSpec::AutoFilter {
            shape,
            base_frequency: swept_frequency(rng, shape),
            octaves: sweep_octaves(rng, shape),
            lfo_frequency: uniform(rng, 0.02, 0.07),
            // Interesting without being over the top
            q: uniform_int(rng, 6, 12) as f64,
        })
    } else {
        graph.create(NodeSpec::Filter {
            shape,
            frequency: fixed_frequency(rng, shape),
            q: 0.0,
            gain: 0.8,
        })
    };
    graph.connect(filter, delay)?;

    Ok(EffectChain::new(
        "filter delay",
        filter,
        vec![delay],
        vec![filter, delay],
    ))
}

/// Pitch shift up to an octave either way.
pub fn pitch_shift(
    graph: &mut dyn AudioGraph,
    rng: &mut fastrand::Rng,
) -> EngineResult<EffectChain> {
    let shift = graph.create(NodeSpec::PitchShift {
        semitones: uniform_int(rng, -12, 12),
    });
    Ok(EffectChain::new("pitch shift", shift, vec![shift], vec![shift]))
}

/// Two delays at unrelated times, split hard-ish left and right so the
/// repeats answer each other across the stereo field.
pub fn double_delay(
    graph: &mut dyn AudioGraph,
    rng: &mut fastrand::Rng,
) -> EngineResult<EffectChain> {
    let split = graph.create(NodeSpec::Gain { volume_db: 0.0 });
    let left_delay = graph.create(NodeSpec::FeedbackDelay {
        delay_time: uniform(rng, 0.01, 1.0),
        feedback: uniform(rng, 0.2, 0.6),
    });
    let right_delay = graph.create(NodeSpec::FeedbackDelay {
        delay_time: uniform(rng, 0.01, 1.0),
        feedback: uniform(rng, 0.2, 0.6),
    });
    let left_pan = graph.create(NodeSpec::Panner {
        position: -uniform(rng, 0.5, 1.0) as f32,
    });
    let right_pan = graph.create(NodeSpec::Panner {
        position: uniform(rng, 0.5, 1.0) as f32,
    });

    graph.connect(split, left_delay)?;
    graph.connect(split, right_delay)?;
    graph.connect(left_delay, left_pan)?;
    graph.connect(right_delay, right_pan)?;

    Ok(EffectChain::new(
        "double delay",
        split,
        vec![left_pan, right_pan],
        vec![split, left_delay, right_delay, left_pan, right_pan],
    ))
}

/// Feedback delay whose delay time drifts under a very slow LFO, so the
/// echo spacing evolves over the life of the voice. The drift stays within
/// half the base delay time either way, keeping the echoes recognizably
/// related to where they started.
pub fn rand_delay(
    graph: &mut dyn AudioGraph,
    rng: &mut fastrand::Rng,
) -> EngineResult<EffectChain> {
    let delay_time = uniform(rng, 0.01, 1.0);
    let delay = graph.create(NodeSpec::FeedbackDelay {
        delay_time,
        feedback: uniform(rng, 0.2, 0.6),
    });
    let depth = uniform(rng, 0.1, 0.5) * delay_time;
    let drift = graph.create(NodeSpec::Lfo {
        frequency: uniform(rng, 0.02, 0.07),
        min: delay_time - depth,
        max: delay_time + depth,
    });
    graph.connect(drift, delay)?;

    Ok(EffectChain::new(
        "rand delay",
        delay,
        vec![delay],
        vec![delay, drift],
    ))
}

/// Small-room reverb. Not in either default table; kept registered for
/// configurations that want a wash instead of echoes.
pub fn reverb(graph: &mut dyn AudioGraph, rng: &mut fastrand::Rng) -> EngineResult<EffectChain> {
    let reverb = graph.create(NodeSpec::Reverb {
        room_size: uniform(rng, 0.01, 1.0),
        dampening: uniform(rng, 200.0, 4000.0),
    });
    Ok(EffectChain::new("reverb", reverb, vec![reverb], vec![reverb]))
}
