//! Audio graph capability
//!
//! The engine never touches signal processing directly. It builds and tears
//! down a graph of nodes through the `AudioGraph` trait and leaves the actual
//! audio rendering to whatever implements it. `OfflineGraph` is the
//! instrumented implementation used by the tests and the demo binary.

pub mod effects;
pub mod offline;
pub mod voices;

use std::fmt;

use crate::catalog::BufferHandle;
use crate::error::EngineResult;

/// Opaque handle to one allocated audio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Filter response shapes used by the delay effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterShape {
    Lowpass,
    Bandpass,
    Highpass,
}

impl fmt::Display for FilterShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterShape::Lowpass => "lowpass",
            FilterShape::Bandpass => "bandpass",
            FilterShape::Highpass => "highpass",
        };
        write!(f, "{}", name)
    }
}

/// Construction parameters for every node kind the engine allocates.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    /// Sample player. Loop voices set `looped`; one-shots leave it off.
    Player {
        looped: bool,
        volume_db: f32,
        fade_in: f64,
        fade_out: f64,
    },
    /// Granular player used by drone voices. Grain parameters are set per
    /// play through `NodeParam`.
    GrainPlayer {
        volume_db: f32,
        fade_in: f64,
        fade_out: f64,
    },
    /// Stereo panner, position in [-1, 1].
    Panner { position: f32 },
    /// Stereo ping-pong delay.
    PingPongDelay {
        delay_time: f64,
        feedback: f64,
        wet: f64,
    },
    /// Mono feedback delay.
    FeedbackDelay { delay_time: f64, feedback: f64 },
    /// Fixed filter.
    Filter {
        shape: FilterShape,
        frequency: f64,
        q: f64,
        gain: f64,
    },
    /// Filter swept by its own LFO.
    AutoFilter {
        shape: FilterShape,
        base_frequency: f64,
        octaves: f64,
        lfo_frequency: f64,
        q: f64,
    },
    /// Low-frequency oscillator routed at another node's parameter.
    Lfo {
        frequency: f64,
        min: f64,
        max: f64,
    },
    /// Pitch shifter, amount in semitones.
    PitchShift { semitones: i32 },
    /// Plain gain stage.
    Gain { volume_db: f32 },
    /// Simple reverb.
    Reverb { room_size: f64, dampening: f64 },
}

impl NodeSpec {
    /// Short kind name, used in errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeSpec::Player { .. } => "player",
            NodeSpec::GrainPlayer { .. } => "grain player",
            NodeSpec::Panner { .. } => "panner",
            NodeSpec::PingPongDelay { .. } => "ping-pong delay",
            NodeSpec::FeedbackDelay { .. } => "feedback delay",
            NodeSpec::Filter { .. } => "filter",
            NodeSpec::AutoFilter { .. } => "auto filter",
            NodeSpec::Lfo { .. } => "lfo",
            NodeSpec::PitchShift { .. } => "pitch shift",
            NodeSpec::Gain { .. } => "gain",
            NodeSpec::Reverb { .. } => "reverb",
        }
    }

    /// Whether this node can hold a source buffer and be started.
    pub fn is_player(&self) -> bool {
        matches!(self, NodeSpec::Player { .. } | NodeSpec::GrainPlayer { .. })
    }
}

/// Parameter updates applied to an existing node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeParam {
    /// Play the assigned buffer backwards.
    Reverse(bool),
    /// Playback-rate scaling for players.
    PlaybackRate(f64),
    /// Grain length in seconds (grain players only).
    GrainSize(f64),
    /// Grain overlap in seconds (grain players only).
    Overlap(f64),
    /// Detune in cents (grain players only).
    Detune(f64),
}

/// The node-creation and routing surface the engine drives. One destination
/// (the final mix bus) is implicit; `connect_to_destination` routes into it.
///
/// Nodes are exclusively owned by whoever created them: referencing a node
/// after `dispose` is an error, and implementations report it as one.
pub trait AudioGraph {
    /// Allocate a node. Never fails; resource exhaustion is the
    /// implementation's problem, not the engine's.
    fn create(&mut self, spec: NodeSpec) -> NodeId;

    /// Route `from`'s output into `to`'s input.
    fn connect(&mut self, from: NodeId, to: NodeId) -> EngineResult<()>;

    /// Route `node`'s output to the final mix destination.
    fn connect_to_destination(&mut self, node: NodeId) -> EngineResult<()>;

    /// Assign a source buffer to a player node.
    fn set_source(&mut self, player: NodeId, buffer: &BufferHandle) -> EngineResult<()>;

    /// Apply a parameter update.
    fn set_param(&mut self, node: NodeId, param: NodeParam) -> EngineResult<()>;

    /// Start playback on a player node. The player must have a source.
    fn start_player(&mut self, player: NodeId) -> EngineResult<()>;

    /// Stop playback on a player node. The node's fade-out applies; a stop on
    /// an already-stopped player is a no-op.
    fn stop_player(&mut self, player: NodeId) -> EngineResult<()>;

    /// Release a node and all its routing.
    fn dispose(&mut self, node: NodeId) -> EngineResult<()>;
}
