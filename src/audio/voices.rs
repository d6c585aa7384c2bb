//! Voice state machines
//!
//! A voice is one playing sound source: a player node, its stereo panner,
//! and the effect chain it currently runs through. The three variants share
//! `PlaybackBase` for the wiring and teardown that is the same everywhere
//! and differ in how they are retired: loop voices crossfade into their
//! replacement, one-shots stop themselves after the buffer runs out, drones
//! are loops played through a granular player at a fraction of natural speed.
//!
//! Ownership is strict. At most one effect chain and one panner are live per
//! voice; assigning a new one disposes the old first, and `dispose` releases
//! effect, panner, player in that order. A disposed voice is dropped, never
//! reused.

use std::fmt;
use std::sync::Arc;

use crate::audio::effects::EffectChain;
use crate::audio::{AudioGraph, NodeId, NodeParam, NodeSpec};
use crate::catalog::BufferHandle;
use crate::choices::{bool_choice, uniform};
use crate::error::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Playing,
    FadingOut,
    Stopped,
}

/// Identifies a voice across the scheduled events that reference it. Ids are
/// never reused within a manager, so an event holding a stale id simply finds
/// no voice and is absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u64);

impl VoiceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice {}", self.0)
    }
}

/// The player-plus-effect plumbing every voice variant shares.
#[derive(Debug)]
struct PlaybackBase {
    player: NodeId,
    effect: Option<EffectChain>,
    state: VoiceState,
    reverse_probability: f64,
}

impl PlaybackBase {
    fn new(graph: &mut dyn AudioGraph, player_spec: NodeSpec, reverse_probability: f64) -> Self {
        Self {
            player: graph.create(player_spec),
            effect: None,
            state: VoiceState::Idle,
            reverse_probability,
        }
    }

    fn player(&self) -> NodeId {
        self.player
    }

    fn state(&self) -> VoiceState {
        self.state
    }

    /// Swap in a new effect chain and start playback of `buffer` through
    /// `panner`. Any previous chain is disposed before the new routing goes
    /// up, so repeated plays never accumulate chains.
    fn start_routed(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
        buffer: &BufferHandle,
        effect: EffectChain,
        panner: NodeId,
    ) -> EngineResult<()> {
        if let Some(old) = self.effect.take() {
            old.dispose(graph)?;
        }

        graph.set_source(self.player, buffer)?;
        effect.connect(graph)?;
        graph.connect(panner, effect.entry())?;
        graph.connect(self.player, panner)?;
        self.effect = Some(effect);

        let reverse = bool_choice(rng, self.reverse_probability);
        graph.set_param(self.player, NodeParam::Reverse(reverse))?;
        graph.start_player(self.player)?;
        self.state = VoiceState::Playing;
        Ok(())
    }

    /// Ordered teardown: effect chain, then panner, then player.
    fn dispose_routing(
        &mut self,
        graph: &mut dyn AudioGraph,
        panner: Option<NodeId>,
    ) -> EngineResult<()> {
        if let Some(effect) = self.effect.take() {
            effect.dispose(graph)?;
        }
        if let Some(panner) = panner {
            graph.dispose(panner)?;
        }
        graph.dispose(self.player)?;
        self.state = VoiceState::Stopped;
        Ok(())
    }
}

/// The surface pool managers drive for loop and drone voices. Replacing
/// material is a two-step swap: `begin_swap` stops the current buffer and
/// parks the replacement, `complete_swap` brings it up once the fade and
/// effect tail have run their course.
pub trait SustainedVoice {
    fn id(&self) -> VoiceId;
    fn state(&self) -> VoiceState;
    /// Key of the buffer currently (or about to be) playing.
    fn buffer_key(&self) -> Option<Arc<str>>;

    /// Wire up and start playing immediately. Used at pool initialisation.
    fn play(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
        buffer: BufferHandle,
        effect: EffectChain,
    ) -> EngineResult<()>;

    /// Stop the current material and park the replacement pair.
    fn begin_swap(
        &mut self,
        graph: &mut dyn AudioGraph,
        buffer: BufferHandle,
        effect: EffectChain,
    ) -> EngineResult<()>;

    /// Bring up the parked replacement. Absorbed silently if nothing is
    /// parked (the swap was overtaken by a dispose).
    fn complete_swap(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
    ) -> EngineResult<()>;

    fn dispose(&mut self, graph: &mut dyn AudioGraph) -> EngineResult<()>;
}

/// Builds one sustained voice at a fixed pan position.
pub type SustainedVoiceFactory =
    Box<dyn Fn(&mut dyn AudioGraph, VoiceId, f32) -> Box<dyn SustainedVoice>>;

/// Persistent looping voice. The panner is built once at the pool's fixed
/// position and survives swaps; only the effect chain is rebuilt per play.
pub struct LoopVoice {
    id: VoiceId,
    base: PlaybackBase,
    panner: NodeId,
    pending: Option<(BufferHandle, EffectChain)>,
    current_key: Option<Arc<str>>,
}

impl LoopVoice {
    pub fn new(
        graph: &mut dyn AudioGraph,
        id: VoiceId,
        pan_position: f32,
        volume_db: f32,
        fade: f64,
        reverse_probability: f64,
    ) -> Self {
        let base = PlaybackBase::new(
            graph,
            NodeSpec::Player {
                looped: true,
                volume_db,
                fade_in: fade,
                fade_out: fade,
            },
            reverse_probability,
        );
        let panner = graph.create(NodeSpec::Panner {
            position: pan_position,
        });
        Self {
            id,
            base,
            panner,
            pending: None,
            current_key: None,
        }
    }

    /// Dispose a parked replacement's chain. A choice tick can fire while a
    /// previous swap is still fading, so the overwritten pair must not leak.
    fn drop_pending(&mut self, graph: &mut dyn AudioGraph) -> EngineResult<()> {
        if let Some((_, effect)) = self.pending.take() {
            effect.dispose(graph)?;
        }
        Ok(())
    }
}

impl SustainedVoice for LoopVoice {
    fn id(&self) -> VoiceId {
        self.id
    }

    fn state(&self) -> VoiceState {
        self.base.state()
    }

    fn buffer_key(&self) -> Option<Arc<str>> {
        self.current_key.clone()
    }

    fn play(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
        buffer: BufferHandle,
        effect: EffectChain,
    ) -> EngineResult<()> {
        self.current_key = Some(buffer.key_arc());
        self.base
            .start_routed(graph, rng, &buffer, effect, self.panner)
    }

    fn begin_swap(
        &mut self,
        graph: &mut dyn AudioGraph,
        buffer: BufferHandle,
        effect: EffectChain,
    ) -> EngineResult<()> {
        self.drop_pending(graph)?;
        graph.stop_player(self.base.player())?;
        self.base.state = VoiceState::FadingOut;
        self.current_key = Some(buffer.key_arc());
        self.pending = Some((buffer, effect));
        Ok(())
    }

    fn complete_swap(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
    ) -> EngineResult<()> {
        match self.pending.take() {
            Some((buffer, effect)) => self.play(graph, rng, buffer, effect),
            None => Ok(()),
        }
    }

    fn dispose(&mut self, graph: &mut dyn AudioGraph) -> EngineResult<()> {
        self.drop_pending(graph)?;
        self.base.dispose_routing(graph, Some(self.panner))
    }
}

/// Granular parameter ranges for drone voices, randomized per play.
const GRAIN_SIZE_RANGE: (f64, f64) = (0.2, 0.6);
const OVERLAP_RANGE: (f64, f64) = (0.05, 0.2);
const DETUNE_RANGE: (f64, f64) = (-100.0, 100.0);

/// Loop-shaped voice played through a granular player far below natural
/// speed, smearing the source into a slow texture.
pub struct DroneVoice {
    id: VoiceId,
    base: PlaybackBase,
    panner: NodeId,
    pending: Option<(BufferHandle, EffectChain)>,
    current_key: Option<Arc<str>>,
    rate_range: (f64, f64),
}

impl DroneVoice {
    pub fn new(
        graph: &mut dyn AudioGraph,
        id: VoiceId,
        pan_position: f32,
        volume_db: f32,
        fade: f64,
        reverse_probability: f64,
        rate_range: (f64, f64),
    ) -> Self {
        let base = PlaybackBase::new(
            graph,
            NodeSpec::GrainPlayer {
                volume_db,
                fade_in: fade,
                fade_out: fade,
            },
            reverse_probability,
        );
        let panner = graph.create(NodeSpec::Panner {
            position: pan_position,
        });
        Self {
            id,
            base,
            panner,
            pending: None,
            current_key: None,
            rate_range,
        }
    }

    fn drop_pending(&mut self, graph: &mut dyn AudioGraph) -> EngineResult<()> {
        if let Some((_, effect)) = self.pending.take() {
            effect.dispose(graph)?;
        }
        Ok(())
    }
}

impl SustainedVoice for DroneVoice {
    fn id(&self) -> VoiceId {
        self.id
    }

    fn state(&self) -> VoiceState {
        self.base.state()
    }

    fn buffer_key(&self) -> Option<Arc<str>> {
        self.current_key.clone()
    }

    fn play(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
        buffer: BufferHandle,
        effect: EffectChain,
    ) -> EngineResult<()> {
        let player = self.base.player();
        let (rate_min, rate_max) = self.rate_range;
        graph.set_param(player, NodeParam::PlaybackRate(uniform(rng, rate_min, rate_max)))?;
        graph.set_param(
            player,
            NodeParam::GrainSize(uniform(rng, GRAIN_SIZE_RANGE.0, GRAIN_SIZE_RANGE.1)),
        )?;
        graph.set_param(
            player,
            NodeParam::Overlap(uniform(rng, OVERLAP_RANGE.0, OVERLAP_RANGE.1)),
        )?;
        graph.set_param(
            player,
            NodeParam::Detune(uniform(rng, DETUNE_RANGE.0, DETUNE_RANGE.1)),
        )?;

        self.current_key = Some(buffer.key_arc());
        self.base
            .start_routed(graph, rng, &buffer, effect, self.panner)
    }

    fn begin_swap(
        &mut self,
        graph: &mut dyn AudioGraph,
        buffer: BufferHandle,
        effect: EffectChain,
    ) -> EngineResult<()> {
        self.drop_pending(graph)?;
        graph.stop_player(self.base.player())?;
        self.base.state = VoiceState::FadingOut;
        self.current_key = Some(buffer.key_arc());
        self.pending = Some((buffer, effect));
        Ok(())
    }

    fn complete_swap(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
    ) -> EngineResult<()> {
        match self.pending.take() {
            Some((buffer, effect)) => self.play(graph, rng, buffer, effect),
            None => Ok(()),
        }
    }

    fn dispose(&mut self, graph: &mut dyn AudioGraph) -> EngineResult<()> {
        self.drop_pending(graph)?;
        self.base.dispose_routing(graph, Some(self.panner))
    }
}

pub fn loop_voice_factory(
    volume_db: f32,
    fade: f64,
    reverse_probability: f64,
) -> SustainedVoiceFactory {
    Box::new(move |graph, id, pan_position| {
        let voice = LoopVoice::new(graph, id, pan_position, volume_db, fade, reverse_probability);
        Box::new(voice) as Box<dyn SustainedVoice>
    })
}

pub fn drone_voice_factory(
    volume_db: f32,
    fade: f64,
    reverse_probability: f64,
    rate_range: (f64, f64),
) -> SustainedVoiceFactory {
    Box::new(move |graph, id, pan_position| {
        let voice = DroneVoice::new(
            graph,
            id,
            pan_position,
            volume_db,
            fade,
            reverse_probability,
            rate_range,
        );
        Box::new(voice) as Box<dyn SustainedVoice>
    })
}

/// Transient voice. Each play builds a fresh panner at a random position and
/// reports back how long it will sound, so its manager can schedule the
/// self-stop. The generation counter guards that stop against re-arms that
/// happen first: a finish event for generation N does nothing once the voice
/// has moved on to N+1.
pub struct OneShotVoice {
    id: VoiceId,
    base: PlaybackBase,
    panner: Option<NodeId>,
    generation: u64,
    current_key: Option<Arc<str>>,
}

impl OneShotVoice {
    pub fn new(
        graph: &mut dyn AudioGraph,
        id: VoiceId,
        volume_db: f32,
        fade: f64,
        reverse_probability: f64,
    ) -> Self {
        let base = PlaybackBase::new(
            graph,
            NodeSpec::Player {
                looped: false,
                volume_db,
                fade_in: fade,
                fade_out: fade,
            },
            reverse_probability,
        );
        Self {
            id,
            base,
            panner: None,
            generation: 0,
            current_key: None,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn state(&self) -> VoiceState {
        self.base.state()
    }

    pub fn buffer_key(&self) -> Option<Arc<str>> {
        self.current_key.clone()
    }

    /// Whether the voice can take a new play. A never-played voice counts.
    pub fn is_available(&self) -> bool {
        matches!(self.base.state(), VoiceState::Idle | VoiceState::Stopped)
    }

    /// Re-arm with fresh material, effect, and pan position. Returns the
    /// generation of this play, to be carried by the scheduled finish.
    pub fn play_new(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
        buffer: BufferHandle,
        effect: EffectChain,
        pan_position: f32,
    ) -> EngineResult<u64> {
        if let Some(old) = self.panner.take() {
            graph.dispose(old)?;
        }
        let panner = graph.create(NodeSpec::Panner {
            position: pan_position,
        });
        self.panner = Some(panner);

        self.current_key = Some(buffer.key_arc());
        self.base.start_routed(graph, rng, &buffer, effect, panner)?;
        self.generation += 1;
        Ok(self.generation)
    }

    /// Scheduled self-stop. Returns whether the voice actually stopped;
    /// a finish for a play that is no longer current does nothing.
    pub fn finish(&mut self, graph: &mut dyn AudioGraph, generation: u64) -> EngineResult<bool> {
        if generation != self.generation || self.base.state() != VoiceState::Playing {
            return Ok(false);
        }
        graph.stop_player(self.base.player())?;
        self.base.state = VoiceState::Stopped;
        Ok(true)
    }

    pub fn dispose(&mut self, graph: &mut dyn AudioGraph) -> EngineResult<()> {
        self.base.dispose_routing(graph, self.panner.take())
    }
}
