//! Voice pool managers
//!
//! Each manager owns a fixed-size pool of voices for one sound category and
//! decides when to retire a voice and what material it comes back with.
//! Loop pools rotate FIFO: the oldest-started voice is always the next
//! replacement candidate. One-shot pools scan for the first voice that has
//! stopped. Selection avoids recently chosen material via a bounded history,
//! falling back to the full catalog if the exclusion would leave nothing to
//! pick from.
//!
//! A manager's `stopped` flag is a transition gate, not a pause: it only
//! keeps the choice routine from spawning replacements, because timers keep
//! firing until the owner cancels them and a tick landing after `dispose`
//! is expected, not an error.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::audio::effects::{build_random, EffectBuilder};
use crate::audio::voices::{
    OneShotVoice, SustainedVoice, SustainedVoiceFactory, VoiceId, VoiceState,
};
use crate::audio::AudioGraph;
use crate::catalog::{BufferCatalog, BufferHandle, SoundCategory};
use crate::choices::{bool_choice, numeric_choice, pan_positions, single_pan_position};
use crate::error::{EngineError, EngineResult};
use crate::events::{Notice, NoticeSender};
use crate::sequencing::director::EngineEvent;
use crate::sequencing::transport::{TimerId, Transport};

/// Bounded window of recently chosen buffer keys.
#[derive(Debug)]
pub struct RecentHistory {
    window: usize,
    keys: VecDeque<Arc<str>>,
}

impl RecentHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            keys: VecDeque::with_capacity(window),
        }
    }

    pub fn remember(&mut self, key: Arc<str>) {
        if self.window == 0 {
            return;
        }
        if self.keys.len() == self.window {
            self.keys.pop_front();
        }
        self.keys.push_back(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k.as_ref() == key)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Picks the next buffer for one category, excluding material chosen within
/// the history window so the same sound does not come straight back.
#[derive(Debug)]
pub struct MaterialSource {
    category: SoundCategory,
    history: RecentHistory,
}

impl MaterialSource {
    pub fn new(category: SoundCategory, history_window: usize) -> Self {
        Self {
            category,
            history: RecentHistory::new(history_window),
        }
    }

    pub fn next(
        &mut self,
        catalog: &BufferCatalog,
        rng: &mut fastrand::Rng,
    ) -> EngineResult<BufferHandle> {
        let fresh: Vec<&BufferHandle> = catalog
            .handles(self.category)
            .filter(|handle| !self.history.contains(handle.key()))
            .collect();

        let handle = if fresh.is_empty() {
            // Pool larger than catalog: exclusion leaves nothing, so accept
            // repetition over silence and pick from everything
            let all: Vec<&BufferHandle> = catalog.handles(self.category).collect();
            if all.is_empty() {
                return Err(EngineError::EmptyCatalog(self.category));
            }
            all[numeric_choice(rng, all.len())].clone()
        } else {
            fresh[numeric_choice(rng, fresh.len())].clone()
        };

        self.history.remember(handle.key_arc());
        Ok(handle)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Pool state as reported to the status surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub category: SoundCategory,
    pub stopped: bool,
    pub states: Vec<VoiceState>,
}

/// Manages the sustained bed: a FIFO pool of loop (or drone, depending on
/// the voice factory) voices at fixed pan positions, rotated one voice at a
/// time on a recurring choice tick.
pub struct LoopManager {
    category: SoundCategory,
    factory: SustainedVoiceFactory,
    effects: Vec<EffectBuilder>,
    source: MaterialSource,
    voices: VecDeque<Box<dyn SustainedVoice>>,
    pan_layout: Vec<f32>,
    voices_count: usize,
    change_probability: f64,
    tick_interval: f64,
    swap_delay: f64,
    next_voice_id: u64,
    stopped: bool,
    timer: Option<TimerId>,
}

impl LoopManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        category: SoundCategory,
        factory: SustainedVoiceFactory,
        effects: Vec<EffectBuilder>,
        voices_count: usize,
        change_probability: f64,
        tick_interval: f64,
        swap_delay: f64,
        history_window: usize,
    ) -> Self {
        Self {
            category,
            factory,
            effects,
            source: MaterialSource::new(category, history_window),
            voices: VecDeque::with_capacity(voices_count),
            pan_layout: pan_positions(voices_count),
            voices_count,
            change_probability,
            tick_interval,
            swap_delay,
            next_voice_id: 0,
            stopped: false,
            timer: None,
        }
    }

    /// Ids stay unique across stop/start cycles so a swap completion from a
    /// previous session can never land on a rebuilt pool.
    fn alloc_voice_id(&mut self) -> VoiceId {
        let id = VoiceId::new(self.next_voice_id);
        self.next_voice_id += 1;
        id
    }

    /// Build the pool and start every voice immediately, then register the
    /// recurring choice tick. Works for the first start and for re-arming
    /// after `dispose`.
    pub fn initialise(
        &mut self,
        graph: &mut dyn AudioGraph,
        transport: &mut Transport<EngineEvent>,
        rng: &mut fastrand::Rng,
        catalog: &BufferCatalog,
        notices: &NoticeSender,
    ) -> EngineResult<()> {
        catalog.require_ready(self.category)?;
        self.stopped = false;
        self.source.reset();

        for position in 0..self.voices_count {
            let id = self.alloc_voice_id();
            let mut voice = (self.factory)(graph, id, self.pan_layout[position]);
            let buffer = self.source.next(catalog, rng)?;
            let effect = build_random(graph, rng, &self.effects)?;

            log::debug!(
                "{}: starting {} with {} through {}",
                self.category,
                id,
                buffer.key(),
                effect.name()
            );
            notices.send(Notice::VoiceStarted {
                category: self.category,
                key: buffer.key_arc(),
                effect: effect.name(),
            });
            voice.play(graph, rng, buffer, effect)?;
            self.voices.push_back(voice);
        }

        if let Some(timer) = self.timer.take() {
            transport.cancel(timer);
        }
        self.timer = Some(transport.schedule_repeat(
            EngineEvent::ChoiceTick(self.category),
            self.tick_interval,
            self.tick_interval,
        ));
        Ok(())
    }

    /// The recurring choice: with the configured probability, pop the
    /// oldest voice, start its fade, and push it to the back of the pool.
    /// The replacement material comes up via a scheduled swap completion
    /// once the fade and effect tail are done.
    pub fn tick(
        &mut self,
        graph: &mut dyn AudioGraph,
        transport: &mut Transport<EngineEvent>,
        rng: &mut fastrand::Rng,
        catalog: &BufferCatalog,
        notices: &NoticeSender,
    ) -> EngineResult<()> {
        if self.stopped {
            // Timer fired after dispose; expected, absorb
            return Ok(());
        }
        if !bool_choice(rng, self.change_probability) {
            return Ok(());
        }
        let Some(mut voice) = self.voices.pop_front() else {
            return Ok(());
        };

        let buffer = self.source.next(catalog, rng)?;
        let effect = build_random(graph, rng, &self.effects)?;

        log::debug!(
            "{}: rotating {} to {} through {}",
            self.category,
            voice.id(),
            buffer.key(),
            effect.name()
        );
        notices.send(Notice::VoiceChanged {
            category: self.category,
            key: buffer.key_arc(),
            effect: effect.name(),
        });

        voice.begin_swap(graph, buffer, effect)?;
        let swap_time = transport.now() + self.swap_delay;
        transport.schedule_once(
            swap_time,
            EngineEvent::CompleteSwap {
                category: self.category,
                voice: voice.id(),
            },
        );
        self.voices.push_back(voice);
        Ok(())
    }

    /// Bring up a parked swap. Absorbed when the voice is gone (pool was
    /// rebuilt since) or the manager has stopped.
    pub fn complete_swap(
        &mut self,
        graph: &mut dyn AudioGraph,
        rng: &mut fastrand::Rng,
        voice_id: VoiceId,
    ) -> EngineResult<()> {
        if self.stopped {
            return Ok(());
        }
        match self.voices.iter_mut().find(|voice| voice.id() == voice_id) {
            Some(voice) => voice.complete_swap(graph, rng),
            None => Ok(()),
        }
    }

    /// Synchronous teardown: gate the choice routine, cancel the tick,
    /// dispose and drop every voice.
    pub fn dispose(
        &mut self,
        graph: &mut dyn AudioGraph,
        transport: &mut Transport<EngineEvent>,
        notices: &NoticeSender,
    ) -> EngineResult<()> {
        self.stopped = true;
        if let Some(timer) = self.timer.take() {
            transport.cancel(timer);
        }
        for mut voice in self.voices.drain(..) {
            voice.dispose(graph)?;
        }
        notices.send(Notice::PoolDisposed {
            category: self.category,
        });
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn pool_len(&self) -> usize {
        self.voices.len()
    }

    /// Buffer keys in pool order, oldest-started first.
    pub fn pool_keys(&self) -> Vec<Option<Arc<str>>> {
        self.voices.iter().map(|voice| voice.buffer_key()).collect()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            category: self.category,
            stopped: self.stopped,
            states: self.voices.iter().map(|voice| voice.state()).collect(),
        }
    }
}

/// Manages transient interjections: a small pool of one-shot voices fired
/// at random pan positions whenever the dice and an available voice line up.
pub struct OneShotManager {
    category: SoundCategory,
    effects: Vec<EffectBuilder>,
    source: MaterialSource,
    voices: Vec<OneShotVoice>,
    voices_count: usize,
    volume_db: f32,
    fade: f64,
    reverse_probability: f64,
    play_probability: f64,
    tick_interval: f64,
    start_delay: f64,
    tail_margin: f64,
    next_voice_id: u64,
    stopped: bool,
    timer: Option<TimerId>,
}

impl OneShotManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        category: SoundCategory,
        effects: Vec<EffectBuilder>,
        voices_count: usize,
        volume_db: f32,
        fade: f64,
        reverse_probability: f64,
        play_probability: f64,
        tick_interval: f64,
        start_delay: f64,
        tail_margin: f64,
        history_window: usize,
    ) -> Self {
        Self {
            category,
            effects,
            source: MaterialSource::new(category, history_window),
            voices: Vec::with_capacity(voices_count),
            voices_count,
            volume_db,
            fade,
            reverse_probability,
            play_probability,
            tick_interval,
            start_delay,
            tail_margin,
            next_voice_id: 0,
            stopped: false,
            timer: None,
        }
    }

    fn alloc_voice_id(&mut self) -> VoiceId {
        let id = VoiceId::new(self.next_voice_id);
        self.next_voice_id += 1;
        id
    }

    /// Build an idle pool and register the recurring choice tick. One-shot
    /// voices start silent; the ticks decide when each one first fires.
    pub fn initialise(
        &mut self,
        graph: &mut dyn AudioGraph,
        transport: &mut Transport<EngineEvent>,
        catalog: &BufferCatalog,
    ) -> EngineResult<()> {
        catalog.require_ready(self.category)?;
        self.stopped = false;
        self.source.reset();

        for _ in 0..self.voices_count {
            let id = self.alloc_voice_id();
            self.voices.push(OneShotVoice::new(
                graph,
                id,
                self.volume_db,
                self.fade,
                self.reverse_probability,
            ));
        }

        if let Some(timer) = self.timer.take() {
            transport.cancel(timer);
        }
        self.timer = Some(transport.schedule_repeat(
            EngineEvent::ChoiceTick(self.category),
            self.tick_interval,
            self.start_delay,
        ));
        Ok(())
    }

    /// The recurring choice: find an available voice, roll the dice, and
    /// fire it with fresh material at a random pan position. The self-stop
    /// lands after the buffer's duration plus the tail margin so the effect
    /// decay is not cut off.
    pub fn tick(
        &mut self,
        graph: &mut dyn AudioGraph,
        transport: &mut Transport<EngineEvent>,
        rng: &mut fastrand::Rng,
        catalog: &BufferCatalog,
        notices: &NoticeSender,
    ) -> EngineResult<()> {
        if self.stopped {
            return Ok(());
        }
        let Some(index) = self.voices.iter().position(|voice| voice.is_available()) else {
            // Every voice still sounding; try again next tick
            return Ok(());
        };
        if !bool_choice(rng, self.play_probability) {
            return Ok(());
        }

        let buffer = self.source.next(catalog, rng)?;
        let effect = build_random(graph, rng, &self.effects)?;
        let pan_position = single_pan_position(rng);
        let stop_time = transport.now() + buffer.duration() + self.tail_margin;

        log::debug!(
            "{}: firing {} with {} through {} at pan {}",
            self.category,
            self.voices[index].id(),
            buffer.key(),
            effect.name(),
            pan_position
        );
        notices.send(Notice::OneShotPlayed {
            category: self.category,
            key: buffer.key_arc(),
            effect: effect.name(),
        });

        let voice = &mut self.voices[index];
        let generation = voice.play_new(graph, rng, buffer, effect, pan_position)?;
        transport.schedule_once(
            stop_time,
            EngineEvent::FinishOneShot {
                category: self.category,
                voice: voice.id(),
                generation,
            },
        );
        Ok(())
    }

    /// Scheduled self-stop for one play. Stale generations and voices from
    /// rebuilt pools are absorbed.
    pub fn finish(
        &mut self,
        graph: &mut dyn AudioGraph,
        voice_id: VoiceId,
        generation: u64,
        notices: &NoticeSender,
    ) -> EngineResult<()> {
        let Some(voice) = self.voices.iter_mut().find(|voice| voice.id() == voice_id) else {
            return Ok(());
        };
        if voice.finish(graph, generation)? {
            notices.send(Notice::VoiceFinished {
                category: self.category,
                key: voice.buffer_key(),
            });
        }
        Ok(())
    }

    pub fn dispose(
        &mut self,
        graph: &mut dyn AudioGraph,
        transport: &mut Transport<EngineEvent>,
        notices: &NoticeSender,
    ) -> EngineResult<()> {
        self.stopped = true;
        if let Some(timer) = self.timer.take() {
            transport.cancel(timer);
        }
        for mut voice in self.voices.drain(..) {
            voice.dispose(graph)?;
        }
        notices.send(Notice::PoolDisposed {
            category: self.category,
        });
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn pool_len(&self) -> usize {
        self.voices.len()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            category: self.category,
            stopped: self.stopped,
            states: self.voices.iter().map(|voice| voice.state()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::effects::{one_shot_effects, sustained_effects};
    use crate::audio::offline::OfflineGraph;
    use crate::audio::voices::loop_voice_factory;
    use crate::events::NoticeQueue;

    fn loop_catalog(keys: usize) -> BufferCatalog {
        let mut catalog = BufferCatalog::new();
        for n in 0..keys {
            catalog.insert(SoundCategory::Loops, &format!("audio/loops/{}.wav", n), 12.0);
        }
        catalog.mark_ready(SoundCategory::Loops);
        catalog
    }

    fn one_shot_catalog(keys: usize) -> BufferCatalog {
        let mut catalog = BufferCatalog::new();
        for n in 0..keys {
            catalog.insert(
                SoundCategory::ConcreteOneShots,
                &format!("audio/oneshot/concrete/{}.wav", n),
                1.5,
            );
        }
        catalog.mark_ready(SoundCategory::ConcreteOneShots);
        catalog
    }

    fn loop_manager(voices: usize, change_probability: f64) -> LoopManager {
        LoopManager::new(
            SoundCategory::Loops,
            loop_voice_factory(-12.0, 4.0, 0.25),
            sustained_effects(),
            voices,
            change_probability,
            20.0,
            7.0,
            voices,
        )
    }

    fn one_shot_manager(voices: usize, play_probability: f64) -> OneShotManager {
        OneShotManager::new(
            SoundCategory::ConcreteOneShots,
            one_shot_effects(),
            voices,
            -9.0,
            0.25,
            0.25,
            play_probability,
            2.0,
            10.0,
            3.0,
            voices,
        )
    }

    #[test]
    fn test_recent_history_window_rolls() {
        let mut history = RecentHistory::new(2);
        history.remember(Arc::from("a"));
        history.remember(Arc::from("b"));
        assert!(history.contains("a") && history.contains("b"));

        history.remember(Arc::from("c"));
        assert!(!history.contains("a"), "oldest key should roll out");
        assert!(history.contains("b") && history.contains("c"));
    }

    #[test]
    fn test_material_source_avoids_recent_keys() {
        let catalog = loop_catalog(5);
        let mut source = MaterialSource::new(SoundCategory::Loops, 2);
        let mut rng = fastrand::Rng::with_seed(31);

        let mut previous: Option<String> = None;
        for _ in 0..100 {
            let handle = source.next(&catalog, &mut rng).unwrap();
            if let Some(previous) = &previous {
                assert_ne!(
                    handle.key(),
                    previous.as_str(),
                    "immediate repetition within the history window"
                );
            }
            previous = Some(handle.key().to_string());
        }
    }

    #[test]
    fn test_material_source_falls_back_when_exhausted() {
        // One key, window bigger than the catalog: exclusion empties the
        // candidate set every time
        let catalog = loop_catalog(1);
        let mut source = MaterialSource::new(SoundCategory::Loops, 2);
        let mut rng = fastrand::Rng::with_seed(32);

        for _ in 0..10 {
            let handle = source.next(&catalog, &mut rng).unwrap();
            assert_eq!(handle.key(), "audio/loops/0.wav");
        }
    }

    #[test]
    fn test_material_source_empty_catalog_is_an_error() {
        let mut catalog = BufferCatalog::new();
        catalog.mark_ready(SoundCategory::Loops);
        let mut source = MaterialSource::new(SoundCategory::Loops, 2);
        let mut rng = fastrand::Rng::with_seed(33);

        assert!(matches!(
            source.next(&catalog, &mut rng),
            Err(EngineError::EmptyCatalog(SoundCategory::Loops))
        ));
    }

    #[test]
    fn test_loop_manager_initialise_starts_full_pool() {
        let catalog = loop_catalog(5);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        let mut rng = fastrand::Rng::with_seed(34);
        let notices = NoticeQueue::new();
        let mut manager = loop_manager(2, 0.5);

        manager
            .initialise(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.states, vec![VoiceState::Playing; 2]);
        assert!(!snapshot.stopped);
        assert_eq!(graph.live_of_kind("player").len(), 2);

        // Two distinct buffers assigned
        let keys = manager.pool_keys();
        assert_ne!(keys[0], keys[1], "pool voices should start on different material");
    }

    #[test]
    fn test_loop_manager_requires_ready_catalog() {
        // Content present but readiness never signalled by the loader
        let mut catalog = BufferCatalog::new();
        catalog.insert(SoundCategory::Loops, "audio/loops/0.wav", 12.0);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        let mut rng = fastrand::Rng::with_seed(35);
        let notices = NoticeQueue::new();
        let mut manager = loop_manager(2, 0.5);

        assert!(matches!(
            manager.initialise(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender()),
            Err(EngineError::CatalogNotReady(SoundCategory::Loops))
        ));
    }

    #[test]
    fn test_loop_tick_rotates_fifo_head() {
        let catalog = loop_catalog(5);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(36);
        let notices = NoticeQueue::new();
        // change probability 1: every tick rotates
        let mut manager = loop_manager(2, 1.0);

        manager
            .initialise(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        let before = manager.pool_keys();

        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();

        let after = manager.pool_keys();
        assert_eq!(manager.pool_len(), 2, "rotation must keep the pool size");
        assert_eq!(
            after[0], before[1],
            "previous second voice should now be the oldest"
        );
        assert_ne!(after[1], before[0], "retired voice should carry new material");

        let snapshot = manager.snapshot();
        assert_eq!(
            snapshot.states,
            vec![VoiceState::Playing, VoiceState::FadingOut],
            "retired voice fades at the back of the pool"
        );
    }

    #[test]
    fn test_loop_swap_completes_via_scheduled_event() {
        let catalog = loop_catalog(5);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(37);
        let notices = NoticeQueue::new();
        let mut manager = loop_manager(2, 1.0);

        manager
            .initialise(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();

        // The completion was scheduled at now + swap delay
        transport.advance(7.0);
        let event = transport.pop_due().expect("swap completion should be due");
        match event {
            EngineEvent::CompleteSwap { voice, .. } => {
                manager.complete_swap(&mut graph, &mut rng, voice).unwrap();
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert_eq!(manager.snapshot().states, vec![VoiceState::Playing; 2]);
    }

    #[test]
    fn test_loop_tick_probability_zero_never_rotates() {
        let catalog = loop_catalog(5);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(38);
        let notices = NoticeQueue::new();
        let mut manager = loop_manager(2, 0.0);

        manager
            .initialise(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        let before = manager.pool_keys();

        for _ in 0..20 {
            manager
                .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
                .unwrap();
        }
        assert_eq!(manager.pool_keys(), before);
    }

    #[test]
    fn test_loop_dispose_then_initialise_round_trip() {
        let catalog = loop_catalog(5);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(39);
        let notices = NoticeQueue::new();
        let mut manager = loop_manager(2, 0.5);

        manager
            .initialise(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        manager
            .dispose(&mut graph, &mut transport, &notices.sender())
            .unwrap();

        assert!(manager.is_stopped());
        assert_eq!(manager.pool_len(), 0);
        assert_eq!(graph.live_count(), 0, "dispose must release every node");
        assert!(
            notices.receiver().drain().contains(&Notice::PoolDisposed {
                category: SoundCategory::Loops
            }),
            "teardown should be announced"
        );

        // Ticks landing after dispose are absorbed
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();

        manager
            .initialise(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        let snapshot = manager.snapshot();
        assert!(!snapshot.stopped);
        assert_eq!(snapshot.states, vec![VoiceState::Playing; 2]);
    }

    #[test]
    fn test_one_shot_tick_fires_available_voice() {
        let catalog = one_shot_catalog(4);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(40);
        let notices = NoticeQueue::new();
        // probability 1: fires whenever a voice is free
        let mut manager = one_shot_manager(2, 1.0);

        manager
            .initialise(&mut graph, &mut transport, &catalog)
            .unwrap();
        assert_eq!(manager.snapshot().states, vec![VoiceState::Idle; 2]);

        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        let states = manager.snapshot().states;
        assert_eq!(states[0], VoiceState::Playing, "first available voice fires");
        assert_eq!(states[1], VoiceState::Idle);
    }

    #[test]
    fn test_one_shot_saturated_pool_is_a_no_op() {
        let catalog = one_shot_catalog(4);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(41);
        let notices = NoticeQueue::new();
        let mut manager = one_shot_manager(2, 1.0);

        manager
            .initialise(&mut graph, &mut transport, &catalog)
            .unwrap();
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        assert_eq!(manager.snapshot().states, vec![VoiceState::Playing; 2]);
        let live_before = graph.live_count();

        // All voices busy: the tick must do nothing and must not fail
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        assert_eq!(graph.live_count(), live_before);
        assert_eq!(manager.snapshot().states, vec![VoiceState::Playing; 2]);
    }

    #[test]
    fn test_one_shot_finish_frees_the_voice() {
        let catalog = one_shot_catalog(4);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(42);
        let notices = NoticeQueue::new();
        let mut manager = one_shot_manager(1, 1.0);

        manager
            .initialise(&mut graph, &mut transport, &catalog)
            .unwrap();
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();

        // Buffer 1.5s + tail 3s: stop is due at 4.5
        transport.advance(4.5);
        let event = transport.pop_due().expect("finish should be scheduled");
        match event {
            EngineEvent::FinishOneShot {
                voice, generation, ..
            } => {
                manager
                    .finish(&mut graph, voice, generation, &notices.sender())
                    .unwrap();
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert_eq!(manager.snapshot().states, vec![VoiceState::Stopped]);
        let finished: Vec<Notice> = notices
            .receiver()
            .drain()
            .into_iter()
            .filter(|notice| matches!(notice, Notice::VoiceFinished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);

        // Freed voice can fire again
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();
        assert_eq!(manager.snapshot().states, vec![VoiceState::Playing]);
    }

    #[test]
    fn test_one_shot_dispose_initialise_round_trip() {
        let catalog = one_shot_catalog(4);
        let mut graph = OfflineGraph::new();
        let mut transport = Transport::new();
        transport.start();
        let mut rng = fastrand::Rng::with_seed(43);
        let notices = NoticeQueue::new();
        let mut manager = one_shot_manager(2, 1.0);

        manager
            .initialise(&mut graph, &mut transport, &catalog)
            .unwrap();
        manager
            .tick(&mut graph, &mut transport, &mut rng, &catalog, &notices.sender())
            .unwrap();

        manager
            .dispose(&mut graph, &mut transport, &notices.sender())
            .unwrap();
        assert_eq!(graph.live_count(), 0);
        assert_eq!(manager.pool_len(), 0);

        manager
            .initialise(&mut graph, &mut transport, &catalog)
            .unwrap();
        assert_eq!(manager.pool_len(), 2);
        assert!(!manager.is_stopped());
    }
}
