//! Composition director
//!
//! The composition root: owns the buffer catalog, the shared transport, the
//! RNG, and one manager per sound category, and fans `start`/`stop` out to
//! them. The director holds no audio nodes of its own.
//!
//! The owner drives everything through `pump`: drain control commands,
//! advance the clock, dispatch whatever came due. Between pumps the engine
//! is idle; nothing blocks, and every wait is a scheduled event.

use crate::audio::effects::{one_shot_effects, sustained_effects};
use crate::audio::voices::{drone_voice_factory, loop_voice_factory, VoiceId};
use crate::audio::AudioGraph;
use crate::catalog::{BufferCatalog, SoundCategory};
use crate::commands::{CommandReceiver, EngineCommand};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::{Notice, NoticeSender};
use crate::sequencing::managers::{LoopManager, OneShotManager, PoolSnapshot};
use crate::sequencing::transport::Transport;

/// Events carried by the shared transport. Every timer in the engine
/// resolves to one of these; the director routes each to its manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// A manager's recurring choice tick.
    ChoiceTick(SoundCategory),
    /// A loop/drone voice's fade has run; bring up the parked replacement.
    CompleteSwap {
        category: SoundCategory,
        voice: VoiceId,
    },
    /// A one-shot play has sounded out; stop the voice.
    FinishOneShot {
        category: SoundCategory,
        voice: VoiceId,
        generation: u64,
    },
}

// Commands drained per pump. Start/stop churn beyond this just waits a pump.
const MAX_COMMANDS_PER_PUMP: usize = 16;

pub struct Director<G: AudioGraph> {
    config: EngineConfig,
    catalog: BufferCatalog,
    graph: G,
    transport: Transport<EngineEvent>,
    rng: fastrand::Rng,

    loops: LoopManager,
    drones: Option<LoopManager>,
    concrete: OneShotManager,
    instrumental: OneShotManager,

    commands: CommandReceiver,
    notices: NoticeSender,
    running: bool,
}

impl<G: AudioGraph> Director<G> {
    /// Wire up the composition. Fails fast if the config is invalid or any
    /// category the configuration needs has not been loaded.
    pub fn new(
        config: EngineConfig,
        catalog: BufferCatalog,
        graph: G,
        rng: fastrand::Rng,
        commands: CommandReceiver,
        notices: NoticeSender,
    ) -> EngineResult<Self> {
        config.validate()?;
        catalog.require_ready(SoundCategory::Loops)?;
        catalog.require_ready(SoundCategory::ConcreteOneShots)?;
        catalog.require_ready(SoundCategory::InstrumentalOneShots)?;
        if config.drones_enabled {
            catalog.require_ready(SoundCategory::Drones)?;
        }

        let loops = LoopManager::new(
            SoundCategory::Loops,
            loop_voice_factory(
                config.loop_volume_db,
                config.loop_fade,
                config.reverse_probability,
            ),
            sustained_effects(),
            config.loops_count,
            config.loop_change_probability,
            config.loop_tick_interval,
            config.loop_swap_delay(),
            config.history_window,
        );
        let drones = config.drones_enabled.then(|| {
            LoopManager::new(
                SoundCategory::Drones,
                drone_voice_factory(
                    config.drone_volume_db,
                    config.loop_fade,
                    config.reverse_probability,
                    (config.drone_rate_min, config.drone_rate_max),
                ),
                sustained_effects(),
                config.drones_count,
                config.loop_change_probability,
                config.loop_tick_interval,
                config.loop_swap_delay(),
                config.history_window,
            )
        });
        let concrete = OneShotManager::new(
            SoundCategory::ConcreteOneShots,
            one_shot_effects(),
            config.one_shots_count,
            config.concrete_volume_db,
            config.one_shot_fade,
            config.reverse_probability,
            config.one_shot_probability,
            config.one_shot_tick_interval,
            config.one_shot_start_delay,
            config.tail_margin,
            config.history_window,
        );
        let instrumental = OneShotManager::new(
            SoundCategory::InstrumentalOneShots,
            one_shot_effects(),
            config.one_shots_count,
            config.instrumental_volume_db,
            config.one_shot_fade,
            config.reverse_probability,
            config.one_shot_probability,
            config.one_shot_tick_interval,
            config.one_shot_start_delay,
            config.tail_margin,
            config.history_window,
        );

        Ok(Self {
            config,
            catalog,
            graph,
            transport: Transport::new(),
            rng,
            loops,
            drones,
            concrete,
            instrumental,
            commands,
            notices,
            running: false,
        })
    }

    /// (Re)initialise every manager and run the clock. Safe to call on a
    /// running engine (no-op) and after a prior `stop` (rebuilds the pools).
    pub fn start(&mut self) -> EngineResult<()> {
        if self.running {
            return Ok(());
        }

        self.loops.initialise(
            &mut self.graph,
            &mut self.transport,
            &mut self.rng,
            &self.catalog,
            &self.notices,
        )?;
        if let Some(drones) = self.drones.as_mut() {
            drones.initialise(
                &mut self.graph,
                &mut self.transport,
                &mut self.rng,
                &self.catalog,
                &self.notices,
            )?;
        }
        self.concrete
            .initialise(&mut self.graph, &mut self.transport, &self.catalog)?;
        self.instrumental
            .initialise(&mut self.graph, &mut self.transport, &self.catalog)?;

        self.transport.start();
        self.running = true;
        self.notices.send(Notice::EngineStarted);
        log::info!("engine started at clock time {}", self.transport.now());
        Ok(())
    }

    /// Dispose every manager, then pause the clock. Disposal runs first so
    /// no node outlives the stop.
    pub fn stop(&mut self) -> EngineResult<()> {
        if !self.running {
            return Ok(());
        }

        self.loops
            .dispose(&mut self.graph, &mut self.transport, &self.notices)?;
        if let Some(drones) = self.drones.as_mut() {
            drones.dispose(&mut self.graph, &mut self.transport, &self.notices)?;
        }
        self.concrete
            .dispose(&mut self.graph, &mut self.transport, &self.notices)?;
        self.instrumental
            .dispose(&mut self.graph, &mut self.transport, &self.notices)?;

        self.transport.stop();
        self.running = false;
        self.notices.send(Notice::EngineStopped);
        log::info!("engine stopped at clock time {}", self.transport.now());
        Ok(())
    }

    /// One cooperative step: apply pending commands, move the clock by
    /// `dt` seconds, dispatch everything that came due.
    pub fn pump(&mut self, dt: f64) -> EngineResult<()> {
        self.drain_commands()?;
        self.transport.advance(dt);
        while let Some(event) = self.transport.pop_due() {
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn drain_commands(&mut self) -> EngineResult<()> {
        for _ in 0..MAX_COMMANDS_PER_PUMP {
            match self.commands.recv() {
                Some(EngineCommand::Start) => self.start()?,
                Some(EngineCommand::Stop) => self.stop()?,
                None => break,
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: EngineEvent) -> EngineResult<()> {
        match event {
            EngineEvent::ChoiceTick(category) => match category {
                SoundCategory::Loops => self.loops.tick(
                    &mut self.graph,
                    &mut self.transport,
                    &mut self.rng,
                    &self.catalog,
                    &self.notices,
                ),
                SoundCategory::Drones => match self.drones.as_mut() {
                    Some(drones) => drones.tick(
                        &mut self.graph,
                        &mut self.transport,
                        &mut self.rng,
                        &self.catalog,
                        &self.notices,
                    ),
                    None => Ok(()),
                },
                SoundCategory::ConcreteOneShots => self.concrete.tick(
                    &mut self.graph,
                    &mut self.transport,
                    &mut self.rng,
                    &self.catalog,
                    &self.notices,
                ),
                SoundCategory::InstrumentalOneShots => self.instrumental.tick(
                    &mut self.graph,
                    &mut self.transport,
                    &mut self.rng,
                    &self.catalog,
                    &self.notices,
                ),
            },
            EngineEvent::CompleteSwap { category, voice } => match category {
                SoundCategory::Loops => {
                    self.loops
                        .complete_swap(&mut self.graph, &mut self.rng, voice)
                }
                SoundCategory::Drones => match self.drones.as_mut() {
                    Some(drones) => drones.complete_swap(&mut self.graph, &mut self.rng, voice),
                    None => Ok(()),
                },
                // One-shot categories never schedule swaps
                _ => Ok(()),
            },
            EngineEvent::FinishOneShot {
                category,
                voice,
                generation,
            } => match category {
                SoundCategory::ConcreteOneShots => {
                    self.concrete
                        .finish(&mut self.graph, voice, generation, &self.notices)
                }
                SoundCategory::InstrumentalOneShots => {
                    self.instrumental
                        .finish(&mut self.graph, voice, generation, &self.notices)
                }
                // Sustained categories never schedule finishes
                _ => Ok(()),
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn now(&self) -> f64 {
        self.transport.now()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Pool states across every manager, for the status surface.
    pub fn snapshot(&self) -> Vec<PoolSnapshot> {
        let mut pools = vec![self.loops.snapshot()];
        if let Some(drones) = self.drones.as_ref() {
            pools.push(drones.snapshot());
        }
        pools.push(self.concrete.snapshot());
        pools.push(self.instrumental.snapshot());
        pools
    }
}
