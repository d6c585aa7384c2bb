//! Offline audition of the composition engine.
//!
//! Builds a synthetic buffer catalog, runs the engine against the
//! instrumented offline graph for a couple of start/stop cycles, and prints
//! what the composition decided to do. Useful for eyeballing the choice
//! behavior without an audio backend.

use everchanging_sound_machine::{
    BufferCatalog, CommandQueue, Director, EngineCommand, EngineConfig, Notice, NoticeQueue,
    OfflineGraph, SoundCategory,
};

fn synthetic_catalog() -> BufferCatalog {
    let mut catalog = BufferCatalog::new();

    let loops = [
        ("audio/loops/tide.wav", 14.2),
        ("audio/loops/hum.wav", 9.7),
        ("audio/loops/rain-on-glass.wav", 18.5),
        ("audio/loops/turbine.wav", 11.0),
        ("audio/loops/chimes-distant.wav", 16.3),
    ];
    for (key, duration) in loops {
        catalog.insert(SoundCategory::Loops, key, duration);
    }

    let concrete = [
        ("audio/oneshot/concrete/door.wav", 1.2),
        ("audio/oneshot/concrete/gravel.wav", 2.1),
        ("audio/oneshot/concrete/latch.wav", 0.8),
        ("audio/oneshot/concrete/cup.wav", 1.6),
    ];
    for (key, duration) in concrete {
        catalog.insert(SoundCategory::ConcreteOneShots, key, duration);
    }

    let instrumental = [
        ("audio/oneshot/instrumental/piano-e3.wav", 3.4),
        ("audio/oneshot/instrumental/cello-swell.wav", 5.1),
        ("audio/oneshot/instrumental/vibraphone-a4.wav", 4.0),
        ("audio/oneshot/instrumental/guitar-harmonic.wav", 2.7),
    ];
    for (key, duration) in instrumental {
        catalog.insert(SoundCategory::InstrumentalOneShots, key, duration);
    }

    for category in [
        SoundCategory::Loops,
        SoundCategory::ConcreteOneShots,
        SoundCategory::InstrumentalOneShots,
    ] {
        catalog.mark_ready(category);
    }
    catalog
}

fn print_notice(now: f64, notice: &Notice) {
    match notice {
        Notice::EngineStarted => println!("[{:6.1}] engine started", now),
        Notice::EngineStopped => println!("[{:6.1}] engine stopped", now),
        Notice::VoiceStarted {
            category,
            key,
            effect,
        } => println!("[{:6.1}] {} -> {} through {}", now, category, key, effect),
        Notice::VoiceChanged {
            category,
            key,
            effect,
        } => println!("[{:6.1}] {} rotates to {} through {}", now, category, key, effect),
        Notice::OneShotPlayed {
            category,
            key,
            effect,
        } => println!("[{:6.1}] {} fires {} through {}", now, category, key, effect),
        Notice::VoiceFinished { category, key } => println!(
            "[{:6.1}] {} finished {}",
            now,
            category,
            key.as_deref().unwrap_or("(none)")
        ),
        Notice::PoolDisposed { category } => {
            println!("[{:6.1}] {} pool disposed", now, category)
        }
    }
}

fn main() {
    env_logger::init();

    let commands = CommandQueue::new();
    let notices = NoticeQueue::new();
    let sender = commands.sender();
    let receiver = notices.receiver();

    let mut director = Director::new(
        EngineConfig::default(),
        synthetic_catalog(),
        OfflineGraph::new(),
        fastrand::Rng::new(),
        commands.receiver(),
        notices.sender(),
    )
    .expect("catalog and config are well-formed");

    // Two sessions with a restart in between, one clock second per pump
    sender.send(EngineCommand::Start);
    for session in 0..2 {
        for _ in 0..90 {
            director.pump(1.0).expect("offline pump cannot fail");
            for notice in receiver.drain() {
                print_notice(director.now(), &notice);
            }
        }
        sender.send(EngineCommand::Stop);
        director.pump(0.0).expect("offline pump cannot fail");
        for notice in receiver.drain() {
            print_notice(director.now(), &notice);
        }
        if session == 0 {
            sender.send(EngineCommand::Start);
        }
    }

    let graph = director.graph();
    println!(
        "created {} nodes, disposed {}, live {}",
        graph.created_count(),
        graph.disposed_count(),
        graph.live_count()
    );
    if graph.live_count() != 0 {
        log::error!("leak: {} nodes still allocated after stop", graph.live_count());
        std::process::exit(1);
    }
}
