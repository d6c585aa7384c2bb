use crossbeam::queue::SegQueue;
use std::sync::Arc;

use crate::catalog::SoundCategory;

/// Engine notice - sent from the engine to whoever is observing it (status
/// display, demo printer, tests). Purely informational; dropping notices on
/// the floor changes nothing about playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    EngineStarted,
    EngineStopped,
    /// A voice came up as part of pool initialisation.
    VoiceStarted {
        category: SoundCategory,
        key: Arc<str>,
        effect: &'static str,
    },
    /// A sustained voice began rotating to new material.
    VoiceChanged {
        category: SoundCategory,
        key: Arc<str>,
        effect: &'static str,
    },
    /// A one-shot voice fired.
    OneShotPlayed {
        category: SoundCategory,
        key: Arc<str>,
        effect: &'static str,
    },
    /// A one-shot voice retired itself after its buffer and tail ran out.
    VoiceFinished {
        category: SoundCategory,
        key: Option<Arc<str>>,
    },
    /// A manager tore down its whole pool.
    PoolDisposed { category: SoundCategory },
}

/// Lock-free notice queue out of the engine.
pub struct NoticeQueue {
    queue: Arc<SegQueue<Notice>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    /// Get a handle for emitting notices (held by the engine)
    pub fn sender(&self) -> NoticeSender {
        NoticeSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Get a handle for draining notices (for the observer)
    pub fn receiver(&self) -> NoticeReceiver {
        NoticeReceiver {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender handle for the engine
#[derive(Clone)]
pub struct NoticeSender {
    queue: Arc<SegQueue<Notice>>,
}

impl NoticeSender {
    /// Emit a notice (non-blocking)
    pub fn send(&self, notice: Notice) {
        self.queue.push(notice);
    }
}

/// Receiver handle for the observer
pub struct NoticeReceiver {
    queue: Arc<SegQueue<Notice>>,
}

impl NoticeReceiver {
    /// Pop one pending notice, if any
    pub fn recv(&self) -> Option<Notice> {
        self.queue.pop()
    }

    /// Drain everything currently queued
    pub fn drain(&self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Some(notice) = self.queue.pop() {
            notices.push(notice);
        }
        notices
    }
}
