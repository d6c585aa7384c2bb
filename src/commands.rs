use crossbeam::queue::SegQueue;
use std::sync::Arc;

/// Control-surface commands. Start and stop are the whole surface; every
/// other decision belongs to the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Start,
    Stop,
}

/// Lock-free command queue between the control surface and the engine.
/// Uses a multiple-producer, single-consumer queue from crossbeam
pub struct CommandQueue {
    queue: Arc<SegQueue<EngineCommand>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    /// Get a handle for sending commands (for the control surface)
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Get a handle for receiving commands (for the engine pump)
    pub fn receiver(&self) -> CommandReceiver {
        CommandReceiver {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender handle for the control surface
#[derive(Clone)]
pub struct CommandSender {
    queue: Arc<SegQueue<EngineCommand>>,
}

impl CommandSender {
    /// Send a command to the engine (non-blocking)
    pub fn send(&self, command: EngineCommand) {
        self.queue.push(command);
    }
}

/// Receiver handle for the engine
pub struct CommandReceiver {
    queue: Arc<SegQueue<EngineCommand>>,
}

impl CommandReceiver {
    /// Pop one pending command, if any
    pub fn recv(&self) -> Option<EngineCommand> {
        self.queue.pop()
    }

    /// Check if there are pending commands
    pub fn has_commands(&self) -> bool {
        !self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_arrive_in_order() {
        let queue = CommandQueue::new();
        let sender = queue.sender();
        let receiver = queue.receiver();

        sender.send(EngineCommand::Start);
        sender.send(EngineCommand::Stop);

        assert!(receiver.has_commands());
        assert_eq!(receiver.recv(), Some(EngineCommand::Start));
        assert_eq!(receiver.recv(), Some(EngineCommand::Stop));
        assert_eq!(receiver.recv(), None);
    }

    #[test]
    fn test_cloned_senders_share_the_queue() {
        let queue = CommandQueue::new();
        let first = queue.sender();
        let second = first.clone();
        let receiver = queue.receiver();

        first.send(EngineCommand::Start);
        second.send(EngineCommand::Stop);

        assert_eq!(receiver.recv(), Some(EngineCommand::Start));
        assert_eq!(receiver.recv(), Some(EngineCommand::Stop));
    }
}
