//! Command queue between producers (control sessions) and the manager.
//!
//! The queue is the only synchronized resource on the write path.  Any number
//! of [`CommandSender`]s may enqueue concurrently; exactly one
//! [`CommandQueue`] drains, so commands are applied in the order they were
//! enqueued.

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use retroboard_core::Command;

/// Cloneable producer handle.  It can only enqueue.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: UnboundedSender<Command>,
}

impl CommandSender {
    /// Appends `command` to the queue.
    ///
    /// Returns `false` if the manager has already gone away.
    pub fn enqueue(&self, command: Command) -> bool {
        let action = command.action();
        match self.tx.send(command) {
            Ok(()) => true,
            Err(_) => {
                warn!(action, "command dropped: manager is no longer running");
                false
            }
        }
    }
}

/// Consumer side of the queue, owned by the manager.
#[derive(Debug)]
pub struct CommandQueue {
    rx: UnboundedReceiver<Command>,
    // Kept so the channel never reports "disconnected" while the manager runs.
    tx: UnboundedSender<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Creates a new producer handle.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Removes and returns every command currently queued, oldest first.
    /// Never blocks.
    pub fn drain(&mut self) -> Vec<Command> {
        let mut drained = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(command) => drained.push(command),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
