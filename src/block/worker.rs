use super::{Block, BlockState, Status, Update};
use crate::error::BlockError;
use crate::protocol::ClickEvent;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc as async_mpsc, oneshot};

/// How many updates a worker may queue before it has to wait
const UPDATE_BACKLOG: usize = 8;

/// Hands updates from a worker thread to the block
#[derive(Debug, Clone)]
pub struct Publisher(async_mpsc::Sender<Update>);

impl Publisher {
    /// Returns `false` once the block is gone and the worker should quit
    #[must_use]
    pub fn publish(&self, update: Update) -> bool {
        self.0.blocking_send(update).is_ok()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// A data source that blocks, driven from a dedicated thread
pub trait Worker: Send + 'static {
    type Command: Send + 'static;

    /// Translates a click into a command for the worker
    fn command(event: &ClickEvent) -> Option<Self::Command>;

    /// Runs on the worker thread until the source is exhausted or fails
    ///
    /// # Errors
    /// Errors turn the block into its failed state
    fn run(self, updates: &Publisher, commands: Receiver<Self::Command>) -> Result<(), BlockError>;
}

pub struct EventBlock<W: Worker> {
    state: BlockState,
    commands: Sender<W::Command>,
    /// Taken when the update loop starts
    pending: Mutex<Option<(W, Receiver<W::Command>)>>,
}

impl<W: Worker> EventBlock<W> {
    #[must_use]
    pub fn new(state: BlockState, worker: W) -> Self {
        let (commands, receiver) = mpsc::channel();
        Self {
            state,
            commands,
            pending: Mutex::new(Some((worker, receiver))),
        }
    }
}

#[async_trait::async_trait]
impl<W: Worker> Block for EventBlock<W> {
    fn state(&self) -> &BlockState {
        &self.state
    }

    fn click(&self, event: &ClickEvent) {
        if let Some(command) = W::command(event) {
            if self.commands.send(command).is_err() {
                tracing::debug!(block = %self.state.key(), "Worker gone, dropping click");
            }
        }
    }

    async fn run(&self) -> Status {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some((worker, commands)) = pending else {
            return Status::Active;
        };

        let (sender, mut updates) = async_mpsc::channel(UPDATE_BACKLOG);
        let (done_sender, done) = oneshot::channel();
        let spawned = std::thread::Builder::new()
            .name(format!("block-{}", self.state.name()))
            .spawn(move || {
                let result = worker.run(&Publisher(sender), commands);
                let _idc = done_sender.send(result);
            });
        if let Err(e) = spawned {
            return self.state.fail(e);
        }

        while let Some(update) = updates.recv().await {
            self.state.update(update);
        }

        match done.await {
            Ok(Ok(())) => Status::Active,
            Ok(Err(e)) => self.state.fail(e),
            Err(_) => self.state.fail(BlockError::WorkerPanicked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Publishes whatever it is told through its commands
    struct Echo {
        fail_after: bool,
    }

    impl Worker for Echo {
        type Command = String;

        fn command(event: &ClickEvent) -> Option<String> {
            event.name.clone()
        }

        fn run(self, updates: &Publisher, commands: Receiver<String>) -> Result<(), BlockError> {
            if !updates.publish(Update::new("ready")) {
                return Ok(());
            }
            for text in commands {
                if text == "quit" {
                    break;
                }
                if !updates.publish(Update::new(text)) {
                    return Ok(());
                }
            }
            if self.fail_after {
                return Err(BlockError::Missing("echo"));
            }
            Ok(())
        }
    }

    fn click(name: &str) -> ClickEvent {
        ClickEvent {
            name: Some(name.to_owned()),
            ..ClickEvent::default()
        }
    }

    #[tokio::test]
    async fn updates_flow_from_worker_thread() {
        let block = EventBlock::new(BlockState::new("Echo"), Echo { fail_after: false });
        block.click(&click("hello"));
        block.click(&click("quit"));
        assert_eq!(block.run().await, Status::Active);
        assert_eq!(block.result().full_text, "hello");
        // Only runs once
        assert_eq!(block.run().await, Status::Active);
    }

    #[tokio::test]
    async fn worker_error_fails_block() {
        let block = EventBlock::new(BlockState::new("Echo"), Echo { fail_after: true });
        block.click(&click("quit"));
        let status = block.run().await;
        assert!(matches!(status, Status::Failed(_)));
        let result = block.result();
        assert!(result.full_text.contains("Echo"));
        assert_eq!(result.style.urgent, Some(true));
    }
}
