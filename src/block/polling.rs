use super::{Block, BlockState, Status, Update};
use crate::error::BlockError;
use crate::protocol::ClickEvent;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// The data-fetch step of a polling block
pub trait Fetch: Send + Sync {
    fn fetch(&self) -> Result<Update, BlockError>;

    /// Side effect of a click, the block refreshes afterwards
    fn click(&self, _event: &ClickEvent) -> Result<(), BlockError> {
        Ok(())
    }
}

/// Re-runs its fetch step every `interval` until the step fails once.
pub struct PollingBlock<F> {
    state: BlockState,
    interval: Duration,
    source: F,
    status: RwLock<Status>,
}

impl<F: Fetch> PollingBlock<F> {
    #[must_use]
    pub fn new(state: BlockState, interval: Duration, source: F) -> Self {
        Self {
            state,
            interval,
            source,
            status: RwLock::new(Status::Active),
        }
    }

    #[must_use]
    pub fn source(&self) -> &F {
        &self.source
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs the fetch step now. Does nothing once the block has failed.
    #[must_use]
    pub fn refresh(&self) -> Status {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if let Status::Failed(_) = *status {
            return status.clone();
        }
        match self.source.fetch() {
            Ok(update) => self.state.update(update),
            Err(e) => *status = self.state.fail(e),
        }
        status.clone()
    }
}

#[async_trait::async_trait]
impl<F: Fetch> Block for PollingBlock<F> {
    fn state(&self) -> &BlockState {
        &self.state
    }

    fn click(&self, event: &ClickEvent) {
        if let Status::Failed(_) = self.status() {
            return;
        }
        if let Err(e) = self.source.click(event) {
            *self.status.write().unwrap_or_else(PoisonError::into_inner) = self.state.fail(e);
            return;
        }
        let _idc = self.refresh();
    }

    fn signal(&self, _signal: i32) {
        let _idc = self.refresh();
    }

    async fn run(&self) -> Status {
        loop {
            let status = self.refresh();
            if let Status::Failed(_) = status {
                return status;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
