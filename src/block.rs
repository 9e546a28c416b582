pub mod polling;
pub mod worker;

use crate::protocol::{ClickEvent, I3Block, Markup, Style};
use std::fmt;
use std::sync::{PoisonError, RwLock};

pub use polling::{Fetch, PollingBlock};
pub use worker::{EventBlock, Publisher, Worker};

/// Instance used when a block does not name one
pub const DEFAULT_INSTANCE: &str = "default";

/// Identifies a block inside the registry and in click events
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    pub name: String,
    pub instance: String,
}

impl BlockKey {
    #[must_use]
    pub fn new(name: impl Into<String>, instance: Option<&str>) -> Self {
        Self {
            name: name.into(),
            instance: instance.unwrap_or(DEFAULT_INSTANCE).to_owned(),
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.instance)
    }
}

/// Where a block's update process stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Active,
    /// Terminal, the diagnostic is what the block keeps showing
    Failed(String),
}

/// New content for a block. Style fields left unset fall back to the
/// block's construction-time style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    pub full_text: String,
    pub short_text: Option<String>,
    pub style: Style,
}

impl Update {
    #[must_use]
    pub fn new(full_text: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn short_text(mut self, short_text: impl Into<String>) -> Self {
        self.short_text = Some(short_text.into());
        self
    }

    #[must_use]
    pub fn color(mut self, color: Option<&str>) -> Self {
        self.style.color = color.map(ToOwned::to_owned);
        self
    }

    #[must_use]
    pub fn urgent(mut self, urgent: bool) -> Self {
        self.style.urgent = Some(urgent);
        self
    }

    #[must_use]
    pub fn markup(mut self, markup: Markup) -> Self {
        self.style.markup = Some(markup);
        self
    }

    #[must_use]
    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

/// Identity, default style and current snapshot of a block.
///
/// The snapshot is replaced as a whole, so readers never observe half an
/// update.
#[derive(Debug)]
pub struct BlockState {
    key: BlockKey,
    defaults: Style,
    snapshot: RwLock<I3Block>,
}

impl BlockState {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let key = BlockKey::new(name, None);
        let snapshot = RwLock::new(render(&key, &Style::base(), Update::default()));
        Self {
            key,
            defaults: Style::base(),
            snapshot,
        }
    }

    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.key.instance = instance.into();
        self.update(Update::default());
        self
    }

    /// Sets the construction-time style, unset fields keep the protocol defaults
    #[must_use]
    pub fn with_style(mut self, style: Style) -> Self {
        self.defaults = style.or(&Style::base());
        self.update(Update::default());
        self
    }

    #[must_use]
    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn update(&self, update: Update) {
        let snapshot = render(&self.key, &self.defaults, update);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    #[must_use]
    pub fn result(&self) -> I3Block {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the snapshot with an urgent diagnostic
    #[must_use]
    pub fn fail(&self, reason: impl fmt::Display) -> Status {
        let message = format!("Error in {}: {reason}", self.key.name);
        tracing::error!(block = %self.key, "{message}");
        self.update(Update::new(message.clone()).urgent(true));
        Status::Failed(message)
    }
}

fn render(key: &BlockKey, defaults: &Style, update: Update) -> I3Block {
    I3Block {
        name: key.name.clone(),
        instance: key.instance.clone(),
        full_text: update.full_text,
        short_text: update.short_text,
        style: update.style.or(defaults),
    }
}

/// A unit that renders one status fragment and reacts to clicks and signals
#[async_trait::async_trait]
pub trait Block: Send + Sync {
    fn state(&self) -> &BlockState;

    fn key(&self) -> &BlockKey {
        self.state().key()
    }

    fn result(&self) -> I3Block {
        self.state().result()
    }

    fn click(&self, _event: &ClickEvent) {}

    fn signal(&self, _signal: i32) {}

    /// Long running update process, returns once the block stops updating
    async fn run(&self) -> Status;
}

/// A block whose text never changes
pub struct StaticBlock {
    state: BlockState,
}

impl StaticBlock {
    #[must_use]
    pub fn new(state: BlockState, update: Update) -> Self {
        state.update(update);
        Self { state }
    }

    /// Keeps showing whatever `state` currently holds
    #[must_use]
    pub fn keep(state: BlockState) -> Self {
        Self { state }
    }
}

#[async_trait::async_trait]
impl Block for StaticBlock {
    fn state(&self) -> &BlockState {
        &self.state
    }

    async fn run(&self) -> Status {
        Status::Active
    }
}
