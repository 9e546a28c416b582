use crate::block::{Block, BlockKey, Status};
use crate::click::ClickReader;
use crate::error::{Error, ProtocolError, RegistrationError};
use crate::output::Output;
use crate::protocol::Header;
use crate::registry::Registry;
use signal_hook::iterator::Signals;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Pending signals the dispatcher has not picked up yet
const SIGNAL_BACKLOG: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Time between two status lines
    pub interval: Duration,
    /// Stop after this long
    pub timeout: Option<Duration>,
    pub header: Header,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
            header: Header::default(),
        }
    }
}

/// Why a task stopped
enum TaskExit {
    Block(BlockKey, Status),
    Writer(io::Result<()>),
    Reader(Result<(), Error>),
    Signals(io::Result<()>),
}

pub struct Runner {
    settings: Settings,
    registry: Registry,
    /// Signal number to the blocks it is routed to
    signals: BTreeMap<i32, Vec<BlockKey>>,
}

impl Runner {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            registry: Registry::default(),
            signals: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Adds a block to the end of the status line. Each signal in `signals`
    /// will make the block refresh and the line be rewritten immediately.
    ///
    /// # Errors
    /// When the block's name and instance are taken or a signal cannot be
    /// caught. Nothing is registered in that case.
    pub fn register(&mut self, block: Arc<dyn Block>, signals: &[i32]) -> Result<(), Error> {
        if let Some(&signal) = signals
            .iter()
            .find(|&&signal| signal_hook::consts::FORBIDDEN.contains(&signal))
        {
            return Err(RegistrationError::ForbiddenSignal(signal).into());
        }
        let key = block.key().clone();
        self.registry.insert(block)?;
        for &signal in signals {
            let routed = self.signals.entry(signal).or_default();
            if !routed.contains(&key) {
                routed.push(key.clone());
            }
        }
        Ok(())
    }

    /// Runs until every task finished, the timeout elapsed or we are asked to
    /// terminate. Outstanding tasks are cancelled on the way out.
    ///
    /// # Errors
    /// When the output stream breaks or signal handlers cannot be installed
    pub async fn start<W, R>(self, output: W, input: R) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let Self {
            settings,
            registry,
            signals,
        } = self;
        let registry = Arc::new(registry);
        let output = Arc::new(Output::new(output));

        output
            .write_preamble(&settings.header)
            .await
            .map_err(Error::Output)?;

        let mut tasks = JoinSet::new();
        for block in registry.iter() {
            let block = Arc::clone(block);
            tasks.spawn(async move {
                let status = block.run().await;
                TaskExit::Block(block.key().clone(), status)
            });
        }
        tasks.spawn(write_ticks(
            Arc::clone(&registry),
            Arc::clone(&output),
            settings.interval,
        ));
        if settings.header.click_events {
            tasks.spawn(read_clicks(
                Arc::clone(&registry),
                Arc::clone(&output),
                ClickReader::new(input),
            ));
        }
        let signal_handle = if signals.is_empty() {
            None
        } else {
            let (handle, received) = listen(signals.keys().copied()).map_err(Error::Signal)?;
            tasks.spawn(dispatch_signals(
                Arc::clone(&registry),
                Arc::clone(&output),
                signals,
                received,
            ));
            Some(handle)
        };

        let result = tokio::select! {
            result = supervise(&mut tasks) => result,
            () = expire(settings.timeout) => Ok(()),
            () = terminated() => Ok(()),
        };

        tasks.shutdown().await;
        if let Some(handle) = signal_handle {
            handle.close();
        }
        result
    }
}

/// Logs how tasks ended, fails once the output is gone
async fn supervise(tasks: &mut JoinSet<TaskExit>) -> Result<(), Error> {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(TaskExit::Block(key, Status::Failed(message))) => {
                tracing::warn!(block = %key, "Block stopped updating: {message}");
            }
            Ok(TaskExit::Block(key, Status::Active)) => {
                tracing::debug!(block = %key, "Block finished");
            }
            Ok(TaskExit::Writer(result)) => {
                return result.map_err(Error::Output);
            }
            Ok(TaskExit::Reader(Ok(()))) => tracing::debug!("Click event stream closed"),
            Ok(TaskExit::Reader(Err(e))) => {
                tracing::warn!("Click events disabled: {e}");
            }
            Ok(TaskExit::Signals(result)) => {
                if let Err(e) = result {
                    tracing::warn!("Signal dispatch stopped: {e}");
                }
            }
            Err(e) if e.is_panic() => tracing::error!("Task panicked: {e}"),
            Err(_) => {}
        }
    }
    Ok(())
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Resolves on SIGINT or SIGTERM
async fn terminated() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Unable to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

async fn write_ticks<W>(registry: Arc<Registry>, output: Arc<Output<W>>, interval: Duration) -> TaskExit
where
    W: AsyncWrite + Unpin + Send,
{
    let mut ticks = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        if let Err(e) = output.write_tick(&registry).await {
            return TaskExit::Writer(Err(e));
        }
    }
}

async fn read_clicks<W, R>(
    registry: Arc<Registry>,
    output: Arc<Output<W>>,
    mut reader: ClickReader<R>,
) -> TaskExit
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin + Send,
{
    loop {
        let event = match reader.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => return TaskExit::Reader(Ok(())),
            Err(ProtocolError::Malformed(e)) => {
                tracing::warn!("Dropping invalid click event: {e}");
                continue;
            }
            Err(e) => return TaskExit::Reader(Err(e.into())),
        };
        let Some(block) = registry.resolve(&event) else {
            tracing::debug!(
                name = ?event.name,
                instance = ?event.instance,
                "Dropping click event for unknown block"
            );
            continue;
        };
        block.click(&event);
        if let Err(e) = output.write_tick(&registry).await {
            return TaskExit::Reader(Err(Error::Output(e)));
        }
    }
}

/// Catches signals on a helper thread and forwards them to the event loop
fn listen(
    signals: impl IntoIterator<Item = i32>,
) -> io::Result<(signal_hook::iterator::Handle, mpsc::Receiver<i32>)> {
    let mut signals = Signals::new(signals)?;
    let handle = signals.handle();
    let (sender, received) = mpsc::channel(SIGNAL_BACKLOG);
    std::thread::Builder::new()
        .name("signals".to_owned())
        .spawn(move || {
            for signal in signals.forever() {
                if sender.blocking_send(signal).is_err() {
                    break;
                }
            }
        })?;
    Ok((handle, received))
}

async fn dispatch_signals<W>(
    registry: Arc<Registry>,
    output: Arc<Output<W>>,
    routes: BTreeMap<i32, Vec<BlockKey>>,
    mut received: mpsc::Receiver<i32>,
) -> TaskExit
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(signal) = received.recv().await {
        if dispatch_signal(&registry, &routes, signal) == 0 {
            continue;
        }
        if let Err(e) = output.write_tick(&registry).await {
            return TaskExit::Signals(Err(e));
        }
    }
    TaskExit::Signals(Ok(()))
}

/// Hands a signal to every block routed to it, returns how many got it
fn dispatch_signal(registry: &Registry, routes: &BTreeMap<i32, Vec<BlockKey>>, signal: i32) -> usize {
    let Some(keys) = routes.get(&signal) else {
        return 0;
    };
    let mut dispatched = 0;
    for key in keys {
        if let Some(block) = registry.get(key) {
            tracing::debug!(block = %key, signal, "Dispatching signal");
            block.signal(signal);
            dispatched += 1;
        }
    }
    dispatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockState, StaticBlock, Update};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts the signals it receives
    struct Probe {
        state: BlockState,
        signals: AtomicU32,
    }

    impl Probe {
        fn new(name: &str) -> Self {
            Self {
                state: BlockState::new(name),
                signals: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Block for Probe {
        fn state(&self) -> &BlockState {
            &self.state
        }

        fn signal(&self, _signal: i32) {
            self.signals.fetch_add(1, Ordering::SeqCst);
        }

        async fn run(&self) -> Status {
            Status::Active
        }
    }

    fn fixed(name: &str) -> Arc<dyn Block> {
        Arc::new(StaticBlock::new(BlockState::new(name), Update::new(name)))
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut runner = Runner::new(Settings::default());
        runner.register(fixed("Date"), &[]).unwrap();
        let err = runner.register(fixed("Date"), &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::Duplicate { .. })
        ));
        assert_eq!(runner.registry().len(), 1);
    }

    #[test]
    fn forbidden_signals_are_refused() {
        let mut runner = Runner::new(Settings::default());
        let err = runner
            .register(fixed("Date"), &[signal_hook::consts::SIGKILL])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::ForbiddenSignal(_))
        ));
        assert!(runner.registry().is_empty());
        assert!(runner.signals.is_empty());
    }

    #[test]
    fn signals_reach_every_routed_block() {
        let first = Arc::new(Probe::new("First"));
        let second = Arc::new(Probe::new("Second"));
        let mut runner = Runner::new(Settings::default());
        runner.register(first.clone(), &[10, 12]).unwrap();
        runner.register(second.clone(), &[10]).unwrap();
        runner.register(fixed("Quiet"), &[]).unwrap();

        assert_eq!(dispatch_signal(&runner.registry, &runner.signals, 10), 2);
        assert_eq!(dispatch_signal(&runner.registry, &runner.signals, 12), 1);
        assert_eq!(dispatch_signal(&runner.registry, &runner.signals, 14), 0);
        assert_eq!(first.signals.load(Ordering::SeqCst), 2);
        assert_eq!(second.signals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registrations_do_not_share_signal_lists() {
        let mut runner = Runner::new(Settings::default());
        runner.register(fixed("A"), &[10]).unwrap();
        runner.register(fixed("B"), &[]).unwrap();
        assert_eq!(runner.signals.len(), 1);
        assert_eq!(runner.signals[&10], [BlockKey::new("A", None)]);
    }
}
