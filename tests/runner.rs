use blockbar::block::{Fetch, PollingBlock, StaticBlock};
use blockbar::protocol::Header;
use blockbar::{Block, BlockError, BlockState, ClickEvent, Error, RegistrationError, Runner, Settings, Update};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt as _;

/// Counts fetches and clicks, fails on the configured fetch
#[derive(Default)]
struct Counter {
    fetches: AtomicU32,
    clicks: AtomicU32,
    fail_on: Option<u32>,
}

impl Fetch for Counter {
    fn fetch(&self) -> Result<Update, BlockError> {
        let call = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.fail_on {
            return Err(BlockError::Missing("counter"));
        }
        Ok(Update::new(call.to_string()))
    }

    fn click(&self, _event: &ClickEvent) -> Result<(), BlockError> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fixed(name: &str, text: &str) -> Arc<dyn Block> {
    Arc::new(StaticBlock::new(BlockState::new(name), Update::new(text)))
}

fn counter(state: BlockState, fail_on: Option<u32>) -> Arc<PollingBlock<Counter>> {
    Arc::new(PollingBlock::new(
        state,
        Duration::from_secs(1),
        Counter {
            fail_on,
            ..Counter::default()
        },
    ))
}

fn settings(timeout_ms: u64) -> Settings {
    Settings {
        interval: Duration::from_secs(1),
        timeout: Some(Duration::from_millis(timeout_ms)),
        header: Header::default(),
    }
}

/// Runs until the timeout and returns what the host would have read
async fn run(runner: Runner, input: &'static [u8]) -> String {
    let (sink, mut host) = tokio::io::duplex(1 << 20);
    runner.start(sink, input).await.unwrap();
    let mut out = String::new();
    host.read_to_string(&mut out).await.unwrap();
    out
}

/// Header, opening bracket, then one parsed array per tick
fn parse(out: &str) -> (Value, Vec<Vec<Value>>) {
    let mut lines = out.lines();
    let header = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(lines.next(), Some("["));
    let ticks = lines
        .map(|line| {
            let line = line.strip_suffix(',').expect("tick lines end with a comma");
            serde_json::from_str(line).unwrap()
        })
        .collect();
    (header, ticks)
}

#[tokio::test(start_paused = true)]
async fn single_block_single_tick() {
    let mut runner = Runner::new(settings(500));
    runner.register(fixed("Hello", "OK"), &[]).unwrap();

    let out = run(runner, b"").await;
    assert!(out.starts_with("{\"version\":1,\"click_events\":true}\n[\n"));
    let (header, ticks) = parse(&out);
    assert_eq!(header["version"], 1);
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].len(), 1);

    let block = &ticks[0][0];
    assert_eq!(block["full_text"], "OK");
    assert_eq!(block["name"], "Hello");
    assert_eq!(block["instance"], "default");
    assert_eq!(block["urgent"], false);
    assert_eq!(block["separator"], true);
    assert_eq!(block["markup"], "none");
    assert!(block.get("short_text").is_none());
    assert!(block.get("color").is_none());
}

#[tokio::test(start_paused = true)]
async fn every_tick_keeps_registration_order() {
    let mut runner = Runner::new(settings(3500));
    for name in ["Volume", "Battery", "Date"] {
        runner.register(fixed(name, name), &[]).unwrap();
    }

    let (_, ticks) = parse(&run(runner, b"").await);
    assert_eq!(ticks.len(), 4);
    for tick in ticks {
        let names: Vec<_> = tick.iter().map(|block| block["name"].clone()).collect();
        assert_eq!(names, ["Volume", "Battery", "Date"]);
    }
}

#[tokio::test(start_paused = true)]
async fn failing_block_does_not_stop_the_others() {
    let flaky = counter(BlockState::new("Flaky"), Some(3));
    let steady = counter(BlockState::new("Steady"), None);
    let mut runner = Runner::new(settings(5500));
    runner.register(flaky.clone(), &[]).unwrap();
    runner.register(steady.clone(), &[]).unwrap();

    let (_, ticks) = parse(&run(runner, b"").await);
    assert_eq!(ticks.len(), 6);

    let last = ticks.last().unwrap();
    let failed = last[0]["full_text"].as_str().unwrap();
    assert!(failed.starts_with("Error in Flaky"));
    assert_eq!(last[0]["urgent"], true);
    assert!(last[1]["full_text"].as_str().unwrap().parse::<u32>().unwrap() >= 5);
    assert_eq!(last[1]["urgent"], false);

    // The failed block is never polled again
    assert_eq!(flaky.source().fetches.load(Ordering::SeqCst), 3);
    assert!(steady.source().fetches.load(Ordering::SeqCst) >= 6);
}

#[tokio::test(start_paused = true)]
async fn clicks_reach_only_their_block() {
    let home = counter(BlockState::new("Disk").with_instance("/home"), None);
    let mut runner = Runner::new(settings(500));
    runner.register(home.clone(), &[]).unwrap();
    runner.register(fixed("Date", "now"), &[]).unwrap();

    let input = b"[\n\
        {\"name\":\"Disk\",\"instance\":\"/home\",\"button\":1,\"x\":10,\"y\":5},\n\
        ,{\"name\":\"Disk\",\"instance\":\"/var\",\"button\":1}\n";
    let (_, ticks) = parse(&run(runner, input).await);

    assert_eq!(home.source().clicks.load(Ordering::SeqCst), 1);
    // One timer tick plus the one written after the click
    assert_eq!(ticks.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn broken_click_stream_keeps_the_bar_running() {
    let mut runner = Runner::new(settings(2500));
    runner.register(fixed("Hello", "OK"), &[]).unwrap();

    let (_, ticks) = parse(&run(runner, b"not json").await);
    assert_eq!(ticks.len(), 3);
}

#[test]
fn emitted_identity_resolves_to_the_same_block() {
    let mut runner = Runner::new(Settings::default());
    runner.register(fixed("Load", "0.5"), &[]).unwrap();
    runner
        .register(
            Arc::new(StaticBlock::new(
                BlockState::new("Disk").with_instance("/home"),
                Update::new("12 GB"),
            )),
            &[],
        )
        .unwrap();

    for block in runner.registry().snapshot() {
        let json = serde_json::to_string(&block).unwrap();
        let event: ClickEvent = serde_json::from_str(&json).unwrap();
        let resolved = runner.registry().resolve(&event).unwrap();
        assert_eq!(resolved.result(), block);
    }
}

#[test]
fn duplicate_identity_is_refused() {
    let mut runner = Runner::new(Settings::default());
    runner.register(fixed("Date", "a"), &[]).unwrap();
    let err = runner.register(fixed("Date", "b"), &[]).unwrap_err();
    assert!(matches!(
        err,
        Error::Registration(RegistrationError::Duplicate { .. })
    ));
    assert_eq!(runner.registry().snapshot()[0].full_text, "a");
}

#[tokio::test]
async fn signal_refreshes_and_writes_out_of_band() {
    let signalled = counter(BlockState::new("Date"), None);
    let mut runner = Runner::new(Settings {
        interval: Duration::from_secs(60),
        timeout: Some(Duration::from_millis(600)),
        header: Header::default(),
    });
    runner
        .register(signalled.clone(), &[signal_hook::consts::SIGUSR1])
        .unwrap();

    tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        signal_hook::low_level::raise(signal_hook::consts::SIGUSR1).unwrap();
    });
    let (_, ticks) = parse(&run(runner, b"").await);

    // The tick at start plus the write after the signal
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[1][0]["full_text"], "2");
    assert_eq!(signalled.source().fetches.load(Ordering::SeqCst), 2);
}
