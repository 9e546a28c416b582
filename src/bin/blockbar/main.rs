#![deny(clippy::pedantic)]

use blockbar::block::{Block, BlockState, EventBlock, Fetch, PollingBlock, StaticBlock};
use blockbar::blocks::{
    battery, caffeine, cpu, date, disk, dunst, load, memory, network, temperature, volume,
};
use blockbar::config::{BlockKind, Config};
use blockbar::{BlockError, Error, Runner};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Entrypoint
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // stdout belongs to i3bar
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_ansi(false)
        .init();

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{e}");
            1
        }
    };
    // A pending stdin read would keep the runtime from shutting down
    std::process::exit(code);
}

async fn run() -> Result<(), Error> {
    let cfg = Config::load()?;
    let mut runner = Runner::new(cfg.settings());

    for kind in &cfg.blocks {
        match kind {
            BlockKind::Disk => {
                for path in &cfg.disks {
                    let state = BlockState::new("Disk").with_instance(path.display().to_string());
                    let source = disk::Disk::new(path, cfg.disk_short_labels);
                    runner.register(polling(state, 5, source), &[])?;
                }
            }
            BlockKind::Date => {
                let source = date::Date::new(&cfg.date_format, &cfg.date_short_format);
                runner.register(polling(BlockState::new("Date"), 1, source), &cfg.date_signals)?;
            }
            BlockKind::Battery => {
                let block = polling(BlockState::new("Battery"), 5, battery::Batteries::default());
                runner.register(block, &[])?;
            }
            BlockKind::Cpu => {
                runner.register(polling(BlockState::new("Cpu"), 5, cpu::Cpu::default()), &[])?;
            }
            BlockKind::Memory => {
                let block = polling(BlockState::new("Memory"), 3, memory::Memory::default());
                runner.register(block, &[])?;
            }
            BlockKind::Network => {
                let block = polling(BlockState::new("Network"), 3, network::Network::default());
                runner.register(block, &[])?;
            }
            BlockKind::Load => {
                let block = source_or_error(BlockState::new("Load"), load::Load::new(), 5);
                runner.register(block, &[])?;
            }
            BlockKind::Temperature => {
                let state = BlockState::new("Temperature");
                let block = source_or_error(state, temperature::Temperature::discover(), 5);
                runner.register(block, &[])?;
            }
            BlockKind::Volume => {
                let worker = volume::Pulse::new(cfg.mixer.clone());
                runner.register(Arc::new(EventBlock::new(BlockState::new("Volume"), worker)), &[])?;
            }
            BlockKind::Caffeine => {
                let worker = caffeine::Caffeine::default();
                let block = EventBlock::new(BlockState::new("Caffeine"), worker);
                runner.register(Arc::new(block), &[])?;
            }
            BlockKind::Dunst => {
                let worker = dunst::Dunst::default();
                runner.register(Arc::new(EventBlock::new(BlockState::new("Dunst"), worker)), &[])?;
            }
        }
    }

    runner
        .start(tokio::io::stdout(), tokio::io::BufReader::new(tokio::io::stdin()))
        .await
}

fn polling<F: Fetch + 'static>(state: BlockState, secs: u64, source: F) -> Arc<dyn Block> {
    Arc::new(PollingBlock::new(state, Duration::from_secs(secs), source))
}

/// Blocks whose data source is missing show why instead
fn source_or_error<F: Fetch + 'static>(
    state: BlockState,
    source: Result<F, BlockError>,
    secs: u64,
) -> Arc<dyn Block> {
    match source {
        Ok(source) => polling(state, secs, source),
        Err(e) => {
            let _idc = state.fail(e);
            Arc::new(StaticBlock::keep(state))
        }
    }
}
