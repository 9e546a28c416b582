use super::{threshold, USAGE_COLORS};
use crate::block::{Fetch, Update};
use crate::error::BlockError;
use std::sync::{Mutex, PoisonError};

/// Jiffies spent by all CPUs, as summed up in the first line of `/proc/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

/// CPU utilisation since the previous fetch
#[derive(Default)]
pub struct Cpu {
    previous: Mutex<Option<CpuTimes>>,
}

impl Fetch for Cpu {
    fn fetch(&self) -> Result<Update, BlockError> {
        let now = parse_stat(&std::fs::read_to_string("/proc/stat")?)?;
        let previous = self
            .previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(now);
        Ok(render(percent(previous, now)))
    }
}

fn parse_stat(contents: &str) -> Result<CpuTimes, BlockError> {
    let line = contents
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or(BlockError::Missing("cpu line"))?;
    let fields = line
        .split_whitespace()
        .skip(1)
        .map(|field| {
            field.parse::<u64>().map_err(|_| BlockError::Parse {
                what: "cpu time",
                value: field.to_owned(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if fields.len() < 4 {
        return Err(BlockError::Parse {
            what: "cpu line",
            value: line.to_owned(),
        });
    }
    // Guest time is already part of user and nice
    let total: u64 = fields.iter().take(8).sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or_default();
    Ok(CpuTimes {
        busy: total - idle,
        total,
    })
}

/// Without a previous sample this is the average since boot
#[allow(clippy::cast_precision_loss)]
fn percent(previous: Option<CpuTimes>, now: CpuTimes) -> f64 {
    let previous = previous.unwrap_or(CpuTimes { busy: 0, total: 0 });
    let total = now.total.saturating_sub(previous.total);
    if total == 0 {
        return 0.0;
    }
    let busy = now.busy.saturating_sub(previous.busy);
    busy as f64 * 100.0 / total as f64
}

fn render(percent: f64) -> Update {
    let color = threshold(&USAGE_COLORS, percent).flatten();
    Update::new(format!("C: {percent:.1}%"))
        .short_text(format!("{percent:.0}%"))
        .color(color)
}
