use super::{gigabytes, threshold, USAGE_COLORS};
use crate::block::{Fetch, Update};
use crate::error::BlockError;

/// Available memory
#[derive(Default)]
pub struct Memory {}

#[derive(Debug, PartialEq, Eq)]
struct MemInfo {
    total_kb: u64,
    available_kb: u64,
}

impl Fetch for Memory {
    fn fetch(&self) -> Result<Update, BlockError> {
        let info = parse_meminfo(&std::fs::read_to_string("/proc/meminfo")?)?;
        Ok(render(&info))
    }
}

fn parse_meminfo(contents: &str) -> Result<MemInfo, BlockError> {
    let mut total_kb = None;
    let mut available_kb = None;
    for line in contents.lines() {
        let mut parts = line.split_whitespace();
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        match key {
            "MemTotal:" => total_kb = value.parse().ok(),
            "MemAvailable:" => available_kb = value.parse().ok(),
            _ => {}
        }
    }
    Ok(MemInfo {
        total_kb: total_kb.ok_or(BlockError::Missing("MemTotal"))?,
        available_kb: available_kb.ok_or(BlockError::Missing("MemAvailable"))?,
    })
}

fn render(info: &MemInfo) -> Update {
    #[allow(clippy::cast_precision_loss)]
    let used_percent = if info.total_kb == 0 {
        0.0
    } else {
        100.0 - (info.available_kb as f64 * 100.0 / info.total_kb as f64)
    };
    let color = threshold(&USAGE_COLORS, used_percent).flatten();

    let available_gb = gigabytes(info.available_kb * 1024);
    let full_text = if info.available_kb > 1024 * 1024 {
        format!("{available_gb:.2} GB")
    } else {
        format!("{} MB", info.available_kb / 1024)
    };

    Update::new(full_text)
        .short_text(format!("{available_gb:.1}G"))
        .color(color)
}
