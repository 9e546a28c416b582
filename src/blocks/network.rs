use super::threshold;
use crate::block::{Fetch, Update};
use crate::error::BlockError;
use crate::protocol::color;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const MIB: f64 = 1024.0 * 1024.0;

/// Bytes per second to foreground color
const RATE_COLORS: [(f64, Option<&str>); 3] = [
    (0.0, None),
    (2.0 * MIB, Some(color::WARN)),
    (5.0 * MIB, Some(color::URGENT)),
];

/// Received and transmitted bytes of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counters {
    rx: u64,
    tx: u64,
}

struct Sample {
    at: Instant,
    counters: HashMap<String, Counters>,
}

/// Interface carrying the default route with its upload and download rate
#[derive(Default)]
pub struct Network {
    previous: Mutex<Option<Sample>>,
}

impl Fetch for Network {
    fn fetch(&self) -> Result<Update, BlockError> {
        let routes = std::fs::read_to_string("/proc/net/route")?;
        let Some(interface) = default_route(&routes) else {
            return Ok(Update::new("No link").color(Some(color::URGENT)));
        };

        let now = Sample {
            at: Instant::now(),
            counters: parse_dev(&std::fs::read_to_string("/proc/net/dev")?)?,
        };
        let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
        // A new interface has no history yet
        let (upload, download) = previous
            .as_ref()
            .and_then(|previous| {
                Some(rate(
                    *previous.counters.get(interface)?,
                    *now.counters.get(interface)?,
                    now.at.duration_since(previous.at),
                ))
            })
            .unwrap_or_default();
        *previous = Some(now);
        Ok(render(interface, upload, download))
    }
}

fn default_route(routes: &str) -> Option<&str> {
    routes.lines().find_map(|line| {
        let mut split = line.split('\t');
        let interface = split.next()?;
        // Detect default route
        (split.next() == Some("00000000")).then_some(interface)
    })
}

fn parse_dev(contents: &str) -> Result<HashMap<String, Counters>, BlockError> {
    // Two header lines, then `iface: rx_bytes packets ... tx_bytes ...`
    contents
        .lines()
        .skip(2)
        .filter_map(|line| line.split_once(':'))
        .map(|(interface, stats)| -> Result<_, BlockError> {
            let fields: Vec<&str> = stats.split_whitespace().collect();
            let field = |index: usize| -> Result<u64, BlockError> {
                fields
                    .get(index)
                    .and_then(|value| value.parse().ok())
                    .ok_or_else(|| BlockError::Parse {
                        what: "interface statistics",
                        value: stats.trim().to_owned(),
                    })
            };
            Ok((
                interface.trim().to_owned(),
                Counters {
                    rx: field(0)?,
                    tx: field(8)?,
                },
            ))
        })
        .collect()
}

/// Upload and download in bytes per second
#[allow(clippy::cast_precision_loss)]
fn rate(previous: Counters, now: Counters, elapsed: Duration) -> (f64, f64) {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return (0.0, 0.0);
    }
    (
        now.tx.saturating_sub(previous.tx) as f64 / secs,
        now.rx.saturating_sub(previous.rx) as f64 / secs,
    )
}

/// `1536` becomes `1.5K`
fn human(bytes: f64) -> String {
    let mut value = bytes;
    let mut unit = "B";
    for next in ["K", "M", "G", "T", "P"] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    if unit == "B" {
        format!("{value:.0}B")
    } else {
        format!("{value:.1}{unit}")
    }
}

fn render(interface: &str, upload: f64, download: f64) -> Update {
    let color = threshold(&RATE_COLORS, upload.max(download)).flatten();
    Update::new(format!(
        "{interface}: U {} D {}",
        human(upload),
        human(download)
    ))
    .short_text(interface)
    .color(color)
}
