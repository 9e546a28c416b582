use crate::block::{Fetch, Update};
use crate::error::BlockError;
use crate::protocol::{color, Markup};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq)]
struct Battery {
    percent_charged: u8,
    watts: f64,
}

/// Laptop batteries from `/sys/class/power_supply`
pub struct Batteries {
    root: PathBuf,
}

impl Default for Batteries {
    fn default() -> Self {
        Self::new("/sys/class/power_supply")
    }
}

impl Batteries {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scan(&self) -> Result<(Vec<Battery>, bool), BlockError> {
        let mut batteries = vec![];
        let mut charging = false;
        for supply in fs::read_dir(&self.root)?.flatten() {
            let name = supply.file_name().to_string_lossy().into_owned();
            let path = supply.path();
            if name.starts_with("BAT") {
                batteries.push(read_battery(&path));
            } else if name.starts_with("AC") {
                charging |= read_trimmed(&path.join("online")).as_deref() == Some("1");
            }
        }
        Ok((batteries, charging))
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|v| v.trim().to_owned())
}

fn read_number(path: &Path) -> Option<f64> {
    read_trimmed(path).and_then(|v| v.parse().ok())
}

fn read_battery(path: &Path) -> Battery {
    let percent_charged = read_trimmed(&path.join("capacity"))
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    // current_now is on Dell, power_now on Lenovo
    let watts = read_number(&path.join("power_now")).map_or_else(
        || match (
            read_number(&path.join("current_now")),
            read_number(&path.join("voltage_now")),
        ) {
            (Some(current), Some(voltage)) => (current * voltage) / 1_000_000_000_000.0,
            _ => 0.0,
        },
        |power| power / 1_000_000.0,
    );
    Battery {
        percent_charged,
        watts,
    }
}

fn render(batteries: &[Battery], charging: bool) -> Update {
    let text = batteries
        .iter()
        .map(|bat| {
            if charging {
                format!(
                    " 🔋<span foreground='{}'>{}% {:.2}W+</span>",
                    color::GOOD,
                    bat.percent_charged,
                    bat.watts
                )
            } else if bat.percent_charged <= 15 {
                format!(
                    " 🪫<span foreground='{}'>{}% {:.2}W-</span>",
                    color::URGENT,
                    bat.percent_charged,
                    bat.watts
                )
            } else {
                format!(" 🔋{}% {:.2}W-", bat.percent_charged, bat.watts)
            }
        })
        .collect::<String>();
    Update::new(text.trim()).markup(Markup::Pango)
}

impl Fetch for Batteries {
    fn fetch(&self) -> Result<Update, BlockError> {
        let (batteries, charging) = self.scan()?;
        Ok(render(&batteries, charging))
    }
}
