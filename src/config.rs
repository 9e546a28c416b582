use crate::blocks::date;
use crate::error::ConfigError;
use crate::protocol::Header;
use crate::runner::Settings;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Blocks the binary knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Battery,
    Caffeine,
    Cpu,
    Date,
    Disk,
    Dunst,
    Load,
    Memory,
    Network,
    Temperature,
    Volume,
}

impl FromStr for BlockKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "battery" => Self::Battery,
            "caffeine" => Self::Caffeine,
            "cpu" => Self::Cpu,
            "date" => Self::Date,
            "disk" => Self::Disk,
            "dunst" => Self::Dunst,
            "load" => Self::Load,
            "memory" => Self::Memory,
            "network" => Self::Network,
            "temperature" => Self::Temperature,
            "volume" => Self::Volume,
            other => return Err(ConfigError::UnknownBlock(other.to_owned())),
        })
    }
}

/// Settings read from `$XDG_CONFIG_HOME/blockbar`, an env-style file:
///
/// ```text
/// interval=2
/// blocks=volume,disk,cpu,memory,load,date
/// disks=/,/home
/// diskShortLabels=true
/// dateSignals=10,12
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub interval: Duration,
    pub timeout: Option<Duration>,
    pub stop_signal: Option<i32>,
    pub cont_signal: Option<i32>,
    /// Output order
    pub blocks: Vec<BlockKind>,
    /// One disk block per mount point
    pub disks: Vec<PathBuf>,
    /// Show `/h/u` instead of `/home/user`
    pub disk_short_labels: bool,
    pub date_format: String,
    pub date_short_format: String,
    pub date_signals: Vec<i32>,
    /// Started on left click on the volume block
    pub mixer: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
            stop_signal: None,
            cont_signal: None,
            blocks: vec![
                BlockKind::Volume,
                BlockKind::Battery,
                BlockKind::Network,
                BlockKind::Disk,
                BlockKind::Cpu,
                BlockKind::Memory,
                BlockKind::Load,
                BlockKind::Temperature,
                BlockKind::Date,
            ],
            disks: vec![PathBuf::from("/")],
            disk_short_labels: false,
            date_format: "(KW%V) %d.%m. (%b) %H:%M".to_owned(),
            date_short_format: "%H:%M".to_owned(),
            date_signals: vec![],
            mixer: vec!["pavucontrol".to_owned()],
        }
    }
}

impl Config {
    /// Reads the config file, falling back to defaults when there is none
    ///
    /// # Errors
    /// When a value in the file is invalid
    pub fn load() -> Result<Self, ConfigError> {
        let Some(config_file) = xdg::BaseDirectories::default().get_config_file("blockbar") else {
            return Ok(Self::default());
        };
        if !config_file.exists() {
            return Ok(Self::default());
        }
        match env_file_reader::read_file(&config_file) {
            Ok(values) => Self::from_values(&values),
            Err(e) => {
                tracing::warn!(path = %config_file.display(), "{}", ConfigError::Read(e));
                Ok(Self::default())
            }
        }
    }

    /// # Errors
    /// When a value cannot be parsed
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(interval) = values.get("interval") {
            let secs: u64 = parse("interval", interval)?;
            if secs == 0 {
                return Err(invalid("interval", interval));
            }
            cfg.interval = Duration::from_secs(secs);
        }
        if let Some(timeout) = values.get("timeout") {
            cfg.timeout = Some(Duration::from_secs(parse("timeout", timeout)?));
        }
        if let Some(signal) = values.get("stopSignal") {
            cfg.stop_signal = Some(parse("stopSignal", signal)?);
        }
        if let Some(signal) = values.get("contSignal") {
            cfg.cont_signal = Some(parse("contSignal", signal)?);
        }
        if let Some(blocks) = values.get("blocks") {
            cfg.blocks = list(blocks).map(str::parse).collect::<Result<_, _>>()?;
        }
        if let Some(disks) = values.get("disks") {
            cfg.disks = list(disks).map(PathBuf::from).collect();
        }
        if let Some(labels) = values.get("diskShortLabels") {
            cfg.disk_short_labels = parse("diskShortLabels", labels)?;
        }
        if let Some(format) = values.get("dateFormat") {
            cfg.date_format = date_format("dateFormat", format)?;
        }
        if let Some(format) = values.get("dateShortFormat") {
            cfg.date_short_format = date_format("dateShortFormat", format)?;
        }
        if let Some(signals) = values.get("dateSignals") {
            cfg.date_signals = list(signals)
                .map(|signal| parse("dateSignals", signal))
                .collect::<Result<_, _>>()?;
        }
        if let Some(mixer) = values.get("mixer") {
            cfg.mixer = mixer.split_whitespace().map(ToOwned::to_owned).collect();
        }
        Ok(cfg)
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            interval: self.interval,
            timeout: self.timeout,
            header: Header {
                stop_signal: self.stop_signal,
                cont_signal: self.cont_signal,
                ..Header::default()
            },
        }
    }
}

fn list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn date_format(key: &'static str, format: &str) -> Result<String, ConfigError> {
    if date::is_valid_format(format) {
        Ok(format.to_owned())
    } else {
        Err(invalid(key, format))
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_owned(),
    }
}
