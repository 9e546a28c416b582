use crate::block::{Fetch, Update};
use crate::error::BlockError;
use crate::protocol::color;
use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub struct Temperature {
    /// The file where the temperature is read from
    temperature_file: Mutex<File>,
    /// A temperature the kernel considers "high"
    high_temp: Option<u32>,
}

impl Temperature {
    /// Picks a sensor from `/sys/class/hwmon`, preferring coretemp
    ///
    /// # Errors
    /// When there is no usable sensor
    pub fn discover() -> Result<Self, BlockError> {
        let mut found = None;
        for sensor in std::fs::read_dir("/sys/class/hwmon")?.flatten() {
            let dir = sensor.path();
            // No temperature sensor here
            if !dir.join("temp1_input").exists() {
                continue;
            }
            let is_coretemp = std::fs::read_to_string(dir.join("name"))
                .is_ok_and(|name| name.trim() == "coretemp");
            if found.is_none() || is_coretemp {
                found = Some(dir);
            }
            if is_coretemp {
                break;
            }
        }
        let dir = found.ok_or(BlockError::Missing("temperature sensor"))?;
        Self::open(&dir)
    }

    /// # Errors
    /// When `temp1_input` in `dir` cannot be opened
    pub fn open(dir: &Path) -> Result<Self, BlockError> {
        let temperature_file = Mutex::new(File::open(dir.join("temp1_input"))?);
        // Check if the kernel tells us what a high temperature is
        let high_temp = std::fs::read_to_string(dir.join("temp1_max"))
            .ok()
            .and_then(|contents| contents.trim().parse().ok());
        Ok(Self {
            temperature_file,
            high_temp,
        })
    }
}

impl Fetch for Temperature {
    fn fetch(&self) -> Result<Update, BlockError> {
        let mut contents = String::new();
        {
            let mut f = self
                .temperature_file
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            f.seek(SeekFrom::Start(0))?;
            f.read_to_string(&mut contents)?;
        }
        let contents = contents.trim();
        let temperature: u32 = contents.parse().map_err(|_| BlockError::Parse {
            what: "temperature",
            value: contents.to_owned(),
        })?;
        Ok(render(temperature, self.high_temp))
    }
}

/// Millidegrees in, degrees out
fn render(temperature: u32, high_temp: Option<u32>) -> Update {
    let hot = high_temp.is_some_and(|high| temperature >= high);
    Update::new(format!("{}°C", temperature / 1000)).color(hot.then_some(color::URGENT))
}
