use crate::block::{Fetch, Update};
use crate::error::BlockError;
use crate::protocol::color;
use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom};
use std::sync::{Mutex, PoisonError};

pub struct Load {
    /// The file where the load is read from
    load_file: Mutex<File>,
    /// Number of parallel threads
    num_threads: Option<usize>,
}

impl Load {
    /// # Errors
    /// When `/proc/loadavg` cannot be opened
    pub fn new() -> Result<Self, BlockError> {
        Ok(Self {
            load_file: Mutex::new(File::open("/proc/loadavg")?),
            num_threads: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .ok(),
        })
    }
}

impl Fetch for Load {
    fn fetch(&self) -> Result<Update, BlockError> {
        let mut contents = String::new();
        {
            let mut f = self.load_file.lock().unwrap_or_else(PoisonError::into_inner);
            f.seek(SeekFrom::Start(0))?;
            f.read_to_string(&mut contents)?;
        }
        let load1 = parse_load1(&contents)?;

        #[allow(clippy::cast_precision_loss)] // Who cares
        let overloaded = self
            .num_threads
            .is_some_and(|threads| load1 / threads as f32 > 1.0);

        Ok(Update::new(format!("{load1:.02}")).color(overloaded.then_some(color::URGENT)))
    }
}

fn parse_load1(contents: &str) -> Result<f32, BlockError> {
    let load1 = contents.split(' ').next().unwrap_or_default();
    load1.trim().parse().map_err(|_| BlockError::Parse {
        what: "load average",
        value: load1.to_owned(),
    })
}
