use super::{gigabytes, threshold, USAGE_COLORS};
use crate::block::{Fetch, Update};
use crate::error::BlockError;
use std::path::{Path, PathBuf};

/// Free space on one file system
pub struct Disk {
    path: PathBuf,
    label: String,
}

impl Disk {
    /// With `short_label`, `/home/user` is shown as `/h/u`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, short_label: bool) -> Self {
        let path = path.into();
        let label = if short_label {
            short(&path)
        } else {
            path.display().to_string()
        };
        Self { path, label }
    }
}

impl Fetch for Disk {
    fn fetch(&self) -> Result<Update, BlockError> {
        let stat = nix::sys::statvfs::statvfs(self.path.as_path()).map_err(std::io::Error::from)?;
        #[allow(clippy::useless_conversion)] // Not useless on every target
        let (total, free) = (
            u64::from(stat.blocks()) * u64::from(stat.fragment_size()),
            u64::from(stat.blocks_available()) * u64::from(stat.fragment_size()),
        );
        Ok(render(&self.label, total, free))
    }
}

fn short(path: &Path) -> String {
    let initials: Vec<String> = path
        .to_string_lossy()
        .split('/')
        .filter_map(|part| part.chars().next())
        .map(String::from)
        .collect();
    format!("/{}", initials.join("/"))
}

fn render(label: &str, total: u64, free: u64) -> Update {
    #[allow(clippy::cast_precision_loss)]
    let used_percent = if total == 0 {
        0.0
    } else {
        100.0 - (free as f64 * 100.0 / total as f64)
    };
    let color = threshold(&USAGE_COLORS, used_percent).flatten();

    let free_gb = gigabytes(free);
    let full_text = if free > 1024 * 1024 * 1024 {
        format!("{label}: {free_gb:.1} GB")
    } else {
        format!("{label}: {} MB", free / 1024 / 1024)
    };

    Update::new(full_text)
        .short_text(format!("{free_gb:.0}G"))
        .color(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::color;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn short_label_uses_initials() {
        assert_eq!(short(Path::new("/home/user")), "/h/u");
        assert_eq!(short(Path::new("/")), "/");
        assert_eq!(Disk::new("/var/lib", true).label, "/v/l");
        assert_eq!(Disk::new("/var/lib", false).label, "/var/lib");
    }

    #[test]
    fn renders_free_space() {
        let update = render("/home", 100 * GIB, 40 * GIB);
        assert_eq!(update.full_text, "/home: 40.0 GB");
        assert_eq!(update.short_text.as_deref(), Some("40G"));
        assert_eq!(update.style.color, None);

        let full = render("/", 100 * GIB, GIB / 2);
        assert_eq!(full.full_text, "/: 512 MB");
        assert_eq!(full.style.color.as_deref(), Some(color::URGENT));
    }

    #[test]
    fn root_file_system_is_readable() {
        let update = Disk::new("/", false).fetch().unwrap();
        assert!(update.full_text.starts_with("/: "));
    }
}
