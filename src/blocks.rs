pub mod battery;
pub mod caffeine;
pub mod cpu;
pub mod date;
pub mod disk;
pub mod dunst;
pub mod load;
pub mod memory;
pub mod network;
pub mod temperature;
pub mod volume;

/// Picks the entry with the highest threshold not above `value`.
///
/// `levels` must be sorted by threshold.
#[must_use]
pub fn threshold<T: Copy>(levels: &[(f64, T)], value: f64) -> Option<T> {
    levels
        .iter()
        .take_while(|(limit, _)| *limit <= value)
        .last()
        .map(|&(_, item)| item)
}

/// Usage in percent to foreground color
pub const USAGE_COLORS: [(f64, Option<&str>); 3] = [
    (0.0, None),
    (75.0, Some(crate::protocol::color::WARN)),
    (90.0, Some(crate::protocol::color::URGENT)),
];

#[allow(clippy::cast_precision_loss)] // Who cares
pub(crate) fn gigabytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0 / 1024.0
}
