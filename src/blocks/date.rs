use crate::block::{Fetch, Update};
use crate::error::BlockError;
use crate::protocol::ClickEvent;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether chrono understands every specifier in `format`
#[must_use]
pub fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn format<Tz: TimeZone>(now: &DateTime<Tz>, format: &str) -> Result<String, BlockError>
where
    Tz::Offset: std::fmt::Display,
{
    let mut text = String::new();
    write!(text, "{}", now.format(format)).map_err(|_| BlockError::Parse {
        what: "date format",
        value: format.to_owned(),
    })?;
    Ok(text)
}

/// Local date and time, a left click toggles the compact format
pub struct Date {
    format: String,
    short_format: String,
    compact: AtomicBool,
}

impl Date {
    #[must_use]
    pub fn new(format: impl Into<String>, short_format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            short_format: short_format.into(),
            compact: AtomicBool::new(false),
        }
    }

    fn render<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Update, BlockError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let short = format(now, &self.short_format)?;
        Ok(if self.compact.load(Ordering::Relaxed) {
            Update::new(short)
        } else {
            Update::new(format(now, &self.format)?).short_text(short)
        })
    }
}

impl Default for Date {
    fn default() -> Self {
        Self::new("(KW%V) %d.%m. (%b) %H:%M", "%H:%M")
    }
}

impl Fetch for Date {
    fn fetch(&self) -> Result<Update, BlockError> {
        self.render(&Local::now())
    }

    fn click(&self, event: &ClickEvent) -> Result<(), BlockError> {
        if event.button == 1 {
            self.compact.fetch_xor(true, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockState, PollingBlock, Status};
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn click_toggles_compact_format() {
        let date = Date::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();

        let update = date.render(&now).unwrap();
        assert_eq!(update.full_text, "(KW11) 14.03. (Mar) 09:26");
        assert_eq!(update.short_text.as_deref(), Some("09:26"));

        let left = ClickEvent {
            button: 1,
            ..ClickEvent::default()
        };
        date.click(&left).unwrap();
        assert_eq!(date.render(&now).unwrap().full_text, "09:26");

        // Only the left button toggles
        date.click(&ClickEvent {
            button: 3,
            ..ClickEvent::default()
        })
        .unwrap();
        assert_eq!(date.render(&now).unwrap().full_text, "09:26");

        date.click(&left).unwrap();
        assert_eq!(date.render(&now).unwrap().full_text, "(KW11) 14.03. (Mar) 09:26");
    }

    #[test]
    fn unknown_specifier_is_an_error() {
        assert!(is_valid_format("(KW%V) %d.%m. (%b) %H:%M"));
        assert!(!is_valid_format("%Q %H"));

        let date = Date::new("%Q %H", "%H:%M");
        assert!(matches!(
            date.fetch(),
            Err(BlockError::Parse { what: "date format", .. })
        ));
    }

    #[test]
    fn unknown_specifier_fails_the_block() {
        let block = PollingBlock::new(
            BlockState::new("Date"),
            Duration::from_secs(1),
            Date::new("%H:%M", "%Q"),
        );
        assert!(matches!(block.refresh(), Status::Failed(_)));
        let result = block.result();
        assert!(result.full_text.starts_with("Error in Date"));
        assert_eq!(result.style.urgent, Some(true));
    }
}
