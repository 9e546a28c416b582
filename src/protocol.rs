use serde::{Deserialize, Serialize};

/// Foreground colors shared by the blocks
pub mod color {
    pub const GOOD: &str = "#02ff02";
    pub const WARN: &str = "#ffff02";
    pub const URGENT: &str = "#ff0202";
}

/// First line of the output stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u8,
    pub click_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cont_signal: Option<i32>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            version: 1,
            click_events: true,
            stop_signal: None,
            cont_signal: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Markup {
    None,
    Pango,
}

/// Presentation fields of a block.
///
/// Every field is optional. A block keeps one `Style` given at construction,
/// which acts as the fallback for fields an update leaves unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_top: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_right: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_bottom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator_block_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<Markup>,
}

impl Style {
    /// What every block starts out with
    #[must_use]
    pub fn base() -> Self {
        Self {
            urgent: Some(false),
            separator: Some(true),
            markup: Some(Markup::None),
            ..Self::default()
        }
    }

    /// Fills every unset field from `floor`
    #[must_use]
    pub fn or(self, floor: &Style) -> Style {
        Style {
            color: self.color.or_else(|| floor.color.clone()),
            background: self.background.or_else(|| floor.background.clone()),
            border: self.border.or_else(|| floor.border.clone()),
            border_top: self.border_top.or_else(|| floor.border_top.clone()),
            border_right: self.border_right.or_else(|| floor.border_right.clone()),
            border_bottom: self.border_bottom.or_else(|| floor.border_bottom.clone()),
            border_left: self.border_left.or_else(|| floor.border_left.clone()),
            min_width: self.min_width.or(floor.min_width),
            align: self.align.or(floor.align),
            urgent: self.urgent.or(floor.urgent),
            separator: self.separator.or(floor.separator),
            separator_block_width: self.separator_block_width.or(floor.separator_block_width),
            markup: self.markup.or(floor.markup),
        }
    }
}

/// One block as it appears in a status line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct I3Block {
    pub name: String,
    pub instance: String,
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_text: Option<String>,
    #[serde(flatten)]
    pub style: Style,
}

/// A click event received from i3
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickEvent {
    pub name: Option<String>,
    pub instance: Option<String>,
    pub x: i32,
    pub y: i32,
    pub button: u8,
    pub relative_x: i32,
    pub relative_y: i32,
    pub width: i32,
    pub height: i32,
    pub modifiers: Vec<String>,
}
