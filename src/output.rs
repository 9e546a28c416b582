use crate::protocol::{Header, I3Block};
use crate::registry::Registry;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tokio::sync::Mutex;

/// One tick: the blocks as a JSON array, continued with a comma
///
/// # Errors
/// Only if serde refuses a block
pub fn serialize_tick(blocks: &[I3Block]) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(blocks)?;
    line.push_str(",\n");
    Ok(line)
}

/// Header line followed by the opening of the endless array
///
/// # Errors
/// Only if serde refuses the header
pub fn serialize_preamble(header: &Header) -> serde_json::Result<String> {
    let mut lines = serde_json::to_string(header)?;
    lines.push_str("\n[\n");
    Ok(lines)
}

/// The output stream. Ticks, clicks and signals all write through here, one
/// complete line at a time.
pub struct Output<W> {
    sink: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> Output<W> {
    #[must_use]
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// # Errors
    /// When the host went away
    pub async fn write_preamble(&self, header: &Header) -> io::Result<()> {
        self.write(&serialize_preamble(header)?).await
    }

    /// Writes the current content of every block
    ///
    /// # Errors
    /// When the host went away
    pub async fn write_tick(&self, registry: &Registry) -> io::Result<()> {
        self.write(&serialize_tick(&registry.snapshot())?).await
    }

    async fn write(&self, text: &str) -> io::Result<()> {
        let mut sink = self.sink.lock().await;
        sink.write_all(text.as_bytes()).await?;
        sink.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockState, StaticBlock, Update};
    use std::sync::Arc;

    #[test]
    fn tick_is_comma_terminated_array() {
        let block = I3Block {
            name: "Date".to_owned(),
            instance: "default".to_owned(),
            full_text: "12:00".to_owned(),
            ..Default::default()
        };
        assert_eq!(
            serialize_tick(&[block]).unwrap(),
            "[{\"name\":\"Date\",\"instance\":\"default\",\"full_text\":\"12:00\"}],\n"
        );
        assert_eq!(serialize_tick(&[]).unwrap(), "[],\n");
    }

    #[test]
    fn preamble_opens_the_stream() {
        assert_eq!(
            serialize_preamble(&Header::default()).unwrap(),
            "{\"version\":1,\"click_events\":true}\n[\n"
        );
    }

    #[tokio::test]
    async fn writes_whole_lines() {
        let mut registry = Registry::default();
        registry
            .insert(Arc::new(StaticBlock::new(
                BlockState::new("Hello"),
                Update::new("OK"),
            )))
            .unwrap();

        let output = Output::new(Vec::new());
        output.write_preamble(&Header::default()).await.unwrap();
        output.write_tick(&registry).await.unwrap();
        output.write_tick(&registry).await.unwrap();

        let written = String::from_utf8(output.sink.into_inner()).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "[");
        assert_eq!(lines[2], lines[3]);
        assert!(lines[2].starts_with("[{\"name\":\"Hello\""));
        assert!(lines[2].ends_with("}],"));
    }
}
