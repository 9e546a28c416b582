use crate::error::ProtocolError;
use crate::protocol::ClickEvent;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};

/// Cuts click event objects out of the endless JSON array i3 writes to stdin
pub struct ClickReader<R> {
    inner: R,
    opened: bool,
    object: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> ClickReader<R> {
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            opened: false,
            object: Vec::new(),
        }
    }

    /// Reads the next event, `None` at the end of the stream
    ///
    /// # Errors
    /// [`ProtocolError::Malformed`] leaves the reader usable, every other
    /// error means the stream cannot be followed any more.
    pub async fn next_event(&mut self) -> Result<Option<ClickEvent>, ProtocolError> {
        if !self.opened {
            match self.skip_separators().await? {
                None => return Ok(None),
                Some(b'[') => self.inner.consume(1),
                Some(found) => {
                    return Err(ProtocolError::UnexpectedByte {
                        expected: '[',
                        found: char::from(found),
                    })
                }
            }
            self.opened = true;
        }

        match self.skip_separators().await? {
            None | Some(b']') => Ok(None),
            Some(b'{') => {
                self.read_object().await?;
                Ok(Some(serde_json::from_slice(&self.object)?))
            }
            Some(found) => Err(ProtocolError::UnexpectedByte {
                expected: '{',
                found: char::from(found),
            }),
        }
    }

    /// Skips whitespace and commas, returns the next byte without consuming it
    async fn skip_separators(&mut self) -> io::Result<Option<u8>> {
        loop {
            let buf = self.inner.fill_buf().await?;
            let Some(&byte) = buf.first() else {
                return Ok(None);
            };
            if byte == b',' || byte.is_ascii_whitespace() {
                self.inner.consume(1);
            } else {
                return Ok(Some(byte));
            }
        }
    }

    /// Copies one balanced object into `self.object`
    async fn read_object(&mut self) -> Result<(), ProtocolError> {
        self.object.clear();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let buf = self.inner.fill_buf().await?;
            if buf.is_empty() {
                return Err(ProtocolError::UnexpectedEof);
            }
            let mut used = 0;
            let mut done = false;
            for &byte in buf {
                used += 1;
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if byte == b'\\' {
                        escaped = true;
                    } else if byte == b'"' {
                        in_string = false;
                    }
                    continue;
                }
                match byte {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            done = true;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            self.object.extend_from_slice(&buf[..used]);
            self.inner.consume(used);
            if done {
                return Ok(());
            }
        }
    }
}
