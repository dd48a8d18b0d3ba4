//! Framing of the peer's text output into lines.
//!
//! Lines end with a bare `\n`. `\r` and every other non-printable byte are
//! dropped on receive, so a peer rebooting mid-line cannot inject control
//! characters into a line.

use crate::constants::LINE_BUFFER_SIZE;
use crate::error::{LinkError, LinkResult};

pub struct LineReceiver {
    buffer: [u8; LINE_BUFFER_SIZE],
    len: usize,
    overflowed: bool,
}

impl LineReceiver {
    pub const fn new() -> Self {
        LineReceiver {
            buffer: [0; LINE_BUFFER_SIZE],
            len: 0,
            overflowed: false,
        }
    }

    /// Feed one received byte. Returns the completed line when `byte` is
    /// the terminator.
    ///
    /// A line that does not fit the buffer yields `LineTooLong` once; the
    /// rest of it is discarded up to the next terminator.
    pub fn feed_byte(&mut self, byte: u8) -> LinkResult<Option<&str>> {
        if byte == b'\n' {
            let complete = self.len;
            self.len = 0;
            if self.overflowed {
                self.overflowed = false;
                return Ok(None);
            }
            // Only printable ASCII is ever stored
            let line = std::str::from_utf8(&self.buffer[..complete])
                .map_err(|e| LinkError::Communication(format!("{:?}", e)))?;
            return Ok(Some(line));
        }

        if !is_printable(byte) || self.overflowed {
            return Ok(None);
        }

        if self.len == self.buffer.len() {
            self.len = 0;
            self.overflowed = true;
            return Err(LinkError::LineTooLong {
                limit: LINE_BUFFER_SIZE,
            });
        }

        self.buffer[self.len] = byte;
        self.len += 1;
        Ok(None)
    }

    /// Bytes of the line collected so far
    pub fn pending(&self) -> usize {
        self.len
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.overflowed = false;
    }
}

impl Default for LineReceiver {
    fn default() -> Self {
        Self::new()
    }
}

fn is_printable(byte: u8) -> bool {
    byte == b' ' || byte.is_ascii_graphic()
}
