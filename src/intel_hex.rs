//! Intel-HEX records to fixed size flash pages.
//!
//! Records are read by fixed offsets (`:LLAAAATT<data>CC`). The address
//! field is not used for placement: data records are assumed contiguous
//! from address zero. Checksums are not verified.

use std::fmt;

use tracing::{debug, trace};

use crate::constants::{MAX_RECORD_DATA, PAGE_SIZE, PAGE_WORDS};
use crate::error::{LinkError, LinkResult};

const RECORD_DATA: u8 = 0x00;
const RECORD_END_OF_FILE: u8 = 0x01;
const HEADER_LEN: usize = 9;

/// Word address of a flash page.
///
/// Stored as `hi`/`lo`; the bootloader's load-address command wants the
/// low byte first on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadAddress {
    pub hi: u8,
    pub lo: u8,
}

impl LoadAddress {
    pub fn from_word(word: u16) -> Self {
        let [hi, lo] = word.to_be_bytes();
        LoadAddress { hi, lo }
    }

    pub fn word(&self) -> u16 {
        u16::from_be_bytes([self.hi, self.lo])
    }

    /// Advance by one page: 0x40 words into the low byte, carrying into
    /// the high byte when the low byte wraps.
    fn bump(&mut self) {
        self.lo = self.lo.wrapping_add(PAGE_WORDS);
        if self.lo == 0 {
            self.hi = self.hi.wrapping_add(1);
        }
    }
}

impl fmt::Display for LoadAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.word())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPage {
    pub address: LoadAddress,
    pub data: [u8; PAGE_SIZE],
}

pub struct HexPageDecoder {
    page: [u8; PAGE_SIZE],
    fill: usize,
    /// Record bytes that did not fit the page being filled
    spill: [u8; MAX_RECORD_DATA],
    spill_len: usize,
    load_address: LoadAddress,
    pages_ready: usize,
    page_ready: bool,
    end_of_file: bool,
}

impl HexPageDecoder {
    pub fn new() -> Self {
        HexPageDecoder {
            page: [0xFF; PAGE_SIZE],
            fill: 0,
            spill: [0; MAX_RECORD_DATA],
            spill_len: 0,
            load_address: LoadAddress::default(),
            pages_ready: 0,
            page_ready: false,
            end_of_file: false,
        }
    }

    /// Decode one ASCII record. A ready page must be taken before the next
    /// record is fed.
    pub fn parse_line(&mut self, line: &str) -> LinkResult<()> {
        if self.page_ready {
            return Err(LinkError::PageNotTaken);
        }

        let record = line.trim_end_matches(['\r', '\n']).as_bytes();
        if record.is_empty() {
            return Ok(());
        }
        if record.len() < HEADER_LEN {
            return Err(LinkError::MalformedRecord(format!(
                "record of {} characters is shorter than its header",
                record.len()
            )));
        }

        let length = hex_byte(record, 1)? as usize;
        let record_type = hex_byte(record, 7)?;

        match record_type {
            RECORD_DATA => {
                if self.end_of_file {
                    debug!("Ignoring data record after end of file");
                    return Ok(());
                }
                let end = HEADER_LEN + length * 2;
                if record.len() < end {
                    return Err(LinkError::MalformedRecord(format!(
                        "record announces {} data bytes but carries {}",
                        length,
                        (record.len() - HEADER_LEN) / 2
                    )));
                }

                let mut data = [0u8; MAX_RECORD_DATA];
                for (i, byte) in data.iter_mut().take(length).enumerate() {
                    *byte = hex_byte(record, HEADER_LEN + i * 2)?;
                }
                trace!("Data record of {} bytes", length);
                self.append(&data[..length]);
            }
            RECORD_END_OF_FILE => {
                self.end_of_file = true;
                if self.fill > 0 {
                    self.page[self.fill..].fill(0xFF);
                    self.fill = PAGE_SIZE;
                    self.mark_ready();
                }
            }
            other => debug!("Skipping record type 0x{:02x}", other),
        }

        Ok(())
    }

    pub fn is_page_ready(&self) -> bool {
        self.page_ready
    }

    /// Hand out the ready page. Bytes stashed from an overflowing record
    /// start the next page, which may itself become ready at once.
    pub fn take_page(&mut self) -> Option<FlashPage> {
        if !self.page_ready {
            return None;
        }
        self.page_ready = false;

        let page = FlashPage {
            address: self.load_address,
            data: self.page,
        };

        self.fill = 0;
        if self.spill_len > 0 {
            let moved = self.spill_len.min(PAGE_SIZE);
            self.page[..moved].copy_from_slice(&self.spill[..moved]);
            self.spill.copy_within(moved..self.spill_len, 0);
            self.spill_len -= moved;
            self.fill = moved;
            if self.fill == PAGE_SIZE {
                self.mark_ready();
            }
        }

        Some(page)
    }

    /// Address the current (or next) page will be written to
    pub fn load_address(&self) -> LoadAddress {
        self.load_address
    }

    pub fn end_of_file(&self) -> bool {
        self.end_of_file
    }

    fn append(&mut self, data: &[u8]) {
        let fits = data.len().min(PAGE_SIZE - self.fill);
        self.page[self.fill..self.fill + fits].copy_from_slice(&data[..fits]);
        self.fill += fits;

        let rest = &data[fits..];
        self.spill[..rest.len()].copy_from_slice(rest);
        self.spill_len = rest.len();

        if self.fill == PAGE_SIZE {
            self.mark_ready();
        }
    }

    fn mark_ready(&mut self) {
        // The first page goes to address zero
        if self.pages_ready > 0 {
            self.load_address.bump();
        }
        self.pages_ready += 1;
        self.page_ready = true;
        debug!("Page ready for {}", self.load_address);
    }
}

impl Default for HexPageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_byte(record: &[u8], offset: usize) -> LinkResult<u8> {
    let digits = record
        .get(offset..offset + 2)
        .ok_or_else(|| LinkError::MalformedRecord(format!("record truncated at {}", offset)))?;
    let high = hex_digit(digits[0])?;
    let low = hex_digit(digits[1])?;
    Ok(high << 4 | low)
}

fn hex_digit(c: u8) -> LinkResult<u8> {
    (c as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| LinkError::MalformedRecord(format!("invalid hex digit {:?}", c as char)))
}
