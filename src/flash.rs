//! Reprogramming the peer from an Intel-HEX stream.
//!
//! Flashing blocks until done: every page write waits for the bootloader's
//! ack. The caller must keep the command scheduler away from the serial
//! channel meanwhile. A failure leaves the peer partially flashed.

use std::io::{BufRead, Read};

use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::constants::HEX_LINE_BUFFER_SIZE;
use crate::error::{LinkError, LinkResult};
use crate::interface::{Clock, ResetLine, SerialChannel};
use crate::intel_hex::HexPageDecoder;
use crate::protocols::PageProgrammer;
use crate::protocols::stk500v1::Stk500v1;

/// Read one line of at most `HEX_LINE_BUFFER_SIZE` characters, not
/// counting its terminator. `None` at end of input.
pub(crate) fn read_hex_line<'a, R: BufRead>(
    reader: &mut R,
    buf: &'a mut Vec<u8>,
) -> LinkResult<Option<&'a str>> {
    buf.clear();
    // Content, CR and LF
    let limit = HEX_LINE_BUFFER_SIZE + 2;
    let read = reader
        .by_ref()
        .take(limit as u64)
        .read_until(b'\n', buf)
        .map_err(|e| LinkError::Firmware(format!("Could not read hex source: {}", e)))?;
    if read == 0 {
        return Ok(None);
    }

    let terminated = buf.ends_with(b"\n");
    let mut content: &[u8] = buf;
    while let [rest @ .., b'\n' | b'\r'] = content {
        content = rest;
    }
    if content.len() > HEX_LINE_BUFFER_SIZE || (!terminated && read == limit) {
        return Err(LinkError::LineTooLong {
            limit: HEX_LINE_BUFFER_SIZE,
        });
    }

    std::str::from_utf8(content)
        .map(Some)
        .map_err(|_| LinkError::MalformedRecord("record is not ASCII".to_string()))
}

/// Enter the bootloader, write every page of `hex`, leave the bootloader.
/// Returns the number of pages written.
pub fn program_pages<P, H>(programmer: &mut P, mut hex: H, progress: &ProgressBar) -> LinkResult<usize>
where
    P: PageProgrammer,
    H: BufRead,
{
    programmer.setup_device()?;

    let mut decoder = HexPageDecoder::new();
    let mut line = Vec::with_capacity(HEX_LINE_BUFFER_SIZE + 2);
    let mut pages = 0;

    while let Some(record) = read_hex_line(&mut hex, &mut line)? {
        progress.inc(record.len() as u64 + 1);
        decoder.parse_line(record)?;

        while let Some(page) = decoder.take_page() {
            programmer.flash_page(&page)?;
            pages += 1;
        }
    }

    if !decoder.end_of_file() {
        warn!("Hex source ended without an end-of-file record");
        return Err(LinkError::Firmware(
            "hex file ended without end-of-file record".to_string(),
        ));
    }

    programmer.exit_prog_mode()?;
    info!("Programmed {} pages", pages);
    Ok(pages)
}

/// Flash the peer over `serial` at `bootloader_baud`, restoring the
/// previous line speed afterwards whatever the outcome.
pub fn flash_firmware<S, R, C, H>(
    serial: &mut S,
    reset: R,
    clock: C,
    hex: H,
    bootloader_baud: u32,
    progress: &ProgressBar,
) -> LinkResult<usize>
where
    S: SerialChannel + ?Sized,
    R: ResetLine,
    C: Clock,
    H: BufRead,
{
    let original_baud = serial.baud_rate()?;
    serial.set_baud_rate(bootloader_baud)?;

    let result = serial
        .clear_input()
        .and_then(|_| Stk500v1::new(&mut *serial, reset, clock))
        .and_then(|mut stk500| program_pages(&mut stk500, hex, progress));

    let restored = serial.set_baud_rate(original_baud);
    match (result, restored) {
        (Ok(pages), restored) => restored.map(|_| pages),
        (Err(e), Err(restore_error)) => {
            warn!("Could not restore baud {}: {}", original_baud, restore_error);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}
