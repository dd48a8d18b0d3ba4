mod common;

use std::io::Cursor;

use avrlink::{ClientId, HANDSHAKE_DELAY_MS, PAGE_SIZE};
use common::{BOOTLOADER_BAUD, COMMAND_BAUD, advance, test_link, texts};
use ihex::Record;
use indicatif::ProgressBar;

const CLIENT: ClientId = ClientId(3);

fn firmware(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

fn hex_image(bytes: &[u8]) -> String {
    let mut records: Vec<Record> = bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| Record::Data {
            offset: (i * 16) as u16,
            value: chunk.to_vec(),
        })
        .collect();
    records.push(Record::EndOfFile);
    ihex::create_object_file_representation(&records).unwrap()
}

#[test]
fn flashes_image_and_reconnects() {
    let bytes = firmware(300);
    let mut link = test_link();

    let pages = link
        .flash(CLIENT, Cursor::new(hex_image(&bytes)), &ProgressBar::hidden())
        .unwrap();
    assert_eq!(pages, 3);
    assert_eq!(texts(link.replies()), vec!["START FLASHING", "DONE"]);

    let port = link.serial_mut();
    assert_eq!(port.baud_history, vec![BOOTLOADER_BAUD, COMMAND_BAUD]);
    assert_eq!(port.frames.len(), 4 + 3 * 2 + 1);
    assert_eq!(port.frames[0], vec![0x30, 0x20]);
    assert_eq!(port.frames[1][0], 0x42);
    assert_eq!(port.frames[2][0], 0x45);
    assert_eq!(port.frames[3], vec![0x50, 0x20]);
    assert_eq!(port.frames[10], vec![0x51, 0x20]);

    let mut written = Vec::new();
    for (page, word) in [0x0000u16, 0x0040, 0x0080].into_iter().enumerate() {
        let load = &port.frames[4 + page * 2];
        assert_eq!(load, &vec![0x55, (word & 0xff) as u8, (word >> 8) as u8, 0x20]);

        let write = &port.frames[5 + page * 2];
        assert_eq!(&write[..4], &[0x64, 0x00, 0x80, 0x46]);
        assert_eq!(write[4 + PAGE_SIZE], 0x20);
        written.extend_from_slice(&write[4..4 + PAGE_SIZE]);
    }
    assert_eq!(&written[..300], &bytes[..]);
    assert!(written[300..].iter().all(|&b| b == 0xFF));

    // The peer reboots: its output is ignored until the handshake is acked
    assert!(link.output_suppressed());
    assert_eq!(link.pending_commands(), 1);
    link.poll().unwrap();
    assert!(link.serial_mut().text.is_empty());

    advance(&mut link, HANDSHAKE_DELAY_MS).unwrap();
    assert_eq!(link.serial_mut().text(), "ESP: connect\n");

    link.serial_mut().inject("\x00\x7fboot noise\r\n");
    link.poll().unwrap();
    assert!(link.log().is_empty());

    link.serial_mut().inject("TOESP: connect ACK\n");
    link.poll().unwrap();
    assert!(!link.output_suppressed());
    assert_eq!(link.pending_commands(), 0);

    link.serial_mut().inject("alarm armed\n");
    link.poll().unwrap();
    assert_eq!(link.log().contents(), "alarm armed\n");
}

#[test]
fn unacknowledged_page_aborts_flashing() {
    let mut link = test_link();
    // Frame 7 is the write of the second page
    link.serial_mut().corrupt_frame = Some(7);

    let result = link.flash(
        CLIENT,
        Cursor::new(hex_image(&firmware(300))),
        &ProgressBar::hidden(),
    );
    assert!(result.is_err());
    assert_eq!(
        texts(link.replies()),
        vec!["START FLASHING", "ERROR: Page write at 0x0040 was not acknowledged"]
    );

    let port = link.serial_mut();
    assert_eq!(port.frames.len(), 8);
    assert!(!port.frames.contains(&vec![0x51, 0x20]));
    assert_eq!(port.baud, COMMAND_BAUD);
    assert_eq!(link.pending_commands(), 0);
    assert!(!link.output_suppressed());
}

#[test]
fn silent_bootloader_fails_sync() {
    let mut link = test_link();
    link.serial_mut().bootloader_alive = false;

    let result = link.flash(
        CLIENT,
        Cursor::new(hex_image(&firmware(64))),
        &ProgressBar::hidden(),
    );
    assert!(result.is_err());
    assert_eq!(
        texts(link.replies()),
        vec!["START FLASHING", "ERROR: Bootloader did not answer sync"]
    );
    assert_eq!(link.serial_mut().frames, vec![vec![0x30, 0x20]]);
}

#[test]
fn stale_input_is_flushed_before_sync() {
    let mut link = test_link();
    link.serial_mut().inject("junk");

    link.flash(
        CLIENT,
        Cursor::new(hex_image(&firmware(16))),
        &ProgressBar::hidden(),
    )
    .unwrap();
    assert!(link.serial_mut().rx.is_empty());
}

#[test]
fn missing_firmware_file_is_reported() {
    let mut link = test_link();
    let result = link.flash_hex_file(CLIENT, "/nonexistent/firmware.hex");
    assert!(result.is_err());

    let replies = texts(link.replies());
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("ERROR: Firmware error: can not open firmware file"));
}
