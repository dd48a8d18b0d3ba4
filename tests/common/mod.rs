#![allow(dead_code)]

use std::collections::VecDeque;

use avrlink::{
    ClientId, PeerLink,
    error::{LinkError, LinkResult},
    interface::{Clock, ResetLine, SerialChannel},
};

pub const COMMAND_BAUD: u32 = 9600;
pub const BOOTLOADER_BAUD: u32 = 57600;
pub const ACK: [u8; 2] = [0x14, 0x10];

/// Serial port with a fake peer behind it. At the bootloader baud every
/// write is a frame answered by an ack; at the command baud writes are
/// collected as text.
pub struct FakePort {
    pub text: Vec<u8>,
    pub frames: Vec<Vec<u8>>,
    pub rx: VecDeque<u8>,
    pub baud: u32,
    pub baud_history: Vec<u32>,
    pub bootloader_alive: bool,
    pub corrupt_frame: Option<usize>,
    pub failing_reads: usize,
}

impl FakePort {
    pub fn new() -> Self {
        FakePort {
            text: Vec::new(),
            frames: Vec::new(),
            rx: VecDeque::new(),
            baud: COMMAND_BAUD,
            baud_history: Vec::new(),
            bootloader_alive: true,
            corrupt_frame: None,
            failing_reads: 0,
        }
    }

    pub fn inject(&mut self, text: &str) {
        self.rx.extend(text.bytes());
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

impl SerialChannel for FakePort {
    fn send(&mut self, bytes: &[u8]) -> LinkResult<()> {
        if self.baud != BOOTLOADER_BAUD {
            self.text.extend_from_slice(bytes);
            return Ok(());
        }

        let index = self.frames.len();
        self.frames.push(bytes.to_vec());
        if !self.bootloader_alive {
            return Ok(());
        }
        if self.corrupt_frame == Some(index) {
            self.rx.extend([0x00, 0x00]);
        } else {
            self.rx.extend(ACK);
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> LinkResult<usize> {
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(LinkError::Communication("read failed".to_string()));
        }
        Ok(self.rx.pop_front())
    }

    fn baud_rate(&self) -> LinkResult<u32> {
        Ok(self.baud)
    }

    fn set_baud_rate(&mut self, baud: u32) -> LinkResult<()> {
        self.baud = baud;
        self.baud_history.push(baud);
        Ok(())
    }

    fn clear_input(&mut self) -> LinkResult<()> {
        self.rx.clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeReset {
    pub levels: Vec<bool>,
}

impl ResetLine for FakeReset {
    fn set_high(&mut self) -> LinkResult<()> {
        self.levels.push(true);
        Ok(())
    }

    fn set_low(&mut self) -> LinkResult<()> {
        self.levels.push(false);
        Ok(())
    }
}

#[derive(Default)]
pub struct TestClock {
    pub now: u64,
}

impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u64) {
        self.now += ms;
    }
}

pub type Replies = Vec<(ClientId, String)>;
pub type TestLink = PeerLink<FakePort, FakeReset, TestClock, Replies>;

pub fn test_link() -> TestLink {
    PeerLink::new(
        FakePort::new(),
        FakeReset::default(),
        TestClock::default(),
        Vec::new(),
        BOOTLOADER_BAUD,
    )
}

pub fn advance(link: &mut TestLink, ms: u64) -> LinkResult<()> {
    link.clock_mut().now += ms;
    link.poll()
}

pub fn texts(replies: &Replies) -> Vec<&str> {
    replies.iter().map(|(_, text)| text.as_str()).collect()
}

