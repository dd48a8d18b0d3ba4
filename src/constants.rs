pub(crate) const SERIAL_TIMEOUT_MS: u64 = 1;

pub(crate) const ACK_TIMEOUT_MS: u64 = 1000;
pub(crate) const ACK_POLL_INTERVAL_MS: u64 = 1;

pub(crate) const RESET_LOW_MS: u64 = 1;
pub(crate) const POST_RESET_BOOTUP_DELAY_MS: u64 = 200;

pub const PAGE_SIZE: usize = 128;
/// Load address advance per page, in 16-bit words.
pub(crate) const PAGE_WORDS: u8 = 0x40;
pub(crate) const MAX_RECORD_DATA: usize = 255;

pub const LINE_BUFFER_SIZE: usize = 256;
pub const HEX_LINE_BUFFER_SIZE: usize = 128;

pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 3000;
pub const PEER_LOG_CAPACITY: usize = 2 * 1024;

pub const COMMAND_BAUD_RATE: u32 = 9600;
/// Time the peer needs to boot its new firmware before the handshake
pub const HANDSHAKE_DELAY_MS: u64 = 1000;
