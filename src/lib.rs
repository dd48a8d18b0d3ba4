//! Supervision of an AVR peer board over a UART link.
//!
//! The peer is driven two ways. Normally it exchanges short text commands,
//! one transaction at a time, through [`link::PeerLink`]. To reprogram it,
//! the same link switches to the STK500v1 bootloader protocol and streams
//! an Intel-HEX image into it page by page.

pub use boards::{PeerBoard, serial_port_from_product_id};
pub use error::{LinkError, LinkResult};
pub use link::PeerLink;
pub use peer::{ClientId, ReplySink};

pub mod boards;
pub(crate) mod constants;
pub mod error;
pub mod flash;
pub mod interface;
pub mod intel_hex;
pub mod line;
pub mod link;
pub mod log_buffer;
pub mod peer;
pub mod protocols;
pub mod scheduler;
pub(crate) mod util;

pub use constants::{
    COMMAND_BAUD_RATE, DEFAULT_RESPONSE_TIMEOUT_MS, HANDSHAKE_DELAY_MS, HEX_LINE_BUFFER_SIZE,
    LINE_BUFFER_SIZE, PAGE_SIZE, PEER_LOG_CAPACITY,
};
