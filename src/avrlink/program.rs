use std::path::PathBuf;

use avrlink::{
    ClientId,
    error::{LinkError, LinkResult},
};
use clap::Parser;
use tracing::warn;

use crate::connection::{ConnectionOptions, open_link};

#[derive(Parser, Debug, Clone)]
pub(crate) struct FlashOptions {
    #[clap(flatten)]
    connection: ConnectionOptions,

    /// Firmware
    #[clap(short, long)]
    firmware: PathBuf,

    /// Do not wait for the peer to come back after flashing
    #[clap(long, default_value_t = false)]
    no_handshake: bool,
}

pub(crate) fn handle_flashing(opts: FlashOptions) -> LinkResult<()> {
    let mut link = open_link(&opts.connection)?;
    link.progress_bar(true);
    link.handshake_after_flash(!opts.no_handshake);

    let path = opts.firmware.to_str().ok_or_else(|| {
        LinkError::Configuration(format!("Firmware path {:?} is not UTF-8", opts.firmware))
    })?;
    link.flash_hex_file(ClientId(0), path)?;

    // Let the handshake run to completion
    while link.pending_commands() > 0 {
        // Read errors are logged by poll; the handshake still times out
        let _ = link.poll();
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    if link.output_suppressed() {
        warn!("Peer did not acknowledge the handshake");
    }

    Ok(())
}
