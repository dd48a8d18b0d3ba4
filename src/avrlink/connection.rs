use avrlink::{
    ClientId, PeerBoard, PeerLink, ReplySink,
    error::LinkResult,
    interface::serialport::{DtrResetLine, SerialPortDevice, SystemClock},
    serial_port_from_product_id,
};
use clap::Args;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub(crate) struct ConnectionOptions {
    /// Board type
    #[clap(short, long)]
    board: PeerBoard,

    /// Serial port
    #[clap(short, long)]
    serial: Option<String>,

    /// Baud rate of the command link
    #[clap(long)]
    baudrate: Option<u32>,
}

/// Prints replies for the local user
pub(crate) struct StdoutReplies;

impl ReplySink for StdoutReplies {
    fn deliver(&mut self, client: ClientId, text: &str) {
        println!("[{}] {}", client, text);
    }
}

pub(crate) type HostLink = PeerLink<SerialPortDevice, DtrResetLine, SystemClock, StdoutReplies>;

pub(crate) fn open_link(opts: &ConnectionOptions) -> LinkResult<HostLink> {
    let profile = opts.board.profile();
    let port = match &opts.serial {
        Some(port) => port.clone(),
        None => serial_port_from_product_id(&profile.product_ids)?,
    };
    let baud = opts.baudrate.unwrap_or(profile.command_baud);

    info!("Opening {} at {} baud", port, baud);
    let device = SerialPortDevice::new(port, baud)?;
    let reset = device.reset_line()?;

    Ok(PeerLink::new(
        device,
        reset,
        SystemClock::new(),
        StdoutReplies,
        profile.bootloader_baud,
    ))
}
