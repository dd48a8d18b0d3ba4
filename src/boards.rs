use clap::ValueEnum;

use crate::constants::COMMAND_BAUD_RATE;
use crate::error::{LinkError, LinkResult};

/// Peer boards whose bootloader speaks STK500v1 with 128 byte pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeerBoard {
    /// Atmega328p with optiboot
    ArduinoUno,

    /// Atmega328p with the old bootloader
    ArduinoNano,

    /// Same as Arduino Nano
    Atmega328p,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardProfile {
    pub bootloader_baud: u32,
    pub command_baud: u32,
    pub product_ids: Vec<u16>,
}

impl PeerBoard {
    pub fn profile(self) -> BoardProfile {
        match self {
            PeerBoard::ArduinoUno => BoardProfile {
                bootloader_baud: 115200,
                command_baud: COMMAND_BAUD_RATE,
                product_ids: vec![0x0043, 0x7523, 0x0001, 0xea60, 0x6015],
            },
            PeerBoard::ArduinoNano | PeerBoard::Atmega328p => BoardProfile {
                bootloader_baud: 57600,
                command_baud: COMMAND_BAUD_RATE,
                product_ids: vec![0x6001, 0x7523],
            },
        }
    }
}

/// Find the serial port where a board with one of `product_ids` is connected
pub fn serial_port_from_product_id(product_ids: &[u16]) -> LinkResult<String> {
    let ports = serialport::available_ports().map_err(|e| {
        LinkError::Configuration(format!("Could not get available ports. Err {:?}", e))
    })?;

    ports
        .into_iter()
        .find(|port| match &port.port_type {
            serialport::SerialPortType::UsbPort(info) => product_ids.contains(&info.pid),
            _ => false,
        })
        .map(|port| port.port_name)
        .ok_or_else(|| {
            LinkError::Configuration(format!(
                "Looked at all available serial ports; could not find one that matches one of \
                 product IDs {:04x?}. Try specifying a serial port for the given board?",
                product_ids
            ))
        })
}
