use tracing::trace;

use super::{Clock, ResetLine, SerialChannel};
use crate::constants::SERIAL_TIMEOUT_MS;

use crate::error::{LinkError, LinkResult};
use serialport::ClearBuffer;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

pub type ComPort = String;
pub type BaudRate = u32;

/// Host serial port to the peer board
pub struct SerialPortDevice {
    pub serial_port: Box<dyn serialport::SerialPort>,
}

impl SerialPortDevice {
    pub fn new(port: ComPort, baud: BaudRate) -> LinkResult<SerialPortDevice> {
        let serial_port = serialport::new(port, baud)
            .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
            .dtr_on_open(false)
            .open()
            .map_err(|e| LinkError::Communication(format!("{:?}", e)))?;

        Ok(SerialPortDevice { serial_port })
    }

    /// Handle on the modem control lines of the same port, used as the
    /// peer's reset line
    pub fn reset_line(&self) -> LinkResult<DtrResetLine> {
        let serial_port = self
            .serial_port
            .try_clone()
            .map_err(|e| LinkError::Communication(format!("Failed to clone port: {:?}", e)))?;
        Ok(DtrResetLine { serial_port })
    }
}

/// DTR/RTS drive the peer's reset pin through the auto-reset capacitor;
/// asserting them pulls reset low.
pub struct DtrResetLine {
    serial_port: Box<dyn serialport::SerialPort>,
}

impl SerialChannel for SerialPortDevice {
    fn send(&mut self, bytes: &[u8]) -> LinkResult<()> {
        self.serial_port
            .write_all(bytes)
            .map_err(|e| LinkError::Communication(format!("{:?}", e)))?;
        trace!("Sent bytes {:02x?}", bytes);
        Ok(())
    }

    fn bytes_available(&mut self) -> LinkResult<usize> {
        let count = self
            .serial_port
            .bytes_to_read()
            .map_err(|e| LinkError::Communication(format!("{:?}", e)))?;
        Ok(count as usize)
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        if self.bytes_available()? == 0 {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        let size = self
            .serial_port
            .read(&mut byte)
            // Timeout error is fine, just continue
            .or_else(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    Ok(0)
                } else {
                    Err(e)
                }
            })
            .map_err(|e| LinkError::Communication(format!("{:?}", e)))?;

        Ok((size == 1).then_some(byte[0]))
    }

    fn baud_rate(&self) -> LinkResult<u32> {
        self.serial_port
            .baud_rate()
            .map_err(|e| LinkError::Communication(format!("Failed to read baud rate: {:?}", e)))
    }

    fn set_baud_rate(&mut self, baud: u32) -> LinkResult<()> {
        self.serial_port
            .set_baud_rate(baud)
            .map_err(|e| LinkError::Communication(format!("Failed to set baud {}: {:?}", baud, e)))
    }

    fn clear_input(&mut self) -> LinkResult<()> {
        self.serial_port.clear(ClearBuffer::Input).map_err(|e| {
            LinkError::Communication(format!("Failed to clear receive buffer, {}", e))
        })
    }
}

impl ResetLine for DtrResetLine {
    fn set_low(&mut self) -> LinkResult<()> {
        self.serial_port
            .write_data_terminal_ready(true)
            .map_err(|e| LinkError::Communication(format!("Failed to set DTR true: {:?}", e)))?;
        self.serial_port
            .write_request_to_send(true)
            .map_err(|e| LinkError::Communication(format!("Failed to set RTS true: {:?}", e)))
    }

    fn set_high(&mut self) -> LinkResult<()> {
        self.serial_port
            .write_data_terminal_ready(false)
            .map_err(|e| LinkError::Communication(format!("Failed to set DTR false: {:?}", e)))?;
        self.serial_port
            .write_request_to_send(false)
            .map_err(|e| LinkError::Communication(format!("Failed to set RTS false: {:?}", e)))
    }
}

/// Wall clock measured from process start
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}
