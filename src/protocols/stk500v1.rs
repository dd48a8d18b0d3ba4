use tracing::{debug, info, trace, warn};

use crate::constants::{
    ACK_POLL_INTERVAL_MS, ACK_TIMEOUT_MS, PAGE_SIZE, POST_RESET_BOOTUP_DELAY_MS, RESET_LOW_MS,
};
use crate::error::{LinkError, LinkResult};
use crate::interface::{Clock, ResetLine, SerialChannel};
use crate::intel_hex::{FlashPage, LoadAddress};
use crate::protocols::PageProgrammer;

#[repr(u8)]
pub enum Stk500v1Message {
    CmndStkGetSync = 0x30,
    CmndStkSetDevice = 0x42,
    CmndStkSetDeviceExt = 0x45,
    CmndStkEnterProgMode = 0x50,
    CmndStkLeaveProgMode = 0x51,
    CmndStkLoadAddress = 0x55,
    CmndStkProgPage = 0x64,
    SyncCrcEop = 0x20,
    RespStkInSync = 0x14,
    RespStkOk = 0x10,
}

const ACK: [u8; 2] = [
    Stk500v1Message::RespStkInSync as u8,
    Stk500v1Message::RespStkOk as u8,
];

/// Device parameters for an ATmega328p as the Arduino bootloader expects them
const PROG_PARAMS: [u8; 20] = [
    0x86, // Device code
    0x00, // Revision
    0x00, // ProgType
    0x01, // ParMode
    0x01, // Polling
    0x01, // SelfTimed
    0x01, // LockBytes
    0x03, // FuseBytes
    0xff, // FlashPollVal1
    0xff, // FlashPollVal2
    0xff, // eepromPollVal1
    0xff, // eepromPollVal2
    0x00, // PageSizeHigh
    0x80, // PageSizeLow
    0x04, // eepromSizeHigh
    0x00, // eepromSizeLow
    0x00, // FlashSize4
    0x00, // FlashSize3
    0x80, // FlashSize2
    0x00, // FlashSize1
];

const EXT_PROG_PARAMS: [u8; 5] = [
    0x05, // Command size
    0x04, // eepromPageSize
    0xd7, // signalPAGEL
    0xc2, // signalBS2
    0x00, // ResetDisable
];

/// Write-flash header for a 128 byte page
const PROG_PAGE_HEADER: [u8; 4] = [
    Stk500v1Message::CmndStkProgPage as u8,
    0x00,
    PAGE_SIZE as u8,
    b'F',
];

/// STK500v1 session against the peer's bootloader.
///
/// Every exchange is blocking: after a command the session polls the
/// channel every millisecond for up to a second for the two ack bytes.
pub struct Stk500v1<S, R, C> {
    serial: S,
    reset: R,
    clock: C,
}

impl<S, R, C> Stk500v1<S, R, C>
where
    S: SerialChannel,
    R: ResetLine,
    C: Clock,
{
    pub fn new(serial: S, mut reset: R, clock: C) -> LinkResult<Self> {
        reset.set_high()?;
        Ok(Stk500v1 {
            serial,
            reset,
            clock,
        })
    }

    pub fn release(self) -> (S, R, C) {
        (self.serial, self.reset, self.clock)
    }

    fn reset_mcu(&mut self) -> LinkResult<()> {
        debug!("Resetting target");
        self.reset.set_low()?;
        self.clock.delay_ms(RESET_LOW_MS);
        self.reset.set_high()?;
        self.clock.delay_ms(POST_RESET_BOOTUP_DELAY_MS);
        Ok(())
    }

    /// Poll until `count` bytes are buffered or the ack timeout elapses
    fn wait_for_serial_data(&mut self, count: usize) -> LinkResult<bool> {
        let mut waited = 0;
        while waited < ACK_TIMEOUT_MS {
            if self.serial.bytes_available()? >= count {
                return Ok(true);
            }
            self.clock.delay_ms(ACK_POLL_INTERVAL_MS);
            waited += ACK_POLL_INTERVAL_MS;
        }
        Ok(false)
    }

    /// Read the two response bytes, `None` if they never arrived
    fn read_response(&mut self) -> LinkResult<Option<[u8; 2]>> {
        if !self.wait_for_serial_data(ACK.len())? {
            return Ok(None);
        }
        let first = self.serial.read_byte()?;
        let second = self.serial.read_byte()?;
        match (first, second) {
            (Some(a), Some(b)) => Ok(Some([a, b])),
            _ => Ok(None),
        }
    }

    fn send_command_and_verify_ack(&mut self, cmd: &[u8]) -> LinkResult<bool> {
        self.serial.send(cmd)?;
        trace!("Sent command {:02x?}", cmd);

        let response = self.read_response()?;
        debug!("Response {:02x?} to command 0x{:02x}", response, cmd[0]);
        Ok(response == Some(ACK))
    }

    fn exec_cmd(&mut self, cmd: Stk500v1Message) -> LinkResult<bool> {
        self.send_command_and_verify_ack(&[cmd as u8, Stk500v1Message::SyncCrcEop as u8])
    }

    fn exec_param(&mut self, cmd: Stk500v1Message, params: &[u8]) -> LinkResult<bool> {
        let bytes = [
            &[cmd as u8][..],
            params,
            &[Stk500v1Message::SyncCrcEop as u8][..],
        ]
        .concat();
        self.send_command_and_verify_ack(&bytes)
    }

    pub fn sync(&mut self) -> LinkResult<()> {
        info!("Attempting to sync with target");
        if !self.exec_cmd(Stk500v1Message::CmndStkGetSync)? {
            return Err(LinkError::Sync);
        }
        info!("Synced with MCU");
        Ok(())
    }

    fn set_prog_params(&mut self) -> LinkResult<()> {
        if !self.exec_param(Stk500v1Message::CmndStkSetDevice, &PROG_PARAMS)? {
            return Err(LinkError::SetParameters);
        }
        debug!("Set options");
        Ok(())
    }

    fn set_ext_prog_params(&mut self) -> LinkResult<()> {
        if !self.exec_param(Stk500v1Message::CmndStkSetDeviceExt, &EXT_PROG_PARAMS)? {
            return Err(LinkError::SetExtendedParameters);
        }
        debug!("Set extended options");
        Ok(())
    }

    fn enter_prog_mode(&mut self) -> LinkResult<()> {
        if !self.exec_cmd(Stk500v1Message::CmndStkEnterProgMode)? {
            return Err(LinkError::EnterProgMode);
        }
        info!("Entered programming mode!");
        Ok(())
    }

    /// Word address, low byte first on the wire
    fn load_address(&mut self, address: LoadAddress) -> LinkResult<bool> {
        self.exec_param(Stk500v1Message::CmndStkLoadAddress, &[address.lo, address.hi])
    }
}

impl<S, R, C> PageProgrammer for Stk500v1<S, R, C>
where
    S: SerialChannel,
    R: ResetLine,
    C: Clock,
{
    fn setup_device(&mut self) -> LinkResult<()> {
        self.reset_mcu()?;
        self.sync()?;
        self.set_prog_params()?;
        self.set_ext_prog_params()?;
        self.enter_prog_mode()
    }

    fn flash_page(&mut self, page: &FlashPage) -> LinkResult<()> {
        let address = page.address;
        if !self.load_address(address)? {
            warn!("Load address {} not acknowledged", address);
            return Err(LinkError::PageWrite { address });
        }

        let bytes = [
            &PROG_PAGE_HEADER[..],
            &page.data[..],
            &[Stk500v1Message::SyncCrcEop as u8][..],
        ]
        .concat();
        self.serial.send(&bytes)?;

        match self.read_response()? {
            Some(ACK) => {
                debug!("Wrote page at {}", address);
                Ok(())
            }
            response => {
                warn!("Page write at {} answered {:02x?}", address, response);
                Err(LinkError::PageWrite { address })
            }
        }
    }

    fn exit_prog_mode(&mut self) -> LinkResult<()> {
        if !self.exec_cmd(Stk500v1Message::CmndStkLeaveProgMode)? {
            return Err(LinkError::ExitProgMode);
        }
        info!("Left programming mode");
        Ok(())
    }
}
