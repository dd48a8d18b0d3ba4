pub mod serialport;

use crate::error::LinkResult;

/// Byte-oriented duplex link to the peer board
pub trait SerialChannel {
    /// Write all bytes to the peer
    fn send(&mut self, bytes: &[u8]) -> LinkResult<()>;

    /// Number of received bytes that can be read without blocking
    fn bytes_available(&mut self) -> LinkResult<usize>;

    /// Read one byte, `None` when nothing is pending
    fn read_byte(&mut self) -> LinkResult<Option<u8>>;

    /// Current line speed
    fn baud_rate(&self) -> LinkResult<u32>;

    /// Switch line speed
    fn set_baud_rate(&mut self, baud: u32) -> LinkResult<()>;

    /// Drop any stale input
    fn clear_input(&mut self) -> LinkResult<()>;
}

/// Reset line of the peer, idle high
pub trait ResetLine {
    fn set_high(&mut self) -> LinkResult<()>;
    fn set_low(&mut self) -> LinkResult<()>;
}

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn delay_ms(&mut self, ms: u64);
}

impl<T: SerialChannel + ?Sized> SerialChannel for &mut T {
    fn send(&mut self, bytes: &[u8]) -> LinkResult<()> {
        (**self).send(bytes)
    }

    fn bytes_available(&mut self) -> LinkResult<usize> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        (**self).read_byte()
    }

    fn baud_rate(&self) -> LinkResult<u32> {
        (**self).baud_rate()
    }

    fn set_baud_rate(&mut self, baud: u32) -> LinkResult<()> {
        (**self).set_baud_rate(baud)
    }

    fn clear_input(&mut self) -> LinkResult<()> {
        (**self).clear_input()
    }
}

impl<T: ResetLine + ?Sized> ResetLine for &mut T {
    fn set_high(&mut self) -> LinkResult<()> {
        (**self).set_high()
    }

    fn set_low(&mut self) -> LinkResult<()> {
        (**self).set_low()
    }
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn delay_ms(&mut self, ms: u64) {
        (**self).delay_ms(ms)
    }
}
