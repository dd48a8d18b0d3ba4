use crate::error::LinkResult;
use crate::intel_hex::FlashPage;

pub mod stk500v1;

/// Bootloader session able to write whole flash pages. Currently only
/// STK500v1; the flashing loop only depends on this.
pub trait PageProgrammer {
    /// Reset the target into its bootloader and enter programming mode
    fn setup_device(&mut self) -> LinkResult<()>;

    /// Write one page
    fn flash_page(&mut self, page: &FlashPage) -> LinkResult<()>;

    /// Leave programming mode, starting the new firmware
    fn exit_prog_mode(&mut self) -> LinkResult<()>;
}
