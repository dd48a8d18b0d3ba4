use thiserror::Error;

use crate::intel_hex::LoadAddress;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Firmware error: {0}")]
    Firmware(String),

    #[error("Line exceeds the {limit} byte buffer")]
    LineTooLong { limit: usize },

    #[error("Malformed hex record: {0}")]
    MalformedRecord(String),

    #[error("A ready flash page was not taken before the next record")]
    PageNotTaken,

    #[error("Bootloader did not answer sync")]
    Sync,

    #[error("Bootloader rejected programming parameters")]
    SetParameters,

    #[error("Bootloader rejected extended programming parameters")]
    SetExtendedParameters,

    #[error("Bootloader did not enter programming mode")]
    EnterProgMode,

    #[error("Bootloader did not leave programming mode")]
    ExitProgMode,

    #[error("Page write at {address} was not acknowledged")]
    PageWrite { address: LoadAddress },

    #[error("received unknown command \"{0}\"")]
    UnknownRequest(String),

    #[error("command \"{0}\" doesn't have parameters")]
    MissingParameter(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type LinkResult<T> = std::result::Result<T, LinkError>;
