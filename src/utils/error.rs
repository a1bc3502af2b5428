use thiserror::Error;

/// Error returned by a [`FrameTransmitter`](crate::modbus::FrameTransmitter)
/// implementation when the response could not be sent.
#[derive(Error, Debug)]
#[error("Transmit failed: {0}")]
pub struct TransmitError(pub String);

impl From<std::io::Error> for TransmitError {
    fn from(err: std::io::Error) -> Self {
        TransmitError(format!("IO error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum SlaveError {
    // --- configuration errors (fatal to context construction) ---
    #[error("No registers mapped: at least one register table must be non-empty")]
    NoRegistersMapped,

    #[error("Register map not strictly ascending at address 0x{0:04X}")]
    MapNotAscending(u16),

    #[error("Response buffer too small: {0} bytes")]
    BufferTooSmall(usize),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // --- frame rejections (per-frame, context left intact) ---
    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Device id mismatch: frame addressed to {got}, this slave is {expected}")]
    IdMismatch { got: u8, expected: u8 },

    #[error("CRC checksum mismatch")]
    CrcMismatch,

    #[error("Unsupported function code: 0x{0:02X}")]
    UnsupportedFunction(u8),

    #[error("Quantity out of range: {0}")]
    InvalidQuantity(u16),

    #[error("Response does not fit in buffer: {needed} > {capacity} bytes")]
    ResponseTooLarge { needed: usize, capacity: usize },

    #[error("Address not mapped: 0x{0:04X}")]
    AddressNotMapped(u16),

    #[error("Address gap: expected mapped address 0x{0:04X}")]
    AddressGap(u16),

    #[error("Transmit failed: {0}")]
    TransmitFailed(String),
}

impl SlaveError {
    /// True for errors that reject a single frame without invalidating the
    /// slave context. Configuration errors return false.
    pub fn is_frame_rejection(&self) -> bool {
        !matches!(
            self,
            SlaveError::NoRegistersMapped
                | SlaveError::MapNotAscending(_)
                | SlaveError::BufferTooSmall(_)
                | SlaveError::ConfigError(_)
        )
    }
}

impl From<TransmitError> for SlaveError {
    fn from(err: TransmitError) -> Self {
        SlaveError::TransmitFailed(err.0)
    }
}

impl From<std::io::Error> for SlaveError {
    fn from(err: std::io::Error) -> Self {
        SlaveError::TransmitFailed(format!("IO error: {}", err))
    }
}
