use log::info;

use super::registers::{CoilCell, RegisterCell, RegisterTable};
use crate::utils::error::{SlaveError, TransmitError};

/// Shortest legal request frame: id + function + address + quantity/value + CRC.
pub const MIN_FRAME_LEN: usize = 8;

/// Default response buffer capacity. Large enough for the biggest responses
/// this engine can produce (125 holding registers, 2000 coils packed).
pub const DEFAULT_BUF_SIZE: usize = 256;

/// Injected transmit capability. The dispatcher calls this synchronously with
/// the complete response frame; the callee must have finished with the bytes
/// by the time it returns, because the underlying buffer is reused.
pub trait FrameTransmitter: Send {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), TransmitError>;
}

impl<F> FrameTransmitter for F
where
    F: FnMut(&[u8]) -> Result<(), TransmitError> + Send,
{
    fn transmit(&mut self, frame: &[u8]) -> Result<(), TransmitError> {
        self(frame)
    }
}

/// Register mappings and identity for one slave device, mirroring what the
/// caller hands over at construction time.
pub struct SlaveConfig {
    pub id: u8,
    pub buf_size: usize,
    /// 1-byte coil cells for function 0x01. Addresses strictly ascending.
    pub coils: Vec<(u16, CoilCell)>,
    /// Read-only 16-bit registers for function 0x03.
    pub holding_regs: Vec<(u16, RegisterCell)>,
    /// Writable 16-bit registers for functions 0x06 / 0x16.
    pub write_regs: Vec<(u16, RegisterCell)>,
}

impl SlaveConfig {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            buf_size: DEFAULT_BUF_SIZE,
            coils: Vec::new(),
            holding_regs: Vec::new(),
            write_regs: Vec::new(),
        }
    }
}

/// Long-lived per-device state: identity filter, the three register tables
/// and the reusable response buffer.
///
/// `handle_frame` takes `&mut self`, so a context cannot be re-entered while
/// a frame (including its transmit callback) is still being handled; callers
/// sharing a context across tasks must serialize access themselves.
/// Dropping the context releases the tables and the buffer; the caller-owned
/// cells outlive it.
pub struct SlaveContext {
    pub(crate) id: u8,
    pub(crate) buf: Vec<u8>,
    pub(crate) transmitter: Box<dyn FrameTransmitter>,
    pub(crate) coils: RegisterTable<CoilCell>,
    pub(crate) holding_regs: RegisterTable<RegisterCell>,
    pub(crate) write_regs: RegisterTable<RegisterCell>,
}

impl SlaveContext {
    pub fn new(
        config: SlaveConfig,
        transmitter: Box<dyn FrameTransmitter>,
    ) -> Result<Self, SlaveError> {
        if config.buf_size < MIN_FRAME_LEN {
            return Err(SlaveError::BufferTooSmall(config.buf_size));
        }

        let coils = RegisterTable::build(&config.coils)?;
        let holding_regs = RegisterTable::build(&config.holding_regs)?;
        let write_regs = RegisterTable::build(&config.write_regs)?;

        if coils.is_empty() && holding_regs.is_empty() && write_regs.is_empty() {
            return Err(SlaveError::NoRegistersMapped);
        }

        info!(
            "🔌 Slave context ready: id=0x{:02X}, {} coils, {} holding regs, {} write regs",
            config.id,
            coils.len(),
            holding_regs.len(),
            write_regs.len()
        );

        Ok(Self {
            id: config.id,
            buf: vec![0u8; config.buf_size],
            transmitter,
            coils,
            holding_regs,
            write_regs,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn buf_capacity(&self) -> usize {
        self.buf.len()
    }
}
