pub mod crc;
pub mod frame;
pub mod registers;
pub mod slave;

pub use crc::crc16_modbus;
pub use frame::{FunctionCode, Handled, MAX_READ_COILS, MAX_READ_REGISTERS};
pub use registers::{CoilCell, RegisterCell, RegisterTable};
pub use slave::{FrameTransmitter, SlaveConfig, SlaveContext, DEFAULT_BUF_SIZE, MIN_FRAME_LEN};
