//! Modbus RTU Slave Frame Engine
//!
//! This library answers Modbus RTU requests on behalf of a slave device:
//! it validates received frames (length, device id, CRC-16), resolves the
//! requested addresses in caller-supplied register tables and transmits the
//! encoded response through an injected callback. Supported functions:
//! Read Coils (0x01), Read Holding Registers (0x03), Write Single Register
//! (0x06) and Mask Write Register (0x16).
//!
//! Serial framing and timing are the caller's job; this crate consumes
//! complete frames and produces complete responses.

pub mod cli;
pub mod config;
pub mod modbus;
pub mod output;
pub mod utils;

// Re-export commonly used types
pub use config::{Settings, SlaveCells};
pub use modbus::{
    crc16_modbus, CoilCell, FrameTransmitter, FunctionCode, Handled, RegisterCell, RegisterTable,
    SlaveConfig, SlaveContext,
};
pub use output::{ConsoleFormatter, FrameFormatter, HexFormatter, JsonFormatter, TraceTransmitter};
pub use utils::error::{SlaveError, TransmitError};

pub const VERSION: &str = "0.1.0";
