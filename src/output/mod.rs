pub mod formatters;
pub mod senders;

pub use formatters::{ConsoleFormatter, FrameDirection, FrameFormatter, HexFormatter, JsonFormatter};
pub use senders::TraceTransmitter;
