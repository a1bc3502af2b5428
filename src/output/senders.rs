use log::debug;

use super::formatters::{FrameDirection, FrameFormatter};
use crate::modbus::FrameTransmitter;
use crate::utils::error::TransmitError;

/// Transmitter that renders every outgoing frame with a [`FrameFormatter`]
/// and prints it to stdout. Stands in for a serial port in the demo binary;
/// real deployments supply their own [`FrameTransmitter`] wired to the UART.
pub struct TraceTransmitter {
    formatter: Box<dyn FrameFormatter>,
}

impl TraceTransmitter {
    pub fn new(formatter: Box<dyn FrameFormatter>) -> Self {
        Self { formatter }
    }
}

impl FrameTransmitter for TraceTransmitter {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), TransmitError> {
        let line = self.formatter.format_frame(FrameDirection::Tx, frame);
        println!("{}", line);
        debug!("Transmitted {} response bytes", frame.len());
        Ok(())
    }
}
