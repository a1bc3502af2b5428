//! Frame dispatcher: validates one received RTU frame against the slave
//! context, executes the requested function and transmits the response.
//!
//! This is a pure request/response transform. The only state it touches is
//! the context's reusable response buffer, which is zero-filled again before
//! every invocation returns successfully.

use log::{debug, warn};

use super::crc::crc16_modbus;
use super::slave::{SlaveContext, MIN_FRAME_LEN};
use crate::utils::error::SlaveError;

/// Modbus limit for function 0x01.
pub const MAX_READ_COILS: u16 = 2000;
/// Modbus limit for function 0x03.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Mask Write Register frames carry two 16-bit masks instead of a single
/// value word, so they are two bytes longer than the minimum frame.
const MASK_WRITE_FRAME_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = 0x01,
    ReadHoldingRegisters = 0x03,
    WriteSingleRegister = 0x06,
    MaskWriteRegister = 0x16,
}

impl FunctionCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = SlaveError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FunctionCode::ReadCoils),
            0x03 => Ok(FunctionCode::ReadHoldingRegisters),
            0x06 => Ok(FunctionCode::WriteSingleRegister),
            0x16 => Ok(FunctionCode::MaskWriteRegister),
            other => Err(SlaveError::UnsupportedFunction(other)),
        }
    }
}

/// Outcome of a successfully handled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Read(FunctionCode),
    Write(FunctionCode),
}

impl SlaveContext {
    /// Handle one received frame: validate, execute, transmit the response.
    ///
    /// The first failing check rejects the whole frame; nothing is ever
    /// transmitted for a rejected frame and the response buffer stays clean.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<Handled, SlaveError> {
        let result = self.dispatch(frame);
        match &result {
            Ok(handled) => debug!("✅ Frame handled: {:?}", handled),
            Err(err) => warn!("🚫 Frame rejected: {}", err),
        }
        result
    }

    fn dispatch(&mut self, frame: &[u8]) -> Result<Handled, SlaveError> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(SlaveError::FrameTooShort(frame.len()));
        }

        if frame[0] != self.id {
            return Err(SlaveError::IdMismatch {
                got: frame[0],
                expected: self.id,
            });
        }

        let crc_pos = frame.len() - 2;
        let recv_crc = u16::from_le_bytes([frame[crc_pos], frame[crc_pos + 1]]);
        if recv_crc != crc16_modbus(&frame[..crc_pos]) {
            return Err(SlaveError::CrcMismatch);
        }

        let function = FunctionCode::try_from(frame[1])?;
        let address = u16::from_be_bytes([frame[2], frame[3]]);
        let word = u16::from_be_bytes([frame[4], frame[5]]);

        match function {
            FunctionCode::ReadCoils => self.read_coils(address, word),
            FunctionCode::ReadHoldingRegisters => self.read_holding_registers(address, word),
            FunctionCode::WriteSingleRegister => self.write_single_register(frame, address, word),
            FunctionCode::MaskWriteRegister => self.mask_write_register(frame, address),
        }
    }

    /// Function 0x01: pack the requested coil run LSB-first into the
    /// response, one bit per cell, non-zero cell value meaning ON.
    fn read_coils(&mut self, start: u16, quantity: u16) -> Result<Handled, SlaveError> {
        if quantity == 0 || quantity > MAX_READ_COILS {
            return Err(SlaveError::InvalidQuantity(quantity));
        }

        let byte_count = (quantity as usize + 7) / 8;
        let needed = 3 + byte_count + 2;
        if needed > self.buf.len() {
            return Err(SlaveError::ResponseTooLarge {
                needed,
                capacity: self.buf.len(),
            });
        }

        let run = self.coils.contiguous_run(start, quantity)?;

        self.buf[0] = self.id;
        self.buf[1] = FunctionCode::ReadCoils.as_u8();
        self.buf[2] = byte_count as u8;
        self.buf[3..3 + byte_count].fill(0);
        for (i, (_, cell)) in run.iter().enumerate() {
            if cell.is_on() {
                self.buf[3 + (i >> 3)] |= 1 << (i & 0x07);
            }
        }

        self.finish_response(3 + byte_count)?;
        Ok(Handled::Read(FunctionCode::ReadCoils))
    }

    /// Function 0x03: each register value big-endian, in ascending address
    /// order.
    fn read_holding_registers(&mut self, start: u16, quantity: u16) -> Result<Handled, SlaveError> {
        if quantity == 0 || quantity > MAX_READ_REGISTERS {
            return Err(SlaveError::InvalidQuantity(quantity));
        }

        let byte_count = quantity as usize * 2;
        let needed = 3 + byte_count + 2;
        if needed > self.buf.len() {
            return Err(SlaveError::ResponseTooLarge {
                needed,
                capacity: self.buf.len(),
            });
        }

        let run = self.holding_regs.contiguous_run(start, quantity)?;

        self.buf[0] = self.id;
        self.buf[1] = FunctionCode::ReadHoldingRegisters.as_u8();
        self.buf[2] = byte_count as u8;
        for (i, (_, cell)) in run.iter().enumerate() {
            let offset = 3 + i * 2;
            self.buf[offset..offset + 2].copy_from_slice(&cell.get().to_be_bytes());
        }

        self.finish_response(3 + byte_count)?;
        Ok(Handled::Read(FunctionCode::ReadHoldingRegisters))
    }

    /// Function 0x06: store the value, then echo the request verbatim
    /// (including its CRC), the standard response for this function.
    fn write_single_register(
        &mut self,
        frame: &[u8],
        address: u16,
        value: u16,
    ) -> Result<Handled, SlaveError> {
        let cell = self
            .write_regs
            .find(address)
            .ok_or(SlaveError::AddressNotMapped(address))?
            .clone();

        cell.set(value);
        self.transmitter.transmit(frame)?;
        Ok(Handled::Write(FunctionCode::WriteSingleRegister))
    }

    /// Function 0x16: apply `(current AND and_mask) OR (or_mask AND NOT
    /// and_mask)` to the target register, then echo the request verbatim.
    fn mask_write_register(&mut self, frame: &[u8], address: u16) -> Result<Handled, SlaveError> {
        if frame.len() < MASK_WRITE_FRAME_LEN {
            return Err(SlaveError::FrameTooShort(frame.len()));
        }

        let cell = self
            .write_regs
            .find(address)
            .ok_or(SlaveError::AddressNotMapped(address))?
            .clone();

        let and_mask = u16::from_be_bytes([frame[4], frame[5]]);
        let or_mask = u16::from_be_bytes([frame[6], frame[7]]);
        let current = cell.get();
        cell.set((current & and_mask) | (or_mask & !and_mask));

        self.transmitter.transmit(frame)?;
        Ok(Handled::Write(FunctionCode::MaskWriteRegister))
    }

    /// Append the CRC after `body_len` response bytes, transmit, then
    /// zero-fill the buffer so no response data survives into the next call.
    fn finish_response(&mut self, body_len: usize) -> Result<(), SlaveError> {
        let crc = crc16_modbus(&self.buf[..body_len]);
        self.buf[body_len..body_len + 2].copy_from_slice(&crc.to_le_bytes());

        let result = self.transmitter.transmit(&self.buf[..body_len + 2]);
        self.buf.fill(0);
        result.map_err(SlaveError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::registers::{CoilCell, RegisterCell};
    use crate::modbus::slave::SlaveConfig;
    use crate::utils::error::TransmitError;
    use std::sync::{Arc, Mutex};

    /// Transmitter that records every frame it is handed.
    #[derive(Clone, Default)]
    struct Capture {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Capture {
        fn sent(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }

        fn boxed(&self) -> Box<dyn crate::modbus::FrameTransmitter> {
            let frames = self.frames.clone();
            Box::new(move |frame: &[u8]| -> Result<(), TransmitError> {
                frames.lock().unwrap().push(frame.to_vec());
                Ok(())
            })
        }
    }

    /// Context matching the reference setup: 10 coils at 0..9, holding
    /// registers 0..4 = {100,200,300,400,500}, 3 write registers at 0..2.
    fn example_context(capture: &Capture) -> (SlaveContext, Vec<CoilCell>, Vec<RegisterCell>) {
        let coil_cells: Vec<CoilCell> = (0..10).map(|_| CoilCell::new(0)).collect();
        let write_cells: Vec<RegisterCell> = (0..3).map(|_| RegisterCell::new(0)).collect();

        let mut config = SlaveConfig::new(0x01);
        config.coils = coil_cells
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u16, c.clone()))
            .collect();
        config.holding_regs = [100u16, 200, 300, 400, 500]
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as u16, RegisterCell::new(v)))
            .collect();
        config.write_regs = write_cells
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u16, c.clone()))
            .collect();

        let ctx = SlaveContext::new(config, capture.boxed()).unwrap();
        (ctx, coil_cells, write_cells)
    }

    #[test]
    fn test_read_holding_registers_end_to_end() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);

        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x03, 0x05, 0xCB];
        let handled = ctx.handle_frame(&frame).unwrap();
        assert_eq!(handled, Handled::Read(FunctionCode::ReadHoldingRegisters));

        let sent = capture.sent();
        assert_eq!(sent.len(), 1);
        // 100 = 0x0064, 200 = 0x00C8, 300 = 0x012C, CRC low-first.
        assert_eq!(
            sent[0],
            vec![0x01, 0x03, 0x06, 0x00, 0x64, 0x00, 0xC8, 0x01, 0x2C, 0xD1, 0x0E]
        );
    }

    #[test]
    fn test_read_coils_bit_packing() {
        let capture = Capture::default();
        let (mut ctx, coil_cells, _) = example_context(&capture);

        // Coils 0, 2, 4, 5, 7 on -> first data byte 0b1011_0101 = 0xB5.
        for i in [0usize, 2, 4, 5, 7] {
            coil_cells[i].set(1);
        }

        let frame = [0x01, 0x01, 0x00, 0x00, 0x00, 0x08, 0x3D, 0xCC];
        let handled = ctx.handle_frame(&frame).unwrap();
        assert_eq!(handled, Handled::Read(FunctionCode::ReadCoils));

        let sent = capture.sent();
        assert_eq!(sent[0], vec![0x01, 0x01, 0x01, 0xB5, 0x90, 0x3F]);
    }

    #[test]
    fn test_read_coils_byte_count_rounds_up() {
        let capture = Capture::default();
        let (mut ctx, coil_cells, _) = example_context(&capture);
        coil_cells[0].set(1);
        coil_cells[2].set(0xFF); // any non-zero value counts as ON

        let frame = [0x01, 0x01, 0x00, 0x00, 0x00, 0x03, 0x7C, 0x0B];
        ctx.handle_frame(&frame).unwrap();

        let sent = capture.sent();
        assert_eq!(sent[0][2], 1); // ceil(3/8) data bytes
        assert_eq!(sent[0][3], 0b0000_0101);
    }

    #[test]
    fn test_write_single_register_stores_and_echoes() {
        let capture = Capture::default();
        let (mut ctx, _, write_cells) = example_context(&capture);

        let frame = [0x01, 0x06, 0x00, 0x00, 0x12, 0x34, 0x84, 0xBD];
        let handled = ctx.handle_frame(&frame).unwrap();
        assert_eq!(handled, Handled::Write(FunctionCode::WriteSingleRegister));

        assert_eq!(write_cells[0].get(), 0x1234);
        assert_eq!(capture.sent()[0], frame.to_vec());
    }

    #[test]
    fn test_mask_write_register_applies_masks() {
        let capture = Capture::default();
        let (mut ctx, _, write_cells) = example_context(&capture);
        write_cells[1].set(0x0012);

        // and=0x00F0, or=0x0025: (0x0012 & 0x00F0) | (0x0025 & !0x00F0) = 0x0015
        let frame = [0x01, 0x16, 0x00, 0x01, 0x00, 0xF0, 0x00, 0x25, 0x0A, 0x2E];
        let handled = ctx.handle_frame(&frame).unwrap();
        assert_eq!(handled, Handled::Write(FunctionCode::MaskWriteRegister));

        assert_eq!(write_cells[1].get(), 0x0015);
        assert_eq!(capture.sent()[0], frame.to_vec());
    }

    #[test]
    fn test_mask_write_requires_ten_bytes() {
        let capture = Capture::default();
        let (mut ctx, _, write_cells) = example_context(&capture);
        write_cells[0].set(0xAAAA);

        // Valid CRC over an 8-byte frame, but 0x16 needs the two mask words.
        let mut frame = vec![0x01, 0x16, 0x00, 0x00, 0x00, 0xF0];
        let crc = crc16_modbus(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::FrameTooShort(8))
        ));
        assert_eq!(write_cells[0].get(), 0xAAAA);
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_short_frame() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);
        assert!(matches!(
            ctx.handle_frame(&[0x01, 0x03, 0x00]),
            Err(SlaveError::FrameTooShort(3))
        ));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_id_mismatch() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);
        let frame = [0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x85, 0xF9];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::IdMismatch { got: 0x02, expected: 0x01 })
        ));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_corrupted_crc() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);
        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x03, 0x05, 0xCC];
        assert!(matches!(ctx.handle_frame(&frame), Err(SlaveError::CrcMismatch)));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_unsupported_function() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);
        let mut frame = vec![0x01, 0x05, 0x00, 0x00, 0xFF, 0x00];
        let crc = crc16_modbus(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::UnsupportedFunction(0x05))
        ));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_zero_and_oversized_quantity() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);

        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x45, 0xCA];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::InvalidQuantity(0))
        ));

        // 126 registers exceeds the 0x03 limit of 125.
        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x7E, 0xC5, 0xEA];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::InvalidQuantity(126))
        ));

        // 2001 coils exceeds the 0x01 limit of 2000.
        let frame = [0x01, 0x01, 0x00, 0x00, 0x07, 0xD1, 0xFE, 0x66];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::InvalidQuantity(2001))
        ));

        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_unmapped_start_address() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);
        let frame = [0x01, 0x03, 0x00, 0x10, 0x00, 0x01, 0x85, 0xCF];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::AddressNotMapped(0x10))
        ));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_run_past_mapped_range() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);
        // Holding registers stop at address 4; 3 registers from 3 needs 5.
        let frame = [0x01, 0x03, 0x00, 0x03, 0x00, 0x03, 0xF5, 0xCB];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::AddressGap(5))
        ));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_response_too_large_for_buffer() {
        let capture = Capture::default();
        let mut config = SlaveConfig::new(0x01);
        config.buf_size = 8; // fits the minimum frame but not 3 registers
        config.holding_regs = (0..5u16).map(|a| (a, RegisterCell::new(a))).collect();
        let mut ctx = SlaveContext::new(config, capture.boxed()).unwrap();

        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x03, 0x05, 0xCB];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::ResponseTooLarge { needed: 11, capacity: 8 })
        ));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_rejects_write_to_unmapped_register() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);
        let frame = [0x01, 0x06, 0x00, 0x05, 0x00, 0x2A, 0x18, 0x14];
        assert!(matches!(
            ctx.handle_frame(&frame),
            Err(SlaveError::AddressNotMapped(0x05))
        ));
        assert!(capture.sent().is_empty());
    }

    #[test]
    fn test_buffer_zeroed_after_response() {
        let capture = Capture::default();
        let (mut ctx, _, _) = example_context(&capture);

        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x03, 0x05, 0xCB];
        ctx.handle_frame(&frame).unwrap();
        assert!(ctx.buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_stale_buffer_never_leaks_into_next_response() {
        let capture = Capture::default();
        let (mut ctx, coil_cells, _) = example_context(&capture);

        // All eight coils on, then all off again: second response must not
        // carry bits from the first.
        for c in coil_cells.iter().take(8) {
            c.set(1);
        }
        let frame = [0x01, 0x01, 0x00, 0x00, 0x00, 0x08, 0x3D, 0xCC];
        ctx.handle_frame(&frame).unwrap();
        for c in coil_cells.iter().take(8) {
            c.set(0);
        }
        ctx.handle_frame(&frame).unwrap();

        let sent = capture.sent();
        assert_eq!(sent[0][3], 0xFF);
        assert_eq!(sent[1][3], 0x00);
    }

    #[test]
    fn test_write_after_read_visible_in_holding_table() {
        // The demo wires the same cells into holding and write tables; here
        // the write table is separate, so verify via the caller's cell clone.
        let capture = Capture::default();
        let (mut ctx, _, write_cells) = example_context(&capture);

        let frame = [0x01, 0x06, 0x00, 0x00, 0x12, 0x34, 0x84, 0xBD];
        ctx.handle_frame(&frame).unwrap();
        assert_eq!(write_cells[0].get(), 0x1234);

        // Echo must be byte-identical to the request.
        assert_eq!(capture.sent()[0], frame.to_vec());
    }

    #[test]
    fn test_function_code_try_from() {
        assert_eq!(FunctionCode::try_from(0x01).unwrap(), FunctionCode::ReadCoils);
        assert_eq!(FunctionCode::try_from(0x16).unwrap(), FunctionCode::MaskWriteRegister);
        assert!(matches!(
            FunctionCode::try_from(0x10),
            Err(SlaveError::UnsupportedFunction(0x10))
        ));
    }
}
