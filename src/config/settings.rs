use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::modbus::{CoilCell, RegisterCell, SlaveConfig, DEFAULT_BUF_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Device identity
    pub device_name: String,
    pub device_id: u8,

    // Response buffer capacity in bytes
    pub buf_size: usize,

    // Register layout
    pub coils: CoilBlock,
    pub holding_regs: RegisterBlock,
    pub write_regs: RegisterBlock,
}

/// Contiguous block of coil cells starting at `start_address`, one entry in
/// `initial` per coil.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoilBlock {
    pub start_address: u16,
    pub initial: Vec<u8>,
}

/// Contiguous block of 16-bit register cells starting at `start_address`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBlock {
    pub start_address: u16,
    pub initial: Vec<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        // Layout of the reference example: 10 coils, 5 holding registers
        // preloaded with 100..500, 3 writable registers.
        Self {
            device_name: "RTU Slave Device".to_string(),
            device_id: 0x01,
            buf_size: DEFAULT_BUF_SIZE,
            coils: CoilBlock {
                start_address: 0x0000,
                initial: vec![0; 10],
            },
            holding_regs: RegisterBlock {
                start_address: 0x0000,
                initial: vec![100, 200, 300, 400, 500],
            },
            write_regs: RegisterBlock {
                start_address: 0x0000,
                initial: vec![0; 3],
            },
        }
    }
}

impl Settings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = match matches.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        // Override with command line arguments
        if let Some(id) = matches.get_one::<String>("id") {
            settings.device_id = id.parse()?;
        }
        if let Some(buf_size) = matches.get_one::<String>("buf-size") {
            settings.buf_size = buf_size.parse()?;
        }

        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Materialize the configured register blocks into fresh cells and the
    /// mapping arrays a [`SlaveContext`](crate::modbus::SlaveContext) is
    /// built from. The returned [`SlaveCells`] holds the caller-side clones.
    pub fn slave_config(&self) -> (SlaveConfig, SlaveCells) {
        let coil_cells: Vec<CoilCell> = self.coils.initial.iter().map(|&v| CoilCell::new(v)).collect();
        let holding_cells: Vec<RegisterCell> = self
            .holding_regs
            .initial
            .iter()
            .map(|&v| RegisterCell::new(v))
            .collect();
        let write_cells: Vec<RegisterCell> = self
            .write_regs
            .initial
            .iter()
            .map(|&v| RegisterCell::new(v))
            .collect();

        let mut config = SlaveConfig::new(self.device_id);
        config.buf_size = self.buf_size;
        config.coils = coil_cells
            .iter()
            .enumerate()
            .map(|(i, c)| (self.coils.start_address + i as u16, c.clone()))
            .collect();
        config.holding_regs = holding_cells
            .iter()
            .enumerate()
            .map(|(i, c)| (self.holding_regs.start_address + i as u16, c.clone()))
            .collect();
        config.write_regs = write_cells
            .iter()
            .enumerate()
            .map(|(i, c)| (self.write_regs.start_address + i as u16, c.clone()))
            .collect();

        let cells = SlaveCells {
            coils: coil_cells,
            holding_regs: holding_cells,
            write_regs: write_cells,
        };

        (config, cells)
    }
}

/// Caller-side clones of the storage cells a context was configured with.
/// The application reads and updates device state through these.
#[derive(Debug, Clone)]
pub struct SlaveCells {
    pub coils: Vec<CoilCell>,
    pub holding_regs: Vec<RegisterCell>,
    pub write_regs: Vec<RegisterCell>,
}
