pub mod settings;

pub use settings::{CoilBlock, RegisterBlock, Settings, SlaveCells};
