pub mod error;

pub use error::{SlaveError, TransmitError};
