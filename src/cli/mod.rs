pub mod commands;

pub use commands::{build_command, handle_subcommands, run_demo};
