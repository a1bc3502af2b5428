use anyhow::Result;
use log::info;

use rtu_slave::cli::{build_command, handle_subcommands, run_demo};
use rtu_slave::output::ConsoleFormatter;
use rtu_slave::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = build_command().get_matches();
    let settings =
        Settings::from_matches(&matches).map_err(|e| anyhow::anyhow!("settings: {}", e))?;

    info!(
        "🖥️  {} starting (device id 0x{:02X})",
        settings.device_name, settings.device_id
    );

    let handled = handle_subcommands(&matches, &settings)
        .map_err(|e| anyhow::anyhow!("command failed: {}", e))?;

    if !handled {
        // No subcommand given: run the canned demo sequence.
        run_demo(&settings, Box::new(ConsoleFormatter))
            .map_err(|e| anyhow::anyhow!("demo failed: {}", e))?;
    }

    Ok(())
}
