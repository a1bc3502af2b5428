use clap::{Arg, ArgMatches, Command};
use log::info;

use crate::config::Settings;
use crate::modbus::{crc16_modbus, SlaveContext};
use crate::output::{ConsoleFormatter, FrameFormatter, HexFormatter, JsonFormatter, TraceTransmitter};

pub fn build_command() -> Command {
    Command::new("rtu_slave")
        .version(crate::VERSION)
        .about("Modbus RTU slave frame engine")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("TOML settings file (defaults to the built-in example layout)"),
        )
        .arg(
            Arg::new("id")
                .long("id")
                .value_name("ID")
                .help("Override the configured device id"),
        )
        .arg(
            Arg::new("buf-size")
                .long("buf-size")
                .value_name("BYTES")
                .help("Override the response buffer capacity"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .value_name("FORMAT")
                .help("Frame trace format: console, json or hex"),
        )
        .subcommand(
            Command::new("demo").about("Replay the canned example request frames against the slave"),
        )
        .subcommand(
            Command::new("crc")
                .about("Compute the Modbus CRC-16 of a hex byte string")
                .arg(Arg::new("bytes").required(true).value_name("HEX")),
        )
        .subcommand(
            Command::new("frame")
                .about("Feed a single hex-encoded frame to the slave")
                .arg(Arg::new("bytes").required(true).value_name("HEX")),
        )
        .subcommand(
            Command::new("save-config")
                .about("Write the effective settings to a TOML file")
                .arg(Arg::new("path").required(true).value_name("FILE")),
        )
}

fn formatter_from_matches(matches: &ArgMatches) -> Box<dyn FrameFormatter> {
    match matches.get_one::<String>("format").map(|s| s.as_str()) {
        Some("json") => {
            info!("🎨 Using JSON frame formatter");
            Box::new(JsonFormatter)
        }
        Some("hex") => {
            info!("🎨 Using plain hex frame formatter");
            Box::new(HexFormatter)
        }
        _ => Box::new(ConsoleFormatter),
    }
}

fn parse_hex_arg(raw: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(cleaned)?)
}

pub fn handle_subcommands(
    matches: &ArgMatches,
    settings: &Settings,
) -> Result<bool, Box<dyn std::error::Error>> {
    if matches.subcommand_matches("demo").is_some() {
        info!("🔍 Executing demo command...");
        run_demo(settings, formatter_from_matches(matches))?;
        return Ok(true);
    }

    if let Some(matches) = matches.subcommand_matches("crc") {
        let bytes = parse_hex_arg(matches.get_one::<String>("bytes").unwrap())?;
        let crc = crc16_modbus(&bytes);
        println!(
            "CRC16: 0x{:04X} (wire order: {:02X} {:02X})",
            crc,
            crc & 0xFF,
            crc >> 8
        );
        return Ok(true);
    }

    if let Some(matches) = matches.subcommand_matches("frame") {
        let frame = parse_hex_arg(matches.get_one::<String>("bytes").unwrap())?;
        let (config, _cells) = settings.slave_config();
        let transmitter = TraceTransmitter::new(formatter_from_matches(matches));
        let mut slave = SlaveContext::new(config, Box::new(transmitter))?;

        match slave.handle_frame(&frame) {
            Ok(handled) => println!("✅ Handled: {:?}", handled),
            Err(err) => println!("🚫 Rejected: {}", err),
        }
        return Ok(true);
    }

    if let Some(matches) = matches.subcommand_matches("save-config") {
        let path = matches.get_one::<String>("path").unwrap();
        settings.save_to_file(path)?;
        println!("✅ Settings written to {}", path);
        return Ok(true);
    }

    Ok(false)
}

/// Replay the reference request sequence: two reads, a write, a mask write
/// and two rejection cases, printing every transmitted response.
pub fn run_demo(
    settings: &Settings,
    formatter: Box<dyn FrameFormatter>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, cells) = settings.slave_config();
    let transmitter = TraceTransmitter::new(formatter);
    let mut slave = SlaveContext::new(config, Box::new(transmitter))?;

    println!("Slave ready (device id: 0x{:02X})", slave.id());
    print_cells(&cells);

    let requests: Vec<(&str, Vec<u8>)> = vec![
        (
            "Read holding registers 0x0000-0x0002",
            vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x03, 0x05, 0xCB],
        ),
        (
            "Read coils 0x0000-0x0007",
            vec![0x01, 0x01, 0x00, 0x00, 0x00, 0x08, 0x3D, 0xCC],
        ),
        (
            "Write single register 0x0000 = 0x1234",
            vec![0x01, 0x06, 0x00, 0x00, 0x12, 0x34, 0x84, 0xBD],
        ),
        (
            "Mask write register 0x0001 (and=0x00F0 or=0x0025)",
            vec![0x01, 0x16, 0x00, 0x01, 0x00, 0xF0, 0x00, 0x25, 0x0A, 0x2E],
        ),
        (
            "Read unmapped register (rejection test)",
            vec![0x01, 0x03, 0x00, 0x10, 0x00, 0x01, 0x85, 0xCF],
        ),
        (
            "Wrong device id (rejection test)",
            vec![0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x85, 0xF9],
        ),
    ];

    for (description, frame) in requests {
        println!("\n--- {} ---", description);
        println!(
            "📥 RX ({} bytes): {}",
            frame.len(),
            frame
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        );
        match slave.handle_frame(&frame) {
            Ok(handled) => println!("Result: {:?}", handled),
            Err(err) => println!("Result: rejected ({})", err),
        }
    }

    println!();
    print_cells(&cells);
    Ok(())
}

fn print_cells(cells: &crate::config::SlaveCells) {
    println!("=== Register state ===");
    println!(
        "Coils:             {}",
        cells
            .coils
            .iter()
            .map(|c| c.get().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
    println!(
        "Holding registers: {}",
        cells
            .holding_regs
            .iter()
            .map(|c| c.get().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
    println!(
        "Write registers:   {}",
        cells
            .write_regs
            .iter()
            .map(|c| c.get().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
}
