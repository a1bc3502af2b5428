use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Rx,
    Tx,
}

impl FrameDirection {
    fn label(self) -> &'static str {
        match self {
            FrameDirection::Rx => "RX",
            FrameDirection::Tx => "TX",
        }
    }
}

pub trait FrameFormatter: Send + Sync {
    fn format_frame(&self, direction: FrameDirection, frame: &[u8]) -> String;
    fn format_header(&self) -> String;
}

fn spaced_hex(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct ConsoleFormatter;

impl FrameFormatter for ConsoleFormatter {
    fn format_frame(&self, direction: FrameDirection, frame: &[u8]) -> String {
        let arrow = match direction {
            FrameDirection::Rx => "📥",
            FrameDirection::Tx => "📤",
        };
        format!(
            "{} {} ({} bytes): {}",
            arrow,
            direction.label(),
            frame.len(),
            spaced_hex(frame)
        )
    }

    fn format_header(&self) -> String {
        format!("🚀 Modbus RTU frame trace - {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

pub struct JsonFormatter;

impl FrameFormatter for JsonFormatter {
    fn format_frame(&self, direction: FrameDirection, frame: &[u8]) -> String {
        let json_data = serde_json::json!({
            "direction": direction.label(),
            "timestamp": Utc::now().to_rfc3339(),
            "length": frame.len(),
            "bytes": hex::encode_upper(frame),
        });

        serde_json::to_string(&json_data).unwrap_or_default()
    }

    fn format_header(&self) -> String {
        String::new() // JSON doesn't need headers
    }
}

pub struct HexFormatter;

impl FrameFormatter for HexFormatter {
    fn format_frame(&self, _direction: FrameDirection, frame: &[u8]) -> String {
        hex::encode_upper(frame)
    }

    fn format_header(&self) -> String {
        String::new()
    }
}
