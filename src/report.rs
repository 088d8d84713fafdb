//! Human-readable and JSON rendering of a probe result

use crate::probe::{ProbeResult, Status};

/// Emoji and title shown for each status
fn heading(status: Status) -> (&'static str, &'static str) {
    match status {
        Status::Success => ("✅", "VPN Working"),
        Status::Error => ("❌", "VPN Problems"),
        Status::Warning => ("⚠️", "Uncertain Status"),
    }
}

/// Multi-line status block handed to the completion hook
pub fn format_result(result: &ProbeResult) -> String {
    let (emoji, title) = heading(result.status);
    let message = format!(
        "{} {}\n\n📍 IP: {}\n🔗 WiFi access: {}\n💬 {}",
        emoji, title, result.ip, result.wifi_access, result.message
    );
    tracing::debug!("Formatted result:\n{}", message);
    message
}

pub fn format_json(result: &ProbeResult) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
