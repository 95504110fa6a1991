//! Helpers shared by the report commands.

use std::io::Write;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use tg_core::{GovernorConfig, TabRecord, keys};

/// The tab list written by the governor's last sync.
pub fn load_tabs(values: &Map<String, Value>) -> Result<Vec<TabRecord>> {
    let Some(tabs) = values.get(keys::TABS) else {
        return Ok(Vec::new());
    };
    serde_json::from_value(tabs.clone()).context("stored tab list is malformed")
}

/// Formats milliseconds as `1d 2h 5m`, leaving out zero parts.
pub fn format_duration(ms: i64) -> String {
    let minutes = ms.max(0) / 60_000;
    let (days, hours, minutes) = (minutes / 1440, minutes / 60 % 24, minutes % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if parts.is_empty() {
        return "0m".to_string();
    }
    parts.join(" ")
}

pub const fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Writes the user-facing settings, one per line.
pub fn write_settings<W: Write>(writer: &mut W, config: &GovernorConfig) -> std::io::Result<()> {
    let limit = match config.max_tabs {
        Some(max_tabs) if config.max_tabs_enabled => format!("{max_tabs} (enforced)"),
        Some(max_tabs) => format!("{max_tabs} (not enforced)"),
        None => "not set".to_string(),
    };
    writeln!(writer, "Tab limit:         {limit}")?;
    writeln!(
        writer,
        "Countdown:         {} min ({})",
        config.countdown_minutes,
        on_off(config.countdown_enabled)
    )?;
    writeln!(writer, "Kill-all mode:     {}", on_off(config.kill_all_mode))?;
    writeln!(writer, "Close duplicates:  {}", on_off(config.close_duplicates))?;
    writeln!(
        writer,
        "Ignore query:      {}",
        on_off(config.duplicates_ignore_query)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_leaves_out_zero_parts() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(59_999), "0m");
        assert_eq!(format_duration(5 * 60_000), "5m");
        assert_eq!(format_duration(2 * 3_600_000), "2h");
        assert_eq!(format_duration(86_400_000 + 3_600_000 + 60_000), "1d 1h 1m");
        assert_eq!(format_duration(-10), "0m");
    }

    #[test]
    fn missing_tab_list_is_empty() {
        assert!(load_tabs(&Map::new()).unwrap().is_empty());
    }

    #[test]
    fn malformed_tab_list_is_an_error() {
        let mut values = Map::new();
        values.insert(keys::TABS.to_string(), Value::from("nope"));
        assert!(load_tabs(&values).is_err());
    }
}
