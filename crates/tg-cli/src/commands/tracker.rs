//! Tracker command: how long each tab has been open and in use.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use tg_core::{TabRecord, WindowId};
use tg_store::ConfigStore;

use super::util::{format_duration, load_tabs};

/// One tab as reported.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerRow {
    pub id: i64,
    pub window_id: i64,
    pub index: u32,
    pub title: String,
    pub url: String,
    pub time_open_ms: i64,
    pub time_active_ms: i64,
    pub active_percentage: i64,
}

impl TrackerRow {
    fn new(tab: &TabRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: tab.id.get(),
            window_id: tab.window_id.get(),
            index: tab.index,
            title: tab.title.clone(),
            url: tab.url.clone(),
            time_open_ms: tab.time_open(now),
            time_active_ms: tab.current_time_active(now),
            active_percentage: tab.active_percentage(now),
        }
    }

    fn label(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// Tabs grouped by window, each window ordered by index.
pub fn rows_by_window(tabs: &[TabRecord], now: DateTime<Utc>) -> BTreeMap<WindowId, Vec<TrackerRow>> {
    let mut windows: BTreeMap<WindowId, Vec<TrackerRow>> = BTreeMap::new();
    for tab in tabs {
        windows
            .entry(tab.window_id)
            .or_default()
            .push(TrackerRow::new(tab, now));
    }
    for rows in windows.values_mut() {
        rows.sort_by_key(|row| row.index);
    }
    windows
}

pub async fn run<W: Write, S: ConfigStore>(
    writer: &mut W,
    store: &S,
    now: DateTime<Utc>,
    json: bool,
) -> Result<()> {
    let values = store.get_all().await?;
    let tabs = load_tabs(&values)?;
    let windows = rows_by_window(&tabs, now);

    if json {
        let rows: Vec<&TrackerRow> = windows.values().flatten().collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }

    if windows.is_empty() {
        writeln!(writer, "No tabs tracked.")?;
        return Ok(());
    }

    for (i, (window, rows)) in windows.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "Window {window}")?;
        writeln!(writer, "  {:>3}  {:>10}  {:>10}  {:>4}  TAB", "#", "OPEN", "ACTIVE", "%")?;
        for row in rows {
            writeln!(
                writer,
                "  {:>3}  {:>10}  {:>10}  {:>3}%  {}",
                row.index,
                format_duration(row.time_open_ms),
                format_duration(row.time_active_ms),
                row.active_percentage,
                row.label()
            )?;
        }
    }
    Ok(())
}
