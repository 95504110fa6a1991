//! Status command: settings, open tabs and today's peak.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;

use tg_core::{GovernorConfig, StatsEntry, date_key};
use tg_store::ConfigStore;

use super::util::{load_tabs, write_settings};

pub async fn run<W: Write, S: ConfigStore>(
    writer: &mut W,
    store: &S,
    database_path: &Path,
    today: NaiveDate,
) -> Result<()> {
    let values = store.get_all().await?;
    let config = GovernorConfig::from_entries(&values);
    let tabs = load_tabs(&values)?;
    let peak = values
        .get(&date_key(today))
        .and_then(|value| serde_json::from_value::<StatsEntry>(value.clone()).ok())
        .map_or(0, |entry| entry.max_tabs);

    writeln!(writer, "Tab governor status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer)?;
    writeln!(writer, "Open tabs:         {}", tabs.len())?;
    writeln!(writer, "Today's peak:      {peak}")?;
    write_settings(writer, &config)?;
    Ok(())
}
