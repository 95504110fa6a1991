//! Stats command: daily peak tab counts.

use std::io::Write;

use anyhow::Result;
use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;

use tg_core::{StatsEntry, date_key};
use tg_store::ConfigStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPeak {
    pub date: String,
    pub max_tabs: u32,
}

/// Recorded peaks for `days` days up to `today`, newest first. Days
/// without a record are skipped.
pub async fn daily_peaks<S: ConfigStore>(
    store: &S,
    today: NaiveDate,
    days: u32,
) -> Result<Vec<DailyPeak>> {
    let dates: Vec<String> = (0..days)
        .map_while(|back| today.checked_sub_signed(TimeDelta::days(i64::from(back))))
        .map(date_key)
        .collect();
    let keys: Vec<&str> = dates.iter().map(String::as_str).collect();
    let values = store.get(&keys).await?;

    let mut peaks = Vec::new();
    for date in dates {
        let Some(value) = values.get(&date) else {
            continue;
        };
        match serde_json::from_value::<StatsEntry>(value.clone()) {
            Ok(entry) => peaks.push(DailyPeak {
                date,
                max_tabs: entry.max_tabs,
            }),
            Err(err) => tracing::warn!(%date, %err, "skipping malformed stats entry"),
        }
    }
    Ok(peaks)
}

pub async fn run<W: Write, S: ConfigStore>(
    writer: &mut W,
    store: &S,
    today: NaiveDate,
    days: u32,
    json: bool,
) -> Result<()> {
    let peaks = daily_peaks(store, today, days).await?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&peaks)?)?;
        return Ok(());
    }

    if peaks.is_empty() {
        writeln!(writer, "No stats recorded in the last {days} days.")?;
        return Ok(());
    }

    writeln!(writer, "{:<10}  PEAK", "DATE")?;
    for peak in &peaks {
        writeln!(writer, "{:<10}  {:>4}", peak.date, peak.max_tabs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use serde_json::json;
    use tg_store::MemoryStore;

    fn store() -> MemoryStore {
        let values = json!({
            "today": "2025-3-2",
            "2025-3-2": {"maxTabs": 7},
            "2025-2-28": {"maxTabs": 12},
            "2025-2-27": "garbage",
            "2025-2-20": {"maxTabs": 30},
        });
        MemoryStore::with_values(values.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn lists_recorded_days_newest_first() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();

        let mut output = Vec::new();
        run(&mut output, &store(), today, 7, false).await.unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        DATE        PEAK
        2025-3-2       7
        2025-2-28     12
        ");
    }

    #[tokio::test]
    async fn json_uses_stored_field_names() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();

        let mut output = Vec::new();
        run(&mut output, &store(), today, 1, true).await.unwrap();

        let peaks: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(peaks, json!([{"date": "2025-3-2", "maxTabs": 7}]));
    }

    #[tokio::test]
    async fn no_days_recorded() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let mut output = Vec::new();
        run(&mut output, &store(), today, 3, false).await.unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "No stats recorded in the last 3 days.\n"
        );
    }
}
