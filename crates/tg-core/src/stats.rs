//! Daily peak tab counts.

use serde::{Deserialize, Serialize};

/// Peak observed on one calendar day. Stored under the day's date key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsEntry {
    pub max_tabs: u32,
}

/// A stats write the caller should persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsWrite {
    pub date_key: String,
    pub entry: StatsEntry,
    /// A new day started; the `today` pointer must be persisted too.
    pub rollover: bool,
}

/// Tracks today's peak and reports when it must be persisted.
///
/// The in-memory peak is authoritative. A write is reported until
/// [`StatsRecorder::mark_persisted`] confirms the store holds it.
#[derive(Debug, Clone, Default)]
pub struct StatsRecorder {
    today: Option<String>,
    peak: u32,
    saved_today: Option<String>,
    saved_peak: u32,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the cached day and its stored entry.
    pub fn restore(today: Option<String>, entry: Option<StatsEntry>) -> Self {
        let peak = if today.is_some() {
            entry.unwrap_or_default().max_tabs
        } else {
            0
        };
        Self {
            saved_today: today.clone(),
            saved_peak: peak,
            today,
            peak,
        }
    }

    pub fn today(&self) -> Option<&str> {
        self.today.as_deref()
    }

    pub const fn peak(&self) -> u32 {
        self.peak
    }

    /// Records `tab_count` for the day `date_key`.
    ///
    /// A day seen for the first time is seeded with the current count.
    /// Within a day the peak only increases. Returns the write still
    /// missing from the store, if any.
    pub fn record_observation(&mut self, date_key: &str, tab_count: u32) -> Option<StatsWrite> {
        if self.today.as_deref() == Some(date_key) {
            self.peak = self.peak.max(tab_count);
        } else {
            self.today = Some(date_key.to_string());
            self.peak = tab_count;
        }

        let rollover = self.saved_today.as_deref() != Some(date_key);
        if !rollover && self.peak <= self.saved_peak {
            return None;
        }
        Some(StatsWrite {
            date_key: date_key.to_string(),
            entry: StatsEntry {
                max_tabs: self.peak,
            },
            rollover,
        })
    }

    /// Notes that the store accepted `write`.
    pub fn mark_persisted(&mut self, write: &StatsWrite) {
        self.saved_today = Some(write.date_key.clone());
        self.saved_peak = write.entry.max_tabs;
    }
}
