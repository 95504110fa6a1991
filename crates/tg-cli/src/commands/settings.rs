//! Settings command: show or edit the governor settings.
//!
//! Edits are checked against the tab count from the governor's last sync
//! and written as one batch, so a running governor applies them together.

use std::io::Write;

use anyhow::{Result, bail};

use tg_core::{GovernorConfig, SettingsEdit, SettingsError};
use tg_store::{ConfigStore, StoreError};

use super::util::{load_tabs, write_settings};

/// Applies `edit` to `current` and stores the changed keys.
///
/// The outer error is a storage failure; the inner one a refused edit.
pub async fn apply_edit<S: ConfigStore>(
    store: &S,
    current: &GovernorConfig,
    edit: &SettingsEdit,
    live_tabs: u32,
) -> Result<Result<GovernorConfig, SettingsError>, StoreError> {
    let change = match edit.apply(current, live_tabs) {
        Ok(change) => change,
        Err(err) => return Ok(Err(err)),
    };
    if !change.entries.is_empty() {
        tracing::debug!(keys = ?change.entries.keys().collect::<Vec<_>>(), "writing settings");
        store.set(change.entries).await?;
    }
    Ok(Ok(change.config))
}

pub async fn run<W: Write, S: ConfigStore>(
    writer: &mut W,
    store: &S,
    edit: &SettingsEdit,
) -> Result<()> {
    let values = store.get_all().await?;
    let current = GovernorConfig::from_entries(&values);
    if edit.is_empty() {
        write_settings(writer, &current)?;
        return Ok(());
    }

    let live_tabs = u32::try_from(load_tabs(&values)?.len()).unwrap_or(u32::MAX);
    match apply_edit(store, &current, edit, live_tabs).await? {
        Ok(config) => {
            write_settings(writer, &config)?;
            Ok(())
        }
        Err(err) => bail!(err.user_message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use serde_json::{Value, json};
    use tg_store::MemoryStore;

    fn store_with_tabs(count: usize, settings: Value) -> MemoryStore {
        let mut values = settings.as_object().cloned().unwrap();
        let tabs: Vec<Value> = (0..count)
            .map(|i| {
                json!({"id": i, "windowId": 1, "index": i, "url": format!("https://{i}.test/"),
                       "title": "", "createdAt": 0, "timeActive": 0})
            })
            .collect();
        values.insert("tabs".to_string(), Value::Array(tabs));
        MemoryStore::with_values(values)
    }

    #[tokio::test]
    async fn enabling_kill_all_enables_its_prerequisites() {
        let store = store_with_tabs(3, json!({"maxTabs": 5}));
        let edit = SettingsEdit {
            kill_all_mode: Some(true),
            ..SettingsEdit::default()
        };

        let mut output = Vec::new();
        run(&mut output, &store, &edit).await.unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Tab limit:         5 (enforced)
        Countdown:         5 min (on)
        Kill-all mode:     on
        Close duplicates:  off
        Ignore query:      off
        ");
        assert_eq!(store.value("killAllMode"), Some(json!(true)));
        assert_eq!(store.value("maxTabsEnabled"), Some(json!(true)));
    }

    #[tokio::test]
    async fn too_many_open_tabs_is_refused() {
        let store = store_with_tabs(7, json!({"maxTabs": 5}));
        let edit = SettingsEdit {
            max_tabs_enabled: Some(true),
            ..SettingsEdit::default()
        };

        let err = run(&mut Vec::new(), &store, &edit).await.unwrap_err();

        assert_eq!(err.to_string(), "You need to close 2 tabs.");
        assert_eq!(store.value("maxTabsEnabled"), None);
    }

    #[tokio::test]
    async fn empty_edit_only_shows_settings() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        let mut output = Vec::new();
        run(&mut output, &store, &SettingsEdit::default())
            .await
            .unwrap();

        assert!(String::from_utf8(output).unwrap().contains("Tab limit:         not set"));
        assert!(rx.try_recv().is_err());
    }
}
