//! The governor: a single dispatcher applying every policy to every event.
//!
//! # Pipeline
//!
//! Each host event mutates the registry, then runs the policy reactions
//! (duplicates, limit, activity), reconciles the countdown, renders the
//! badge and finally persists `tabs` and the stats rollup. Settings
//! changes arrive from the store subscription and are applied as one
//! batch.
//!
//! # Self-initiated removals
//!
//! Before asking the host to close a tab the governor registers a
//! [`PendingRemoval`] for it. The host's removal event for that tab
//! consumes the token. Pending tabs no longer count as open, so an
//! overflow attempt never disturbs the countdown or the badge. A tab
//! rejected at creation was never persisted, so its removal skips the
//! persistence sync.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use tg_core::limit::{self, Admission, StartupAdjustment};
use tg_core::tab::page_identity;
use tg_core::{
    ActivityTracker, BadgeConfig, BadgeInput, BadgePresenter, Clock, CountdownScheduler,
    DuplicateDetector, GovernorConfig, HostEvent, HostTab, StatsEntry, StatsRecorder, TabChange,
    TabId, TabRecord, TabRegistry, TickOutcome, WindowId, date_key, keys,
};
use tg_store::{ChangeSet, ConfigStore, StoreError};

use crate::host::{BadgeSink, HostError, TabHost};
use crate::inbox::{Command, GovernorHandle, Inbox, Input, Reply, Snapshot};

/// Governor errors.
///
/// Only startup and command replies surface these. Failures while
/// handling events are logged and absorbed.
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("governor is not running")]
    Closed,
    #[error("unexpected reply from governor")]
    UnexpectedReply,
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What drives the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    /// A spawned task sends one tick per period.
    Interval(Duration),
    /// The caller fires ticks with [`Governor::tick`].
    Manual,
}

impl Default for TickSource {
    fn default() -> Self {
        Self::Interval(Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GovernorOptions {
    pub badge: BadgeConfig,
    pub ticks: TickSource,
}

/// The services the governor talks to.
pub struct Collaborators<H, S> {
    pub host: H,
    pub store: S,
    pub badge: Box<dyn BadgeSink>,
    pub clock: Arc<dyn Clock>,
}

/// Why the governor closed a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalCause {
    Limit,
    Duplicate,
    Countdown,
}

/// Correlation token for a removal the governor requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRemoval {
    token: u64,
    cause: RemovalCause,
    /// The tab was never persisted, so its removal needs no sync.
    bypass_sync: bool,
}

pub struct Governor<H, S> {
    host: H,
    store: S,
    badge_sink: Box<dyn BadgeSink>,
    clock: Arc<dyn Clock>,
    inbox: Inbox,
    settings_rx: broadcast::Receiver<ChangeSet>,
    ticks: TickSource,
    ticker: Option<JoinHandle<()>>,

    registry: TabRegistry,
    activity: ActivityTracker,
    config: GovernorConfig,
    duplicates: DuplicateDetector,
    countdown: CountdownScheduler,
    presenter: BadgePresenter,
    stats: StatsRecorder,
    pending: HashMap<TabId, PendingRemoval>,
    next_token: u64,
}

impl<H: TabHost, S: ConfigStore> Governor<H, S> {
    /// Builds the governor from the host's current tabs and the persisted
    /// state, then persists the reconciled result.
    pub async fn start(
        collaborators: Collaborators<H, S>,
        options: GovernorOptions,
        inbox: Inbox,
    ) -> Result<Self, GovernorError> {
        let Collaborators {
            host,
            store,
            badge,
            clock,
        } = collaborators;
        // Subscribe before reading so no edit slips between the two.
        let settings_rx = store.subscribe();

        let mut governor = Self {
            host,
            store,
            badge_sink: badge,
            clock,
            inbox,
            settings_rx,
            ticks: options.ticks,
            ticker: None,
            registry: TabRegistry::new(),
            activity: ActivityTracker::new(),
            config: GovernorConfig::default(),
            duplicates: DuplicateDetector::default(),
            countdown: CountdownScheduler::new(),
            presenter: BadgePresenter::new(options.badge),
            stats: StatsRecorder::new(),
            pending: HashMap::new(),
            next_token: 0,
        };
        governor.init().await?;
        Ok(governor)
    }

    async fn init(&mut self) -> Result<(), GovernorError> {
        let now = self.clock.now();
        let live = self.host.query_tabs().await?;
        let focused_window = self.host.focused_window().await?;

        let mut windows: Vec<WindowId> = live.iter().map(|tab| tab.window_id).collect();
        windows.sort_unstable();
        windows.dedup();
        let mut selected = Vec::with_capacity(windows.len());
        for window in windows {
            match self.host.active_tab(window).await {
                Ok(Some(tab)) => selected.push((window, tab)),
                Ok(None) => {}
                Err(err) => warn!(%window, %err, "could not query active tab"),
            }
        }

        let stored = self.store.get_all().await?;
        self.config = GovernorConfig::from_entries(&stored);
        self.registry = merge_restored(live, stored.get(keys::TABS), now);
        self.activity
            .restore(&mut self.registry, focused_window, &selected, now);

        let live_tabs = self.tab_count();
        match limit::reconcile_startup(&mut self.config, live_tabs) {
            StartupAdjustment::None => {}
            StartupAdjustment::Baseline { max_tabs } => {
                info!(max_tabs, "no tab limit stored, using open tab count");
            }
            StartupAdjustment::Disabled { max_tabs, live } => {
                warn!(max_tabs, live, "more tabs open than the limit, enforcement disabled");
            }
        }
        self.config.normalize();
        self.duplicates = DuplicateDetector::new(self.config.url_match());

        let today = stored
            .get(keys::TODAY)
            .and_then(Value::as_str)
            .map(str::to_string);
        let entry = today
            .as_deref()
            .and_then(|key| stored.get(key))
            .and_then(|value| serde_json::from_value::<StatsEntry>(value.clone()).ok());
        self.stats = StatsRecorder::restore(today, entry);

        let settings = self.config.to_entries();
        self.persist(settings).await;
        self.settle(true).await;
        info!(
            tabs = self.tab_count(),
            limit = ?self.config.enforced_limit(),
            countdown = self.countdown.is_running(),
            "governor started"
        );
        Ok(())
    }

    /// A handle feeding this governor's inbox.
    pub fn handle(&self) -> GovernorHandle {
        self.inbox.handle.clone()
    }

    pub const fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub const fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    /// Runs until a shutdown request.
    pub async fn run(mut self) {
        info!("governor running");
        let mut settings_open = true;
        loop {
            tokio::select! {
                input = self.inbox.rx.recv() => {
                    let Some(input) = input else { break };
                    if self.dispatch(input).await.is_break() {
                        break;
                    }
                }
                changes = self.settings_rx.recv(), if settings_open => match changes {
                    Ok(changes) => self.on_settings_changed(&changes.new_values()).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed settings changes, reloading");
                        self.reload_settings().await;
                    }
                    Err(RecvError::Closed) => settings_open = false,
                },
            }
        }
        self.stop_ticker();
        info!("governor stopped");
    }

    /// Handles everything currently queued, including work queued while
    /// draining. Returns the number of inputs handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.settings_rx.try_recv() {
                Ok(changes) => {
                    self.on_settings_changed(&changes.new_values()).await;
                    handled += 1;
                    continue;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed settings changes, reloading");
                    self.reload_settings().await;
                    continue;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => {}
            }
            let Ok(input) = self.inbox.rx.try_recv() else {
                break;
            };
            handled += 1;
            if self.dispatch(input).await.is_break() {
                break;
            }
        }
        handled
    }

    /// Fires one countdown tick. Returns whether a countdown was running.
    pub async fn tick(&mut self) -> bool {
        let Some(state) = self.countdown.state() else {
            return false;
        };
        self.on_tick(state.generation).await;
        true
    }

    /// Answers a front-end command.
    pub async fn execute(&mut self, command: Command) -> Result<Reply, GovernorError> {
        match command {
            Command::HighlightTab { index, window_id } => {
                debug!(%window_id, index, "highlighting tab");
                self.host
                    .highlight_tab(window_id, index)
                    .await
                    .inspect_err(|err| warn!(%err, "highlight failed"))?;
                Ok(Reply::Done)
            }
            Command::ResetActivity => {
                let now = self.clock.now();
                self.registry
                    .reset_activity(now, self.activity.focused_tab());
                info!("activity counters reset");
                self.sync().await;
                Ok(Reply::Done)
            }
            Command::Snapshot => Ok(Reply::Snapshot(Box::new(self.snapshot()))),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut tabs = self.registry.records().to_vec();
        tabs.sort_by_key(|tab| (tab.window_id, tab.index));
        let mut pending_removals: Vec<TabId> = self.pending.keys().copied().collect();
        pending_removals.sort_unstable();
        Snapshot {
            tabs,
            config: self.config.clone(),
            countdown: self.countdown.state(),
            badge: self.presenter.last().cloned(),
            focused_tab: self.activity.focused_tab(),
            pending_removals,
            tab_count: self.tab_count(),
            today_peak: self.stats.peak(),
        }
    }

    async fn dispatch(&mut self, input: Input) -> ControlFlow<()> {
        match input {
            Input::Host(event) => self.on_host_event(event).await,
            Input::Tick(generation) => self.on_tick(generation).await,
            Input::Command(command, reply) => {
                let result = self.execute(command).await;
                // The requester may have given up waiting.
                let _ = reply.send(result);
            }
            Input::Barrier(done) => {
                let _ = done.send(());
            }
            Input::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_host_event(&mut self, event: HostEvent) {
        let now = self.clock.now();
        debug!(kind = event.kind(), "host event");
        match event {
            HostEvent::Created { tab } => self.on_tab_created(tab, now).await,
            HostEvent::Removed {
                tab_id,
                window_id,
                window_closing,
            } => self.on_tab_removed(tab_id, window_id, window_closing).await,
            HostEvent::Updated { tab_id, change } => {
                self.on_tab_updated(tab_id, &change, now).await;
            }
            HostEvent::Activated { tab_id, window_id } => {
                self.activity
                    .on_tab_activated(&mut self.registry, tab_id, window_id, now);
                self.settle(true).await;
            }
            HostEvent::Moved {
                tab_id,
                window_id,
                from_index,
                to_index,
            } => {
                if !self
                    .registry
                    .move_tab(tab_id, window_id, from_index, to_index)
                {
                    debug!(tab = %tab_id, "move of untracked tab ignored");
                }
                self.settle(true).await;
            }
            HostEvent::Detached {
                tab_id,
                old_window_id,
                old_position,
            } => {
                if self.activity.focused_tab() == Some(tab_id) {
                    self.activity
                        .on_focus_changed(&mut self.registry, None, now);
                }
                self.activity.on_tab_left_window(tab_id, old_window_id);
                self.registry.detach(tab_id, old_window_id, old_position);
                self.settle(true).await;
            }
            HostEvent::Attached {
                tab_id,
                new_window_id,
                new_position,
            } => {
                self.registry.attach(tab_id, new_window_id, new_position);
                self.settle(true).await;
            }
            HostEvent::WindowFocusChanged { window_id } => {
                self.activity
                    .on_window_focus_changed(&mut self.registry, window_id, now);
                self.settle(true).await;
            }
        }
    }

    async fn on_tab_created(&mut self, tab: HostTab, now: DateTime<Utc>) {
        let id = tab.id;
        if !self.registry.open(tab, now) {
            debug!(tab = %id, "tab already tracked");
            return;
        }

        if self.config.close_duplicates && self.is_redundant(id) {
            info!(tab = %id, "new tab duplicates an open tab, closing it");
            self.close_tab(id, RemovalCause::Duplicate, true).await;
            self.settle(false).await;
            return;
        }

        let count = self.tab_count();
        if let Admission::Reject { limit } = limit::evaluate(&self.config, count) {
            info!(tab = %id, count, limit, "tab limit exceeded, closing new tab");
            self.close_tab(id, RemovalCause::Limit, true).await;
            self.settle(false).await;
            return;
        }

        self.settle(true).await;
    }

    async fn on_tab_removed(&mut self, id: TabId, window: WindowId, window_closing: bool) {
        let pending = self.pending.remove(&id);
        self.activity.on_tab_left_window(id, window);
        if self.registry.close(id, window_closing).is_none() {
            debug!(tab = %id, "removal of untracked tab");
        }
        match pending {
            Some(removal) => {
                debug!(
                    tab = %id,
                    token = removal.token,
                    cause = ?removal.cause,
                    "requested removal completed"
                );
                self.settle(!removal.bypass_sync).await;
            }
            None => self.settle(true).await,
        }
    }

    async fn on_tab_updated(&mut self, id: TabId, change: &TabChange, now: DateTime<Utc>) {
        let Some(outcome) = self.registry.update(id, change, now) else {
            debug!(tab = %id, "update of untracked tab");
            return;
        };
        if outcome.navigated {
            debug!(tab = %id, "tab navigated, durations restarted");
        }
        // Only settled pages are compared, so redirects never match.
        if outcome.completed
            && self.config.close_duplicates
            && !self.pending.contains_key(&id)
            && self.is_redundant(id)
        {
            info!(tab = %id, "loaded page duplicates an open tab, closing it");
            self.close_tab(id, RemovalCause::Duplicate, false).await;
        }
        self.settle(true).await;
    }

    async fn on_settings_changed(&mut self, values: &Map<String, Value>) {
        let delta = self.config.apply_changes(values);
        if delta.is_empty() {
            return;
        }
        info!(config = ?self.config, "settings changed");
        if delta.duplicates_ignore_query {
            self.duplicates = DuplicateDetector::new(self.config.url_match());
        }
        if self.config.close_duplicates && (delta.close_duplicates || delta.duplicates_ignore_query)
        {
            self.close_all_duplicates().await;
        }
        if delta.affects_countdown() {
            self.cancel_countdown("settings changed");
        }
        self.settle(false).await;
    }

    async fn reload_settings(&mut self) {
        match self.store.get(&keys::SETTINGS).await {
            Ok(values) => self.on_settings_changed(&values).await,
            Err(err) => warn!(%err, "failed to reload settings"),
        }
    }

    async fn on_tick(&mut self, generation: u64) {
        match self.countdown.tick(generation) {
            TickOutcome::Stale => trace!(generation, "stale countdown tick"),
            TickOutcome::Running { seconds_remaining } => {
                trace!(seconds_remaining, "countdown tick");
                self.render_badge();
            }
            TickOutcome::Expired => {
                self.stop_ticker();
                self.on_countdown_expired().await;
            }
        }
    }

    async fn on_countdown_expired(&mut self) {
        let target = self
            .activity
            .focused_tab()
            .filter(|id| !self.pending.contains_key(id));
        let Some(target) = target else {
            info!("countdown expired with no focused tab, nothing closed");
            self.render_badge();
            return;
        };
        info!(tab = %target, kill_all = self.config.kill_all_mode, "countdown expired");
        self.close_tab(target, RemovalCause::Countdown, false).await;
        // Kill-all re-arms here while tabs remain.
        self.settle(false).await;
    }

    /// Asks the host to close a tab, registering the correlation token
    /// first so the removal event can be recognized.
    async fn close_tab(&mut self, id: TabId, cause: RemovalCause, bypass_sync: bool) {
        self.next_token += 1;
        let token = self.next_token;
        self.pending.insert(
            id,
            PendingRemoval {
                token,
                cause,
                bypass_sync,
            },
        );
        debug!(tab = %id, token, ?cause, "requesting tab removal");
        if let Err(err) = self.host.remove_tab(id).await {
            warn!(tab = %id, %err, "tab removal failed");
            self.pending.remove(&id);
        }
    }

    async fn close_all_duplicates(&mut self) {
        let redundant = self.duplicates.sweep(
            self.registry
                .iter()
                .filter(|tab| !self.pending.contains_key(&tab.id)),
        );
        if !redundant.is_empty() {
            info!(count = redundant.len(), "closing duplicate tabs");
        }
        for id in redundant {
            self.close_tab(id, RemovalCause::Duplicate, false).await;
        }
    }

    fn is_redundant(&self, id: TabId) -> bool {
        let Some(target) = self.registry.get(id) else {
            return false;
        };
        !self
            .duplicates
            .find_duplicates_of(
                self.registry
                    .iter()
                    .filter(|tab| !self.pending.contains_key(&tab.id)),
                target,
            )
            .is_empty()
    }

    /// Open tabs, not counting the ones being closed.
    fn tab_count(&self) -> u32 {
        let count = self
            .registry
            .iter()
            .filter(|tab| !self.pending.contains_key(&tab.id))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Runs the tail of the pipeline after a state change.
    async fn settle(&mut self, sync: bool) {
        self.reconcile_countdown();
        if sync {
            self.sync().await;
        } else {
            self.render_badge();
        }
    }

    fn reconcile_countdown(&mut self) {
        let should_run = self.countdown.should_run(&self.config, self.tab_count());
        match (should_run, self.countdown.is_running()) {
            (true, false) => self.start_countdown(),
            (false, true) => self.cancel_countdown("countdown condition no longer holds"),
            _ => {}
        }
    }

    fn start_countdown(&mut self) {
        self.stop_ticker();
        let target_seconds = self.config.countdown_seconds();
        let generation = self.countdown.start(target_seconds);
        if let TickSource::Interval(period) = self.ticks {
            self.ticker = Some(spawn_ticker(self.handle(), generation, period));
        }
        info!(generation, target_seconds, "countdown started");
    }

    fn cancel_countdown(&mut self, reason: &'static str) {
        if self.countdown.cancel() {
            info!(reason, "countdown cancelled");
        }
        self.stop_ticker();
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn render_badge(&mut self) {
        let input = BadgeInput {
            tab_count: self.tab_count(),
            limit: self.config.enforced_limit(),
            countdown_remaining: self.countdown.seconds_remaining(),
        };
        if let Some(badge) = self.presenter.present(input) {
            trace!(text = %badge.text, color = %badge.color, "badge");
            self.badge_sink.render(&badge);
        }
    }

    /// Renders the badge and persists `tabs` plus the stats rollup.
    async fn sync(&mut self) {
        self.render_badge();
        let mut entries = Map::new();
        let tabs: Vec<&TabRecord> = self
            .registry
            .iter()
            .filter(|tab| !self.pending.contains_key(&tab.id))
            .collect();
        match serde_json::to_value(tabs) {
            Ok(value) => {
                entries.insert(keys::TABS.to_string(), value);
            }
            Err(err) => warn!(%err, "failed to serialize tabs"),
        }

        let today = date_key(self.clock.today());
        let tab_count = self.tab_count();
        let stats = self.stats.record_observation(&today, tab_count);
        if let Some(write) = &stats {
            if write.rollover {
                entries.insert(keys::TODAY.to_string(), Value::from(write.date_key.clone()));
            }
            match serde_json::to_value(write.entry) {
                Ok(value) => {
                    entries.insert(write.date_key.clone(), value);
                }
                Err(err) => warn!(%err, "failed to serialize stats"),
            }
        }
        // An unsaved peak is offered again on the next sync.
        if self.persist(entries).await {
            if let Some(write) = &stats {
                self.stats.mark_persisted(write);
            }
        }
    }

    /// Writes `entries` as one batch. Returns whether the store accepted it.
    async fn persist(&self, entries: Map<String, Value>) -> bool {
        if entries.is_empty() {
            return true;
        }
        match self.store.set(entries).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "failed to persist governor state");
                false
            }
        }
    }
}

impl<H, S> Drop for Governor<H, S> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Restores persisted records for tabs still showing the same page.
///
/// Records for other ids or pages are dropped; live tabs without a
/// matching record start fresh.
fn merge_restored(live: Vec<HostTab>, stored: Option<&Value>, now: DateTime<Utc>) -> TabRegistry {
    let mut previous: HashMap<TabId, TabRecord> = match stored {
        Some(value) => match serde_json::from_value::<Vec<TabRecord>>(value.clone()) {
            Ok(records) => records.into_iter().map(|tab| (tab.id, tab)).collect(),
            Err(err) => {
                warn!(%err, "ignoring malformed persisted tabs");
                HashMap::new()
            }
        },
        None => HashMap::new(),
    };
    let records = live
        .into_iter()
        .map(|tab| match previous.remove(&tab.id) {
            Some(record) if page_identity(&record.url) == page_identity(&tab.url) => TabRecord {
                window_id: tab.window_id,
                index: tab.index,
                url: tab.url,
                title: tab.title,
                ..record
            },
            _ => TabRecord::observed(tab, now),
        })
        .collect();
    TabRegistry::from_records(records)
}

fn spawn_ticker(handle: GovernorHandle, generation: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if handle.tick(generation).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use serde_json::json;

    use tg_core::ManualClock;
    use tg_store::MemoryStore;

    use crate::sim::{RecordingBadge, SimulatedHost};

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
    }

    async fn start(
        host: &Arc<SimulatedHost>,
        store: &Arc<MemoryStore>,
        inbox: Inbox,
        badge: &Arc<RecordingBadge>,
    ) -> Governor<Arc<SimulatedHost>, Arc<MemoryStore>> {
        Governor::start(
            Collaborators {
                host: Arc::clone(host),
                store: Arc::clone(store),
                badge: Box::new(Arc::clone(badge)),
                clock: Arc::new(clock()),
            },
            GovernorOptions {
                ticks: TickSource::Manual,
                ..GovernorOptions::default()
            },
            inbox,
        )
        .await
        .unwrap()
    }

    fn settings(value: Value) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_values(
            value.as_object().cloned().unwrap(),
        ))
    }

    #[tokio::test]
    async fn restored_records_keep_durations_for_same_page() {
        let (handle, inbox) = crate::inbox::channel();
        let host = Arc::new(SimulatedHost::new(handle));
        let window = host.seed_window(&["https://a.test/x?q=1", "https://b.test/"]);
        let tabs = host.tabs();
        let created = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let store = settings(json!({
            "tabs": [
                {"id": tabs[0].id, "windowId": window, "index": 0, "url": "https://a.test/x?q=2",
                 "title": "", "createdAt": created.timestamp_millis(), "timeActive": 5000},
                {"id": tabs[1].id, "windowId": window, "index": 1, "url": "https://other.test/",
                 "title": "", "createdAt": created.timestamp_millis(), "timeActive": 7000},
            ],
        }));
        let badge = Arc::new(RecordingBadge::new());

        let governor = start(&host, &store, inbox, &badge).await;

        let first = governor.registry().get(tabs[0].id).unwrap();
        assert_eq!(first.created_at, created);
        assert_eq!(first.time_active, 5000);
        let second = governor.registry().get(tabs[1].id).unwrap();
        assert_eq!(second.time_active, 0);
        assert_ne!(second.created_at, created);
    }

    #[tokio::test]
    async fn failed_removal_drops_token() {
        let (handle, inbox) = crate::inbox::channel();
        let host = Arc::new(SimulatedHost::new(handle));
        host.seed_window(&["https://a.test/", "https://b.test/"]);
        let store = settings(json!({"maxTabs": 2, "maxTabsEnabled": true}));
        let badge = Arc::new(RecordingBadge::new());
        let mut governor = start(&host, &store, inbox, &badge).await;

        host.set_fail_removals(true);
        let window = host.tabs()[0].window_id;
        host.open_tab(window, "https://c.test/").unwrap();
        governor.drain().await;

        assert!(governor.pending.is_empty());
        assert_eq!(governor.tab_count(), 3);
        assert_eq!(host.tabs().len(), 3);
    }

    #[tokio::test]
    async fn stale_generation_tick_is_ignored() {
        let (handle, inbox) = crate::inbox::channel();
        let host = Arc::new(SimulatedHost::new(handle));
        host.seed_window(&["https://a.test/", "https://b.test/"]);
        let store = settings(json!({
            "maxTabs": 2, "maxTabsEnabled": true, "countdown": 1, "countdownEnabled": true,
        }));
        let badge = Arc::new(RecordingBadge::new());
        let mut governor = start(&host, &store, inbox, &badge).await;
        let first = governor.countdown.state().unwrap().generation;

        // Restart through a settings change.
        store
            .set(json!({"countdown": 2}).as_object().cloned().unwrap())
            .await
            .unwrap();
        governor.drain().await;
        let second = governor.countdown.state().unwrap();
        assert!(second.generation > first);

        governor.on_tick(first).await;
        assert_eq!(governor.countdown.state(), Some(second));
    }

    #[tokio::test]
    async fn persist_failures_are_absorbed() {
        let (handle, inbox) = crate::inbox::channel();
        let host = Arc::new(SimulatedHost::new(handle));
        let window = host.seed_window(&["https://a.test/"]);
        let store = Arc::new(MemoryStore::new());
        let badge = Arc::new(RecordingBadge::new());
        let mut governor = start(&host, &store, inbox, &badge).await;

        store.set_fail_writes(true);
        host.open_tab(window, "https://b.test/").unwrap();
        governor.drain().await;

        assert_eq!(governor.tab_count(), 2);
        assert_eq!(badge.last().unwrap().text, "2");
    }

    #[tokio::test]
    async fn unsaved_peak_is_written_after_store_recovers() {
        let (handle, inbox) = crate::inbox::channel();
        let host = Arc::new(SimulatedHost::new(handle));
        let window = host.seed_window(&["https://a.test/"]);
        let store = Arc::new(MemoryStore::new());
        let badge = Arc::new(RecordingBadge::new());
        let mut governor = start(&host, &store, inbox, &badge).await;
        let today = date_key(clock().today());
        assert_eq!(store.value(&today), Some(json!({"maxTabs": 1})));

        store.set_fail_writes(true);
        let second = host.open_background_tab(window, "https://b.test/").unwrap();
        governor.drain().await;
        assert_eq!(store.value(&today), Some(json!({"maxTabs": 1})));

        store.set_fail_writes(false);
        host.activate(second).unwrap();
        governor.drain().await;

        assert_eq!(store.value(&today), Some(json!({"maxTabs": 2})));
        assert_eq!(governor.stats.peak(), 2);
    }

    #[tokio::test]
    async fn failed_rollover_keeps_offering_the_new_day() {
        let (handle, inbox) = crate::inbox::channel();
        let host = Arc::new(SimulatedHost::new(handle));
        let window = host.seed_window(&["https://a.test/"]);
        let store = settings(json!({"today": "2025-2-28", "2025-2-28": {"maxTabs": 9}}));
        store.set_fail_writes(true);
        let badge = Arc::new(RecordingBadge::new());
        let mut governor = start(&host, &store, inbox, &badge).await;
        assert_eq!(store.value(keys::TODAY), Some(json!("2025-2-28")));

        store.set_fail_writes(false);
        let tab = host.open_background_tab(window, "https://b.test/").unwrap();
        host.activate(tab).unwrap();
        governor.drain().await;

        let today = date_key(clock().today());
        assert_eq!(store.value(keys::TODAY), Some(json!(today)));
        assert_eq!(store.value(&today), Some(json!({"maxTabs": 2})));
    }
}
