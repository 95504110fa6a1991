//! Replay command: drive the governor with a scripted browser session.
//!
//! A script is JSON Lines, one step per line. Blank lines and lines
//! starting with `#` are skipped. Tab and window ids are the ones the
//! simulated browser hands out, counting up from 1.
//!
//! ```text
//! {"action": "seed_window", "urls": ["https://a.test/", "https://b.test/"]}
//! {"action": "settings", "edit": {"max_tabs": 2, "max_tabs_enabled": true}}
//! {"action": "open_tab", "window": 1, "url": "https://c.test/"}
//! {"action": "wait", "seconds": 90}
//! {"action": "snapshot"}
//! ```
//!
//! Time is virtual unless `realtime` is set: waits advance a manual clock
//! and fire countdown ticks immediately. In realtime mode the governor
//! runs on its own task with an interval ticker and waits sleep.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::task::JoinHandle;

use tg_core::{Badge, BadgeConfig, Clock, ManualClock, SettingsEdit, SystemClock, TabId, WindowId};
use tg_governor::{
    BadgeSink, Collaborators, Command, Governor, GovernorHandle, GovernorOptions, Reply,
    SimulatedHost, Snapshot, TickSource, channel,
};
use tg_store::ConfigStore;

use super::settings::apply_edit;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// A window that exists before the governor starts. Only allowed at
    /// the top of a script.
    SeedWindow { urls: Vec<String> },
    OpenWindow { url: String },
    OpenTab {
        window: WindowId,
        url: String,
        #[serde(default)]
        background: bool,
    },
    CloseTab { tab: TabId },
    /// Loads `url` in `tab`, passing through the `via` redirects first.
    Navigate {
        tab: TabId,
        url: String,
        #[serde(default)]
        via: Vec<String>,
    },
    Activate { tab: TabId },
    MoveTab { tab: TabId, index: u32 },
    MoveToWindow { tab: TabId, window: WindowId, index: u32 },
    CloseWindow { window: WindowId },
    /// Focuses a window, or takes focus away from the browser.
    FocusWindow {
        #[serde(default)]
        window: Option<WindowId>,
    },
    Settings { edit: SettingsEdit },
    Wait { seconds: u32 },
    Highlight { window: WindowId, index: u32 },
    ResetActivity,
    Snapshot,
}

/// A step and the script line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub step: Step,
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub realtime: bool,
    /// Length of one countdown second in realtime mode.
    pub second: Duration,
    pub badge: BadgeConfig,
    /// Virtual clock start.
    pub start: DateTime<Utc>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            realtime: false,
            second: Duration::from_secs(1),
            badge: BadgeConfig::default(),
            start: Utc::now(),
        }
    }
}

/// Parses a whole script up front so a typo fails before anything runs.
pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>> {
    let mut steps = Vec::new();
    let mut seeding = true;
    for (number, text) in source.lines().enumerate() {
        let line = number + 1;
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let step: Step =
            serde_json::from_str(text).with_context(|| format!("line {line}: invalid step"))?;
        if matches!(step, Step::SeedWindow { .. }) {
            if !seeding {
                bail!("line {line}: seed_window must come before other steps");
            }
        } else {
            seeding = false;
        }
        steps.push(ScriptLine { line, step });
    }
    Ok(steps)
}

/// Badge sink stamping each badge with seconds since the replay began.
struct Timeline {
    clock: Arc<dyn Clock>,
    start: DateTime<Utc>,
    entries: Mutex<Vec<(i64, Badge)>>,
}

impl Timeline {
    fn new(clock: Arc<dyn Clock>) -> Self {
        let start = clock.now();
        Self {
            clock,
            start,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn offset(&self) -> i64 {
        (self.clock.now() - self.start).num_seconds()
    }

    fn take(&self) -> Vec<(i64, Badge)> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn flush<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (offset, badge) in self.take() {
            writeln!(
                writer,
                "{offset:>5}s  badge {:<5} {}",
                badge.text, badge.color
            )?;
        }
        Ok(())
    }
}

impl BadgeSink for Timeline {
    fn render(&self, badge: &Badge) {
        let offset = self.offset();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((offset, badge.clone()));
    }
}

type SimGovernor<S> = Governor<Arc<SimulatedHost>, Arc<S>>;

enum Driver<S> {
    /// The governor is stepped inline against a manual clock.
    Virtual {
        governor: SimGovernor<S>,
        clock: ManualClock,
    },
    /// The governor runs on its own task.
    Realtime {
        handle: GovernorHandle,
        task: JoinHandle<()>,
        second: Duration,
    },
}

impl<S: ConfigStore + 'static> Driver<S> {
    /// Waits until the governor has handled everything queued so far.
    async fn settle(&mut self) -> Result<()> {
        match self {
            Self::Virtual { governor, .. } => {
                governor.drain().await;
            }
            Self::Realtime { handle, .. } => handle.barrier().await?,
        }
        Ok(())
    }

    async fn wait(&mut self, seconds: u32) -> Result<()> {
        match self {
            Self::Virtual { governor, clock } => {
                for _ in 0..seconds {
                    clock.advance(TimeDelta::seconds(1));
                    governor.tick().await;
                    governor.drain().await;
                }
            }
            Self::Realtime { handle, second, .. } => {
                tokio::time::sleep(*second * seconds).await;
                handle.barrier().await?;
            }
        }
        Ok(())
    }

    async fn command(&mut self, command: Command) -> Result<Reply> {
        let reply = match self {
            Self::Virtual { governor, .. } => {
                let reply = governor.execute(command).await?;
                governor.drain().await;
                reply
            }
            Self::Realtime { handle, .. } => handle.command(command).await?,
        };
        Ok(reply)
    }

    async fn snapshot(&mut self) -> Result<Snapshot> {
        match self.command(Command::Snapshot).await? {
            Reply::Snapshot(snapshot) => Ok(*snapshot),
            Reply::Done => bail!("governor answered a snapshot request without one"),
        }
    }

    async fn finish(self) -> Result<()> {
        if let Self::Realtime { handle, task, .. } = self {
            handle.shutdown()?;
            task.await.context("governor task failed")?;
        }
        Ok(())
    }
}

/// Replays `script` against a fresh simulated browser, writing a timeline
/// of steps and badge changes.
///
/// A step the browser rejects, such as closing a tab the governor already
/// closed, is reported and the replay continues.
pub async fn run<W: Write, S: ConfigStore + 'static>(
    writer: &mut W,
    store: Arc<S>,
    script: &str,
    options: &ReplayOptions,
) -> Result<()> {
    let steps = parse_script(script)?;
    let (handle, inbox) = channel();
    let host = Arc::new(SimulatedHost::new(handle.clone()));

    let mut rest = steps.as_slice();
    while let Some((
        ScriptLine {
            step: Step::SeedWindow { urls },
            ..
        },
        tail,
    )) = rest.split_first()
    {
        let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
        host.seed_window(&urls);
        rest = tail;
    }

    let manual = ManualClock::new(options.start);
    let clock: Arc<dyn Clock> = if options.realtime {
        Arc::new(SystemClock)
    } else {
        Arc::new(manual.clone())
    };
    let timeline = Arc::new(Timeline::new(Arc::clone(&clock)));
    let ticks = if options.realtime {
        TickSource::Interval(options.second)
    } else {
        TickSource::Manual
    };

    let governor = Governor::start(
        Collaborators {
            host: Arc::clone(&host),
            store: Arc::clone(&store),
            badge: Box::new(Arc::clone(&timeline)),
            clock,
        },
        GovernorOptions {
            badge: options.badge.clone(),
            ticks,
        },
        inbox,
    )
    .await
    .context("failed to start governor")?;
    tracing::info!(steps = rest.len(), realtime = options.realtime, "replaying script");

    let mut driver = if options.realtime {
        Driver::Realtime {
            handle,
            task: tokio::spawn(governor.run()),
            second: options.second,
        }
    } else {
        Driver::Virtual {
            governor,
            clock: manual,
        }
    };
    driver.settle().await?;
    let started = driver.snapshot().await?;
    writeln!(writer, "{:>5}s  started with {} tabs", 0, started.tab_count)?;
    timeline.flush(writer)?;

    for ScriptLine { line, step } in rest {
        let offset = timeline.offset();
        let outcome = perform(&mut driver, &host, store.as_ref(), step).await;
        driver.settle().await?;
        match outcome {
            Ok(message) => writeln!(writer, "{offset:>5}s  {message}")?,
            Err(err) => {
                tracing::debug!(line, %err, "step failed");
                writeln!(writer, "{offset:>5}s  line {line}: {err:#}")?;
            }
        }
        timeline.flush(writer)?;
    }

    driver.finish().await
}

async fn perform<S: ConfigStore + 'static>(
    driver: &mut Driver<S>,
    host: &SimulatedHost,
    store: &S,
    step: &Step,
) -> Result<String> {
    let message = match step {
        Step::SeedWindow { .. } => bail!("seed_window must come before other steps"),
        Step::OpenWindow { url } => {
            let (window, tab) = host.open_window(url);
            format!("opened window {window} with tab {tab}")
        }
        Step::OpenTab {
            window,
            url,
            background,
        } => {
            let tab = if *background {
                host.open_background_tab(*window, url)?
            } else {
                host.open_tab(*window, url)?
            };
            format!("opened tab {tab} in window {window}")
        }
        Step::CloseTab { tab } => {
            host.close_tab(*tab)?;
            format!("closed tab {tab}")
        }
        Step::Navigate { tab, url, via } => {
            if via.is_empty() {
                host.navigate(*tab, url)?;
            } else {
                let urls: Vec<&str> = via
                    .iter()
                    .map(String::as_str)
                    .chain([url.as_str()])
                    .collect();
                host.navigate_via(*tab, &urls)?;
            }
            format!("tab {tab} loaded {url}")
        }
        Step::Activate { tab } => {
            host.activate(*tab)?;
            format!("activated tab {tab}")
        }
        Step::MoveTab { tab, index } => {
            host.move_tab(*tab, *index)?;
            format!("moved tab {tab} to index {index}")
        }
        Step::MoveToWindow { tab, window, index } => {
            host.move_to_window(*tab, *window, *index)?;
            format!("moved tab {tab} to window {window} at index {index}")
        }
        Step::CloseWindow { window } => {
            host.close_window(*window)?;
            format!("closed window {window}")
        }
        Step::FocusWindow { window } => {
            host.focus_window(*window)?;
            window.map_or_else(
                || "browser lost focus".to_string(),
                |window| format!("focused window {window}"),
            )
        }
        Step::Settings { edit } => {
            let snapshot = driver.snapshot().await?;
            match apply_edit(store, &snapshot.config, edit, snapshot.tab_count).await? {
                Ok(_) => "settings updated".to_string(),
                Err(err) => format!("settings refused: {}", err.user_message()),
            }
        }
        Step::Wait { seconds } => {
            driver.wait(*seconds).await?;
            format!("waited {seconds}s")
        }
        Step::Highlight { window, index } => {
            driver
                .command(Command::HighlightTab {
                    index: *index,
                    window_id: *window,
                })
                .await?;
            format!("highlighted index {index} in window {window}")
        }
        Step::ResetActivity => {
            driver.command(Command::ResetActivity).await?;
            "activity reset".to_string()
        }
        Step::Snapshot => describe(&driver.snapshot().await?),
    };
    Ok(message)
}

fn describe(snapshot: &Snapshot) -> String {
    let tabs: Vec<String> = snapshot.tabs.iter().map(|tab| tab.id.to_string()).collect();
    let focused = snapshot
        .focused_tab
        .map_or_else(|| "none".to_string(), |tab| tab.to_string());
    let countdown = snapshot.countdown.map_or_else(
        || "idle".to_string(),
        |state| format!("{}s left", state.seconds_remaining()),
    );
    format!(
        "tabs {}, focused {focused}, countdown {countdown}, peak {}",
        tabs.join(" "),
        snapshot.today_peak
    )
}
