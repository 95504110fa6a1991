//! Countdown state machine.
//!
//! `Idle → Running → (Expired | Cancelled) → Idle`. The scheduler owns
//! the state only; the governor drives it with one [`tick`] per second and
//! owns the timer that produces those ticks.
//!
//! Every start bumps a generation counter. Ticks carry the generation they
//! were scheduled for, so a tick queued by a cancelled timer can never
//! advance a newer countdown.
//!
//! [`tick`]: CountdownScheduler::tick

use serde::Serialize;

use crate::config::GovernorConfig;

/// A running countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownState {
    pub generation: u64,
    pub elapsed_seconds: u32,
    pub target_seconds: u32,
}

impl CountdownState {
    pub const fn seconds_remaining(&self) -> u32 {
        self.target_seconds.saturating_sub(self.elapsed_seconds)
    }
}

/// Result of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belonged to a cancelled countdown.
    Stale,
    /// Still counting down.
    Running { seconds_remaining: u32 },
    /// The countdown reached its target and is now idle.
    Expired,
}

/// Owns at most one running countdown.
#[derive(Debug, Clone, Default)]
pub struct CountdownScheduler {
    running: Option<CountdownState>,
    generation: u64,
    kill_all_latched: bool,
}

impl CountdownScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub const fn state(&self) -> Option<CountdownState> {
        self.running
    }

    pub fn seconds_remaining(&self) -> Option<u32> {
        self.running.map(|state| state.seconds_remaining())
    }

    pub const fn kill_all_latched(&self) -> bool {
        self.kill_all_latched
    }

    /// Starts a fresh countdown, replacing any running one.
    ///
    /// Returns the generation the new countdown's ticks must carry.
    pub fn start(&mut self, target_seconds: u32) -> u64 {
        self.cancel();
        self.generation += 1;
        self.running = Some(CountdownState {
            generation: self.generation,
            elapsed_seconds: 0,
            target_seconds: target_seconds.max(1),
        });
        self.generation
    }

    /// Stops the running countdown. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        self.running.take().is_some()
    }

    /// Advances the countdown scheduled under `generation` by one second.
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        let Some(state) = self.running.as_mut() else {
            return TickOutcome::Stale;
        };
        if state.generation != generation {
            return TickOutcome::Stale;
        }
        state.elapsed_seconds += 1;
        if state.elapsed_seconds >= state.target_seconds {
            self.running = None;
            TickOutcome::Expired
        } else {
            TickOutcome::Running {
                seconds_remaining: state.seconds_remaining(),
            }
        }
    }

    /// Whether the countdown should be running for `tab_count` open tabs.
    ///
    /// Ordinary mode holds while the count sits exactly at the limit.
    /// Kill-all mode latches once the limit is reached and keeps holding,
    /// as tabs are closed, until no tab remains or the mode is switched
    /// off.
    pub fn should_run(&mut self, config: &GovernorConfig, tab_count: u32) -> bool {
        let Some(limit) = config.max_tabs.filter(|_| config.countdown_armed()) else {
            self.kill_all_latched = false;
            return false;
        };

        if !config.kill_all_mode {
            self.kill_all_latched = false;
            return tab_count == limit;
        }

        if tab_count == 0 {
            self.kill_all_latched = false;
        } else if tab_count >= limit {
            self.kill_all_latched = true;
        }
        self.kill_all_latched && tab_count > 0 && tab_count <= limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_tabs: u32, kill_all: bool) -> GovernorConfig {
        GovernorConfig {
            max_tabs: Some(max_tabs),
            max_tabs_enabled: true,
            countdown_minutes: 1.0,
            countdown_enabled: true,
            kill_all_mode: kill_all,
            ..GovernorConfig::default()
        }
    }

    #[test]
    fn remaining_strictly_decreases_until_expiry() {
        let mut scheduler = CountdownScheduler::new();
        let generation = scheduler.start(60);
        assert_eq!(scheduler.seconds_remaining(), Some(60));

        let mut last = 60;
        for _ in 0..59 {
            match scheduler.tick(generation) {
                TickOutcome::Running { seconds_remaining } => {
                    assert!(seconds_remaining < last);
                    last = seconds_remaining;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(last, 1);
        assert_eq!(scheduler.tick(generation), TickOutcome::Expired);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn restart_resets_to_full_duration_and_drops_old_ticks() {
        let mut scheduler = CountdownScheduler::new();
        let first = scheduler.start(10);
        scheduler.tick(first);
        scheduler.tick(first);

        let second = scheduler.start(10);

        assert_ne!(first, second);
        assert_eq!(scheduler.seconds_remaining(), Some(10));
        assert_eq!(scheduler.tick(first), TickOutcome::Stale);
        assert_eq!(scheduler.seconds_remaining(), Some(10));
    }

    #[test]
    fn tick_after_cancel_is_stale() {
        let mut scheduler = CountdownScheduler::new();
        let generation = scheduler.start(5);
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        assert_eq!(scheduler.tick(generation), TickOutcome::Stale);
    }

    #[test]
    fn ordinary_mode_holds_only_at_the_limit() {
        let mut scheduler = CountdownScheduler::new();
        let config = config(3, false);

        assert!(!scheduler.should_run(&config, 2));
        assert!(scheduler.should_run(&config, 3));
        assert!(!scheduler.should_run(&config, 4));
    }

    #[test]
    fn countdown_needs_both_switches() {
        let mut scheduler = CountdownScheduler::new();
        let mut no_countdown = config(3, false);
        no_countdown.countdown_enabled = false;
        assert!(!scheduler.should_run(&no_countdown, 3));

        let mut no_limit = config(3, false);
        no_limit.max_tabs_enabled = false;
        assert!(!scheduler.should_run(&no_limit, 3));
    }

    #[test]
    fn kill_all_latches_at_the_limit_and_holds_below_it() {
        let mut scheduler = CountdownScheduler::new();
        let config = config(3, true);

        assert!(!scheduler.should_run(&config, 2));
        assert!(scheduler.should_run(&config, 3));
        assert!(scheduler.kill_all_latched());
        assert!(scheduler.should_run(&config, 2));
        assert!(scheduler.should_run(&config, 1));
        assert!(!scheduler.should_run(&config, 0));
        assert!(!scheduler.kill_all_latched());
        assert!(!scheduler.should_run(&config, 1));
    }

    #[test]
    fn disabling_kill_all_releases_latch() {
        let mut scheduler = CountdownScheduler::new();
        scheduler.should_run(&config(3, true), 3);

        assert!(!scheduler.should_run(&config(3, false), 2));
        assert!(!scheduler.kill_all_latched());
    }
}
