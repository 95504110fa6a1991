//! Tab limit policy.

use crate::config::GovernorConfig;

/// Decision for a newly created tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The tab may stay.
    Admit,
    /// The tab pushes the count over the limit and must be closed.
    Reject { limit: u32 },
}

/// What startup reconciliation changed in the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupAdjustment {
    /// Settings are consistent with the live tab count.
    None,
    /// No limit was stored; the live count became the limit.
    Baseline { max_tabs: u32 },
    /// The stored limit is below the live count; enforcement and countdown
    /// were switched off so nothing gets closed on start.
    Disabled { max_tabs: u32, live: u32 },
}

/// Admission decision for a tab that brought the count to `tab_count`.
///
/// Only the tab causing the overflow is rejected; lowering the limit below
/// the live count never closes existing tabs.
pub const fn evaluate(config: &GovernorConfig, tab_count: u32) -> Admission {
    match config.enforced_limit() {
        Some(limit) if tab_count > limit => Admission::Reject { limit },
        _ => Admission::Admit,
    }
}

/// Reconciles stored settings with the tab count found at startup.
pub fn reconcile_startup(config: &mut GovernorConfig, live: u32) -> StartupAdjustment {
    match config.max_tabs {
        None => {
            // Zero tabs would make a useless limit.
            let max_tabs = live.max(1);
            config.max_tabs = Some(max_tabs);
            StartupAdjustment::Baseline { max_tabs }
        }
        Some(max_tabs) if max_tabs < live && config.max_tabs_enabled => {
            config.max_tabs_enabled = false;
            config.countdown_enabled = false;
            config.kill_all_mode = false;
            StartupAdjustment::Disabled { max_tabs, live }
        }
        Some(_) => StartupAdjustment::None,
    }
}
