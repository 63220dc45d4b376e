//! Sync window aggregation.
//!
//! Projects carry recurring allow and deny windows. This module answers
//! one question: which windows are active at a given instant, and do the
//! active ones permit manual syncs. Cron evaluation itself is delegated to
//! a [`ScheduleResolver`] supplied by the embedding platform.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::SyncWindow;

/// A schedule the resolver could not evaluate.
#[derive(Debug, Error)]
#[error("cannot parse schedule '{schedule}': {reason}")]
pub struct ScheduleError {
    schedule: String,
    reason: String,
}

impl ScheduleError {
    pub fn new(schedule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            reason: reason.into(),
        }
    }
}

/// Cron evaluator supplied by the embedding platform.
pub trait ScheduleResolver: Send + Sync {
    /// First occurrence of `schedule` strictly after `after`.
    fn next_occurrence(
        &self,
        schedule: &str,
        after: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ScheduleError>;
}

/// The active portion of a project's windows at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncWindowsState {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub windows: Vec<SyncWindow>,
    /// True when windows are active and every one of them permits manual
    /// syncs.
    #[serde(default)]
    pub manual_override: bool,
}

/// Select the windows active at `now`.
///
/// A window is active when its most recent occurrence started no later
/// than `now` and `now` falls inside `[start, start + duration)`. Windows
/// whose schedule or duration cannot be parsed are skipped with a warning;
/// one bad rule never poisons the rest.
pub fn active(
    windows: &[SyncWindow],
    resolver: &dyn ScheduleResolver,
    now: DateTime<Utc>,
) -> SyncWindowsState {
    let mut active = Vec::new();

    for window in windows {
        let duration = match humantime::parse_duration(&window.duration)
            .map_err(|err| err.to_string())
            .and_then(|parsed| Duration::from_std(parsed).map_err(|err| err.to_string()))
        {
            Ok(duration) => duration,
            Err(error) => {
                warn!(
                    schedule = %window.schedule,
                    duration = %window.duration,
                    error,
                    "skipping window with unparseable duration"
                );
                continue;
            }
        };

        // A window that started `duration` ago or less is still open.
        match resolver.next_occurrence(&window.schedule, now - duration) {
            Ok(start) if start <= now => active.push(window.clone()),
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "skipping window with unparseable schedule");
            }
        }
    }

    let manual_override = !active.is_empty() && active.iter().all(|window| window.manual_sync);

    SyncWindowsState {
        windows: active,
        manual_override,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DurationRound, TimeZone};

    use super::*;
    use crate::models::SyncWindowKind;

    /// Fires at the top of every hour; accepts only `0 * * * *`.
    struct Hourly;

    impl ScheduleResolver for Hourly {
        fn next_occurrence(
            &self,
            schedule: &str,
            after: DateTime<Utc>,
        ) -> Result<DateTime<Utc>, ScheduleError> {
            if schedule != "0 * * * *" {
                return Err(ScheduleError::new(schedule, "unsupported expression"));
            }
            let start_of_hour = after.duration_trunc(Duration::hours(1)).unwrap();
            Ok(start_of_hour + Duration::hours(1))
        }
    }

    fn hourly_window(duration: &str, manual_sync: bool) -> SyncWindow {
        SyncWindow {
            kind: SyncWindowKind::Deny,
            schedule: "0 * * * *".to_string(),
            duration: duration.to_string(),
            manual_sync,
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, hour, minute, second).unwrap()
    }

    #[test]
    fn window_is_active_inside_its_span() {
        let windows = vec![hourly_window("45m", false)];
        let state = active(&windows, &Hourly, at(10, 30, 0));
        assert_eq!(state.windows, windows);
        assert!(!state.manual_override);
    }

    #[test]
    fn window_is_inactive_outside_its_span() {
        let windows = vec![hourly_window("10m", false)];
        let state = active(&windows, &Hourly, at(10, 30, 0));
        assert_eq!(state, SyncWindowsState::default());
    }

    #[test]
    fn window_start_is_inclusive() {
        let windows = vec![hourly_window("10m", false)];
        let state = active(&windows, &Hourly, at(10, 0, 0));
        assert_eq!(state.windows.len(), 1);
    }

    #[test]
    fn window_end_is_exclusive() {
        let windows = vec![hourly_window("10m", false)];
        let state = active(&windows, &Hourly, at(10, 10, 0));
        assert!(state.windows.is_empty());
    }

    #[test]
    fn unparseable_schedule_skips_only_that_window() {
        let mut bad = hourly_window("45m", false);
        bad.schedule = "not-cron".to_string();
        let good = hourly_window("45m", false);

        let state = active(&[bad, good.clone()], &Hourly, at(10, 30, 0));
        assert_eq!(state.windows, vec![good]);
    }

    #[test]
    fn unparseable_duration_skips_only_that_window() {
        let bad = hourly_window("forever", false);
        let good = hourly_window("45m", false);

        let state = active(&[bad, good.clone()], &Hourly, at(10, 30, 0));
        assert_eq!(state.windows, vec![good]);
    }

    #[test]
    fn manual_override_requires_every_active_window_to_allow_it() {
        let now = at(10, 30, 0);

        let mixed = vec![hourly_window("45m", true), hourly_window("40m", false)];
        assert!(!active(&mixed, &Hourly, now).manual_override);

        let unanimous = vec![hourly_window("45m", true), hourly_window("40m", true)];
        assert!(active(&unanimous, &Hourly, now).manual_override);

        // No active windows, no override.
        let idle = vec![hourly_window("10m", true)];
        assert!(!active(&idle, &Hourly, now).manual_override);
    }
}
