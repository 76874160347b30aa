//! Daily completion streak and badges.
//!
//! A streak counts consecutive local calendar days on which at least one full
//! step sequence was completed. It is stored under `streak_data` as
//! `{"count": n, "lastDate": "YYYY-MM-DD" | null}`.

use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::{SharedKeyValueStore, STREAK_DATA_KEY};

/// Persisted streak state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakRecord {
    pub count: u32,
    #[serde(rename = "lastDate")]
    pub last_completion_date: Option<NaiveDate>,
}

/// Milestone badge shown next to the streak counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub label: &'static str,
    /// Display colour (hex).
    pub color: &'static str,
}

/// Thresholds, highest first.
const BADGES: &[(u32, Badge)] = &[
    (
        30,
        Badge {
            label: "Consistent Legend",
            color: "#6366f1",
        },
    ),
    (
        7,
        Badge {
            label: "Weekly Warrior",
            color: "#22c55e",
        },
    ),
    (
        3,
        Badge {
            label: "Momentum Builder",
            color: "#f59e0b",
        },
    ),
];

/// Badge earned by a streak of `count` days, if any.
pub fn get_badge(count: u32) -> Option<Badge> {
    BADGES
        .iter()
        .find(|(threshold, _)| count >= *threshold)
        .map(|(_, badge)| *badge)
}

/// Source of "today" for the tracker.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Records sequence completions against the streak.
#[derive(Clone)]
pub struct StreakTracker {
    store: SharedKeyValueStore,
    clock: Clock,
}

impl StreakTracker {
    /// Tracker using the local device date.
    pub fn new(store: SharedKeyValueStore) -> Self {
        Self::with_clock(store, Arc::new(|| Local::now().date_naive()))
    }

    pub fn with_clock(store: SharedKeyValueStore, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Current record; empty when nothing (or garbage) is stored.
    pub fn get(&self) -> StreakRecord {
        match self.store.get(STREAK_DATA_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable {}: {}", STREAK_DATA_KEY, e);
                StreakRecord::default()
            }),
            None => StreakRecord::default(),
        }
    }

    /// Record a completed sequence today.
    pub fn record_completion(&self) -> StreakRecord {
        self.record_completion_on((self.clock)())
    }

    /// Record a completed sequence on `today`.
    ///
    /// Same day: unchanged. Day after the last completion: +1. Anything else
    /// (gap, first ever, clock moved backwards): reset to 1.
    pub fn record_completion_on(&self, today: NaiveDate) -> StreakRecord {
        let mut record = self.get();

        if record.last_completion_date == Some(today) {
            return record;
        }

        let yesterday = today.checked_sub_days(Days::new(1));
        if record.last_completion_date.is_some() && record.last_completion_date == yesterday {
            record.count = record.count.saturating_add(1);
        } else {
            record.count = 1;
        }
        record.last_completion_date = Some(today);

        match serde_json::to_string(&record) {
            Ok(raw) => self.store.set(STREAK_DATA_KEY, &raw),
            Err(e) => tracing::warn!("Failed to serialize streak: {}", e),
        }
        tracing::info!(count = record.count, "Streak updated");
        record
    }
}
