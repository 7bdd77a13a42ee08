//! Sliding window log primitive
//!
//! A window log is an ordered multiset of request timestamps (epoch
//! milliseconds) covering the trailing window duration. Entries at or before
//! `now - duration` are expired and purged on every evaluation.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Window granularity, in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Minute,
    Hour,
    Day,
}

impl WindowKind {
    /// All windows, tightest first
    pub const ALL: [WindowKind; 3] = [WindowKind::Minute, WindowKind::Hour, WindowKind::Day];

    pub fn duration(self) -> Duration {
        Duration::from_millis(self.duration_millis())
    }

    pub fn duration_millis(self) -> u64 {
        match self {
            WindowKind::Minute => 60_000,
            WindowKind::Hour => 3_600_000,
            WindowKind::Day => 86_400_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowKind::Minute => "minute",
            WindowKind::Hour => "hour",
            WindowKind::Day => "day",
        }
    }

    fn index(self) -> usize {
        match self {
            WindowKind::Minute => 0,
            WindowKind::Hour => 1,
            WindowKind::Day => 2,
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A window to evaluate and its ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub kind: WindowKind,
    pub limit: u64,
}

impl WindowSpec {
    pub fn new(kind: WindowKind, limit: u64) -> Self {
        Self { kind, limit }
    }
}

/// Observed state of one window at evaluation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUsage {
    pub kind: WindowKind,
    pub limit: u64,
    /// Entries surviving the purge, not counting the request being evaluated
    pub count: u64,
    /// Oldest surviving timestamp
    pub oldest_millis: Option<u64>,
}

impl WindowUsage {
    pub fn is_exhausted(&self) -> bool {
        self.count >= self.limit
    }
}

/// Outcome of evaluating every window of one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowDecision {
    /// Every window had capacity; usage is reported per evaluated window
    Admitted { usage: Vec<WindowUsage> },
    /// The first window found at or over its limit
    Denied { usage: WindowUsage },
}

impl WindowDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, WindowDecision::Admitted { .. })
    }

    /// Build a decision from usage collected in evaluation order, stopping at
    /// the first exhausted window
    pub fn from_usage(usage: Vec<WindowUsage>) -> Self {
        match usage.iter().find(|u| u.is_exhausted()) {
            Some(denied) => WindowDecision::Denied { usage: *denied },
            None => WindowDecision::Admitted { usage },
        }
    }
}

/// Timestamp log for a single window
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowLog {
    timestamps: VecDeque<u64>,
}

impl SlidingWindowLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry at or before `now - duration`
    pub fn purge(&mut self, now_millis: u64, duration_millis: u64) {
        let cutoff = now_millis.saturating_sub(duration_millis);
        while let Some(&front) = self.timestamps.front() {
            if front > cutoff {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    /// Insert a timestamp, keeping the log ordered even if the clock stepped back
    pub fn record(&mut self, timestamp_millis: u64) {
        match self.timestamps.back() {
            Some(&last) if last > timestamp_millis => {
                let at = self.timestamps.partition_point(|&t| t <= timestamp_millis);
                self.timestamps.insert(at, timestamp_millis);
            }
            _ => self.timestamps.push_back(timestamp_millis),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn oldest(&self) -> Option<u64> {
        self.timestamps.front().copied()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}

/// The minute/hour/day logs of one `(identity, endpoint)` pair
#[derive(Debug, Clone, Default)]
pub struct WindowSet {
    logs: [SlidingWindowLog; 3],
}

impl WindowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Purge, check and (when `record` is set and every window passes)
    /// append `now` to every evaluated window.
    ///
    /// Windows are evaluated in the order given and evaluation stops at the
    /// first exhausted window. The caller must hold exclusive access for the
    /// whole call.
    pub fn acquire(
        &mut self,
        windows: &[WindowSpec],
        now_millis: u64,
        record: bool,
    ) -> WindowDecision {
        let mut usage = Vec::with_capacity(windows.len());

        for spec in windows {
            let log = &mut self.logs[spec.kind.index()];
            log.purge(now_millis, spec.kind.duration_millis());

            let observed = WindowUsage {
                kind: spec.kind,
                limit: spec.limit,
                count: log.len() as u64,
                oldest_millis: log.oldest(),
            };
            if observed.is_exhausted() {
                return WindowDecision::Denied { usage: observed };
            }
            usage.push(observed);
        }

        if record {
            for spec in windows {
                self.logs[spec.kind.index()].record(now_millis);
            }
        }

        WindowDecision::Admitted { usage }
    }

    /// Purge every log against its own duration
    pub fn purge_all(&mut self, now_millis: u64) {
        for kind in WindowKind::ALL {
            self.logs[kind.index()].purge(now_millis, kind.duration_millis());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.logs.iter().all(SlidingWindowLog::is_empty)
    }

    pub fn log(&self, kind: WindowKind) -> &SlidingWindowLog {
        &self.logs[kind.index()]
    }
}
