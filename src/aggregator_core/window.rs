//! Trailing window catalog shared by the sum and corpus facets

use super::error::AggregateError;
use chrono::Duration;
use std::collections::HashSet;

/// The seven standard trailing windows, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowSize {
    Min15,
    Min30,
    Hour1,
    Hour6,
    Day1,
    Week1,
    Month1,
}

impl WindowSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowSize::Min15 => "last15Minutes",
            WindowSize::Min30 => "last30Minutes",
            WindowSize::Hour1 => "last1Hour",
            WindowSize::Hour6 => "last6Hours",
            WindowSize::Day1 => "last1Day",
            WindowSize::Week1 => "last1Week",
            WindowSize::Month1 => "last1Month",
        }
    }

    pub fn duration_secs(&self) -> i64 {
        match self {
            WindowSize::Min15 => 15 * 60,
            WindowSize::Min30 => 30 * 60,
            WindowSize::Hour1 => 60 * 60,
            WindowSize::Hour6 => 6 * 60 * 60,
            WindowSize::Day1 => 24 * 60 * 60,
            WindowSize::Week1 => 7 * 24 * 60 * 60,
            // Calendar-agnostic month
            WindowSize::Month1 => 30 * 24 * 60 * 60,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        WindowSize::all().into_iter().find(|w| w.as_str() == s)
    }

    pub fn all() -> [WindowSize; 7] {
        [
            WindowSize::Min15,
            WindowSize::Min30,
            WindowSize::Hour1,
            WindowSize::Hour6,
            WindowSize::Day1,
            WindowSize::Week1,
            WindowSize::Month1,
        ]
    }
}

/// A named trailing interval `[now - duration, now]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    name: String,
    duration: Duration,
}

impl WindowSpec {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Inclusive lower bound of this window, in epoch milliseconds
    pub fn cutoff_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.duration.num_milliseconds())
    }
}

impl From<WindowSize> for WindowSpec {
    fn from(size: WindowSize) -> Self {
        WindowSpec::new(size.as_str(), Duration::seconds(size.duration_secs()))
    }
}

/// Ordered, immutable set of windows
///
/// Order is insertion order and is the key order of every report. Durations
/// are not required to be increasing; each window is evaluated on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCatalog {
    windows: Vec<WindowSpec>,
}

impl WindowCatalog {
    /// Build a catalog, rejecting duplicate names and negative durations
    pub fn new(windows: Vec<WindowSpec>) -> Result<Self, AggregateError> {
        let mut seen = HashSet::with_capacity(windows.len());
        for window in &windows {
            if !seen.insert(window.name.as_str()) {
                return Err(AggregateError::InvalidRequest(format!(
                    "duplicate window name: {}",
                    window.name
                )));
            }
            if window.duration < Duration::zero() {
                return Err(AggregateError::InvalidRequest(format!(
                    "negative duration for window: {}",
                    window.name
                )));
            }
        }
        Ok(Self { windows })
    }

    /// 15m, 30m, 1h, 6h, 1d, 1w, 1month
    pub fn standard() -> Self {
        Self {
            windows: WindowSize::all().into_iter().map(WindowSpec::from).collect(),
        }
    }

    pub fn windows(&self) -> &[WindowSpec] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&WindowSpec> {
        self.windows.iter().find(|w| w.name == name)
    }

    /// Narrow to the named windows, keeping catalog order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, AggregateError> {
        for name in names {
            if self.get(name.as_ref()).is_none() {
                return Err(AggregateError::InvalidRequest(format!(
                    "unknown window name: {}",
                    name.as_ref()
                )));
            }
        }

        let windows = self
            .windows
            .iter()
            .filter(|w| names.iter().any(|n| n.as_ref() == w.name))
            .cloned()
            .collect();

        Ok(Self { windows })
    }

    /// Smallest cutoff across the catalog, i.e. the widest scan needed
    pub fn earliest_cutoff_millis(&self, now_millis: i64) -> Option<i64> {
        self.windows
            .iter()
            .map(|w| w.cutoff_millis(now_millis))
            .min()
    }
}

impl Default for WindowCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
