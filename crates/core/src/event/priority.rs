//! Listener priorities

use super::EventError;
use std::str::FromStr;

/// Priority of a listener
///
/// Listeners run from [`EventPriority::Lowest`] up to [`EventPriority::Monitor`].
///
/// Listeners with a lower priority run first, so a higher priority listener has
/// the final say over the outcome of an event. `Monitor` listeners should only
/// observe the result and never modify the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventPriority {
    Lowest = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Highest = 4,
    Monitor = 5,
}

impl EventPriority {
    /// All priorities in dispatch order
    pub const ALL: [EventPriority; 6] = [
        Self::Lowest,
        Self::Low,
        Self::Normal,
        Self::High,
        Self::Highest,
        Self::Monitor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lowest => "LOWEST",
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Highest => "HIGHEST",
            Self::Monitor => "MONITOR",
        }
    }
}

impl Default for EventPriority {
    fn default() -> Self {
        EventPriority::Normal
    }
}

impl FromStr for EventPriority {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EventError::UnknownPriority(s.to_owned()))
    }
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
