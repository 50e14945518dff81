//! Round configuration and the room phase state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoundConfig
// ---------------------------------------------------------------------------

/// Tunables for rounds. Shared by every room a registry creates.
///
/// Logical round time (`round_length`, `tick_step`) and wall-clock cadence
/// (`tick_interval_ms`) are independent; with the defaults one logical
/// unit is one second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Time on the clock when a round starts.
    pub round_length: f64,

    /// Time removed from the clock on every tick.
    pub tick_step: f64,

    /// Wall-clock milliseconds between ticks.
    pub tick_interval_ms: u64,

    /// Fraction of the lead's distance from 50/50 removed each tick.
    pub decay_rate: f64,

    /// Players required before a round can start. Never below 2.
    pub min_players: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_length: 60.0,
            tick_step: 0.5,
            tick_interval_ms: 500,
            decay_rate: 0.05,
            min_players: 2,
        }
    }
}

impl RoundConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Number of ticks a full round lasts.
    pub fn ticks_per_round(&self) -> u64 {
        (self.round_length / self.tick_step).ceil() as u64
    }

    /// Effective player minimum; two contestants are always required.
    pub fn min_players(&self) -> usize {
        self.min_players.max(2)
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its round cycle.
///
/// ```text
/// Idle → Starting → InProgress → Idle → ...
/// ```
///
/// - **Idle**: accepting joins; a round may be started.
/// - **Starting**: category and contestants are being chosen. Only ever
///   observed inside `Room::start_game`.
/// - **InProgress**: the clock is running; joins are refused.
///
/// A round leaves `InProgress` when its clock runs out, or when the room
/// is closed outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Idle,
    Starting,
    InProgress,
}

impl RoomPhase {
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// The only phase reachable from this one.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Starting,
            Self::Starting => Self::InProgress,
            Self::InProgress => Self::Idle,
        }
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == target
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::InProgress => write!(f, "InProgress"),
        }
    }
}
