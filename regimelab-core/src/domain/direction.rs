//! Direction: the side of a prediction or a position.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicted or held direction.
///
/// `Long` is the bullish (up) call, `Short` the bearish (down) call. The same
/// type labels open positions and completed trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Realized direction of the move from `from` to `to`.
    ///
    /// An unchanged price counts as `Short` (not up).
    pub fn of_move(from: f64, to: f64) -> Self {
        if to > from {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    pub fn is_long(self) -> bool {
        matches!(self, Direction::Long)
    }

    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}
