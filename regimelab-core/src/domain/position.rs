use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::direction::Direction;

/// The single open position held during a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub quantity: f64,
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_confidence: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side.is_long()
    }

    /// True when `price` has reached the protective stop.
    pub fn stop_hit(&self, price: f64) -> bool {
        match self.side {
            Direction::Long => price <= self.stop_loss,
            Direction::Short => price >= self.stop_loss,
        }
    }

    /// True when `price` has reached the profit target.
    pub fn target_hit(&self, price: f64) -> bool {
        match self.side {
            Direction::Long => price >= self.take_profit,
            Direction::Short => price <= self.take_profit,
        }
    }
}
