//! Domain types for RegimeLab

pub mod bar;
pub mod direction;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use direction::Direction;
pub use position::Position;
pub use trade::{ExitReason, TradeRecord};

/// Symbol type alias
pub type Symbol = String;
