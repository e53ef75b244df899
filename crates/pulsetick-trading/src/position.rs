//! Open position bookkeeping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pulsetick_core::{Symbol, UtcDateTime};
use pulsetick_signals::Direction;

/// Why an open position is being closed, in evaluation priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    MaxHold,
    TechnicalReversal,
    SessionHalt,
}

impl ExitReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::TakeProfit => "take_profit",
            Self::MaxHold => "max_hold",
            Self::TechnicalReversal => "technical_reversal",
            Self::SessionHalt => "session_halt",
        }
    }
}

/// A live position held by one lifecycle slot.
///
/// Stop-loss and take-profit are computed once at entry; no mutator exists,
/// so they can never be widened afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: Symbol,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: UtcDateTime,
    pub notional: f64,
    pub quantity: f64,
    stop_loss: f64,
    take_profit: f64,
}

impl Position {
    pub fn open(
        symbol: Symbol,
        direction: Direction,
        entry_price: f64,
        entry_time: UtcDateTime,
        notional: f64,
        quantity: f64,
        stop_loss_pct: f64,
        take_profit_pct: f64,
    ) -> Self {
        let (stop_loss, take_profit) = match direction {
            Direction::Bearish => (
                entry_price * (1.0 + stop_loss_pct / 100.0),
                entry_price * (1.0 - take_profit_pct / 100.0),
            ),
            // Neutral never reaches entry; treated as long for safety.
            _ => (
                entry_price * (1.0 - stop_loss_pct / 100.0),
                entry_price * (1.0 + take_profit_pct / 100.0),
            ),
        };

        Self {
            id: Uuid::new_v4(),
            symbol,
            direction,
            entry_price,
            entry_time,
            notional,
            quantity,
            stop_loss,
            take_profit,
        }
    }

    pub const fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    pub const fn take_profit(&self) -> f64 {
        self.take_profit
    }

    pub fn stop_breached(&self, price: f64) -> bool {
        match self.direction {
            Direction::Bearish => price >= self.stop_loss,
            _ => price <= self.stop_loss,
        }
    }

    pub fn target_reached(&self, price: f64) -> bool {
        match self.direction {
            Direction::Bearish => price <= self.take_profit,
            _ => price >= self.take_profit,
        }
    }

    /// Signed P&L in account currency at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        let per_unit = match self.direction {
            Direction::Bearish => self.entry_price - price,
            _ => price - self.entry_price,
        };
        per_unit * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position() -> Position {
        Position::open(
            Symbol::parse("NVDA").expect("symbol"),
            Direction::Bullish,
            100.0,
            UtcDateTime::parse("2024-06-03T14:30:00Z").expect("timestamp"),
            500.0,
            5.0,
            3.0,
            5.0,
        )
    }

    #[test]
    fn long_brackets_sit_below_and_above_entry() {
        let position = long_position();
        assert!((position.stop_loss() - 97.0).abs() < 1e-9);
        assert!((position.take_profit() - 105.0).abs() < 1e-9);
    }

    #[test]
    fn short_brackets_are_mirrored() {
        let position = Position::open(
            Symbol::parse("NVDA").expect("symbol"),
            Direction::Bearish,
            100.0,
            UtcDateTime::parse("2024-06-03T14:30:00Z").expect("timestamp"),
            500.0,
            5.0,
            3.0,
            5.0,
        );
        assert!((position.stop_loss() - 103.0).abs() < 1e-9);
        assert!((position.take_profit() - 95.0).abs() < 1e-9);
        assert!(position.stop_breached(103.5));
        assert!(position.target_reached(94.0));
    }

    #[test]
    fn pnl_is_signed_by_direction() {
        let position = long_position();
        assert!((position.unrealized_pnl(102.0) - 10.0).abs() < 1e-9);
        assert!((position.unrealized_pnl(98.0) + 10.0).abs() < 1e-9);
    }

    #[test]
    fn stop_and_target_trigger_for_longs() {
        let position = long_position();
        assert!(position.stop_breached(96.9));
        assert!(!position.stop_breached(97.1));
        assert!(position.target_reached(105.0));
        assert!(!position.target_reached(104.9));
    }
}
