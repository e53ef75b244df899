//! Session-level risk accounting and the loss-floor halt.

use tracing::warn;

use crate::config::TradingConfig;

/// Tracks realized P&L for the session and enforces the cumulative loss
/// floor. Once halted, entry admission stays blocked until an explicit
/// reset, no matter how well later candidates score.
#[derive(Debug)]
pub struct RiskManager {
    loss_floor: f64,
    session_pnl: f64,
    closed_trades: u32,
    halted: bool,
    /// Cumulative loss value that tripped the halt, for operator reporting.
    halt_trigger: Option<f64>,
}

impl RiskManager {
    pub fn new(loss_floor: f64) -> Self {
        Self {
            loss_floor,
            session_pnl: 0.0,
            closed_trades: 0,
            halted: false,
            halt_trigger: None,
        }
    }

    pub fn from_config(config: &TradingConfig) -> Self {
        Self::new(config.session_loss_floor)
    }

    /// Fold one closed trade into the session tally.
    pub fn record_realized(&mut self, pnl: f64) {
        self.session_pnl += pnl;
        self.closed_trades += 1;

        if !self.halted && self.session_pnl <= -self.loss_floor {
            self.halted = true;
            self.halt_trigger = Some(self.session_pnl);
            warn!(
                session_pnl = self.session_pnl,
                loss_floor = self.loss_floor,
                "session loss floor crossed, halting all entries"
            );
        }
    }

    pub const fn halted(&self) -> bool {
        self.halted
    }

    pub const fn halt_trigger(&self) -> Option<f64> {
        self.halt_trigger
    }

    pub const fn session_pnl(&self) -> f64 {
        self.session_pnl
    }

    pub const fn closed_trades(&self) -> u32 {
        self.closed_trades
    }

    /// Explicit operator reset: clears the tally and re-enables entries.
    pub fn reset_session(&mut self) {
        self.session_pnl = 0.0;
        self.closed_trades = 0;
        self.halted = false;
        self.halt_trigger = None;
    }

    /// Notional and quantity for a new position at `price`, bounded by the
    /// flat cap and the per-trade account fraction.
    pub fn size_position(&self, price: f64, config: &TradingConfig) -> Option<(f64, f64)> {
        if price <= 0.0 {
            return None;
        }

        let notional = config
            .max_notional
            .min(config.account_balance * config.risk_fraction);
        if notional <= 0.0 {
            return None;
        }

        Some((notional, notional / price))
    }
}
