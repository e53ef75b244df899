//! Execution capability consumed by the position lifecycle.
//!
//! The engine treats order routing purely as an interface; broker protocol
//! and session bootstrapping live outside this crate. `PaperExecution`
//! fills orders at the supplied mark price for offline runs.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use pulsetick_core::{Symbol, UtcDateTime};
use pulsetick_signals::Direction;

use crate::position::ExitReason;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("order rejected: {reason}")]
    Rejected { reason: String },

    #[error("execution transport failure: {reason}")]
    Transport { reason: String },
}

impl ExecutionError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }
}

/// Entry order request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub symbol: Symbol,
    pub direction: Direction,
    pub notional: f64,
    pub quantity: f64,
    /// Latest observed price, used as the paper fill level.
    pub mark_price: f64,
}

/// Close order request for an open position.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseRequest {
    pub position_id: Uuid,
    pub symbol: Symbol,
    pub quantity: f64,
    pub mark_price: f64,
    pub reason: ExitReason,
}

/// Broker acknowledgement for a fill.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfirmation {
    pub order_id: Uuid,
    pub fill_price: f64,
    pub filled_at: UtcDateTime,
}

/// Order routing capability.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn open_position(&self, spec: &OrderSpec) -> Result<ExecutionConfirmation, ExecutionError>;

    async fn close_position(
        &self,
        request: &CloseRequest,
    ) -> Result<ExecutionConfirmation, ExecutionError>;
}

/// Fills at the mark price; no broker involved.
#[derive(Debug, Default)]
pub struct PaperExecution;

#[async_trait]
impl ExecutionClient for PaperExecution {
    async fn open_position(&self, spec: &OrderSpec) -> Result<ExecutionConfirmation, ExecutionError> {
        if spec.mark_price <= 0.0 {
            return Err(ExecutionError::rejected("mark price must be positive"));
        }
        if spec.quantity <= 0.0 {
            return Err(ExecutionError::rejected("quantity must be positive"));
        }

        Ok(ExecutionConfirmation {
            order_id: Uuid::new_v4(),
            fill_price: spec.mark_price,
            filled_at: UtcDateTime::now(),
        })
    }

    async fn close_position(
        &self,
        request: &CloseRequest,
    ) -> Result<ExecutionConfirmation, ExecutionError> {
        if request.mark_price <= 0.0 {
            return Err(ExecutionError::rejected("mark price must be positive"));
        }

        Ok(ExecutionConfirmation {
            order_id: Uuid::new_v4(),
            fill_price: request.mark_price,
            filled_at: UtcDateTime::now(),
        })
    }
}
