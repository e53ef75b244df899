//! # Pulsetick Trading
//!
//! The stateful half of the system: validated configuration, session risk
//! guards, the position lifecycle state machine, and the fixed-interval
//! polling engine that drives fetch -> indicators -> scoring -> lifecycle.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Validated trading configuration (YAML) |
//! | [`engine`] | Polling engine and rankings snapshot |
//! | [`execution`] | Execution capability and paper implementation |
//! | [`lifecycle`] | Slot state machine (Idle/Evaluating/Open/Closing) |
//! | [`position`] | Position bookkeeping and exit reasons |
//! | [`risk`] | Session P&L accounting and the loss-floor halt |
//!
//! ## Concurrency model
//!
//! One engine tick fans symbol fetches out over a bounded worker pool; the
//! cache layer is the only shared mutable resource and coalesces duplicate
//! requests. Indicator and score computation is pure and runs in parallel
//! per symbol. The lifecycle is sequential per slot and driven exactly once
//! per tick.

pub mod config;
pub mod engine;
pub mod execution;
pub mod lifecycle;
pub mod position;
pub mod risk;

pub use config::{ConfigError, TradingConfig};
pub use engine::{CycleReport, RankingsSnapshot, TradingEngine};
pub use execution::{
    CloseRequest, ExecutionClient, ExecutionConfirmation, ExecutionError, OrderSpec,
    PaperExecution,
};
pub use lifecycle::{
    CycleContext, EntryCandidate, LifecycleEvent, PositionLifecycle, RevertReason, Slot, SlotState,
};
pub use position::{ExitReason, Position};
pub use risk::RiskManager;
