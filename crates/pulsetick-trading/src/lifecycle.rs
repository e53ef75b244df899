//! Position lifecycle state machine.
//!
//! Each slot walks `Idle -> Evaluating -> Open -> Closing -> Idle`. Entry
//! admission filters the ranked score records; evaluation debounces
//! direction across consecutive cycles before committing capital; open
//! positions are re-checked every cycle against the exit conditions in
//! fixed priority order; closing retries the execution collaborator a
//! bounded number of times and then escalates instead of silently
//! abandoning the position. A session-level loss floor forces every slot
//! away from new entries until an explicit reset.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{error, info, warn};

use pulsetick_core::{Quote, Symbol, UtcDateTime};
use pulsetick_signals::{Direction, IndicatorVector, ScoreRecord};

use crate::config::TradingConfig;
use crate::execution::{CloseRequest, ExecutionClient, OrderSpec};
use crate::position::{ExitReason, Position};
use crate::risk::RiskManager;

/// A qualifying record held while direction consistency is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCandidate {
    pub symbol: Symbol,
    pub direction: Direction,
    pub score: f64,
}

/// One slot's current state.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Idle,
    Evaluating {
        candidate: EntryCandidate,
        /// Cycles (including the admitting one) with a matching direction.
        matched_cycles: u32,
        cycles_in_state: u32,
    },
    Open {
        position: Position,
    },
    Closing {
        position: Position,
        reason: ExitReason,
        attempts: u32,
        /// Set once the retry budget is spent; requires operator
        /// acknowledgement before the slot can be reused.
        escalated: bool,
    },
}

impl SlotState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Evaluating { .. } => "evaluating",
            Self::Open { .. } => "open",
            Self::Closing { .. } => "closing",
        }
    }
}

/// A concurrency unit holding at most one position.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: usize,
    pub state: SlotState,
}

/// Why an evaluation was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertReason {
    DirectionFlipped,
    Disqualified,
    TimedOut,
    OpenFailed,
    Halted,
    NoPrice,
}

/// Observable lifecycle transitions for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    EvaluationStarted {
        slot: usize,
        symbol: Symbol,
        direction: Direction,
        score: f64,
    },
    EvaluationReverted {
        slot: usize,
        symbol: Symbol,
        reason: RevertReason,
    },
    PositionOpened {
        slot: usize,
        position: Position,
    },
    ExitTriggered {
        slot: usize,
        symbol: Symbol,
        reason: ExitReason,
    },
    PositionClosed {
        slot: usize,
        symbol: Symbol,
        reason: ExitReason,
        realized_pnl: f64,
    },
    CloseEscalated {
        slot: usize,
        symbol: Symbol,
        attempts: u32,
    },
    SessionHalted {
        session_pnl: f64,
    },
}

/// Everything a cycle needs to drive the slots.
pub struct CycleContext<'a> {
    /// Ranked records, best first.
    pub rankings: &'a [ScoreRecord],
    pub quotes: &'a HashMap<Symbol, Quote>,
    pub vectors: &'a HashMap<Symbol, IndicatorVector>,
    pub now: UtcDateTime,
}

/// The state machine over all slots.
pub struct PositionLifecycle {
    config: TradingConfig,
    executor: Arc<dyn ExecutionClient>,
    risk: RiskManager,
    slots: Vec<Slot>,
}

impl PositionLifecycle {
    pub fn new(config: TradingConfig, executor: Arc<dyn ExecutionClient>) -> Self {
        let risk = RiskManager::from_config(&config);
        let slots = (0..config.max_positions)
            .map(|id| Slot {
                id,
                state: SlotState::Idle,
            })
            .collect();
        Self {
            config,
            executor,
            risk,
            slots,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub const fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn open_positions(&self) -> Vec<&Position> {
        self.slots
            .iter()
            .filter_map(|slot| match &slot.state {
                SlotState::Open { position } => Some(position),
                SlotState::Closing { position, .. } => Some(position),
                _ => None,
            })
            .collect()
    }

    /// Symbols currently needing a fresh quote each cycle.
    pub fn active_symbols(&self) -> Vec<Symbol> {
        self.open_positions()
            .into_iter()
            .map(|p| p.symbol.clone())
            .collect()
    }

    /// Explicit operator reset of the session loss halt.
    pub fn reset_session(&mut self) {
        self.risk.reset_session();
    }

    /// Operator acknowledgement of an escalated close failure. Frees the
    /// slot and returns the abandoned position for manual reconciliation.
    pub fn acknowledge_escalation(&mut self, slot_id: usize) -> Option<Position> {
        let slot = self.slots.get_mut(slot_id)?;
        if let SlotState::Closing {
            position,
            escalated: true,
            ..
        } = &slot.state
        {
            let position = position.clone();
            slot.state = SlotState::Idle;
            return Some(position);
        }
        None
    }

    /// Drive every slot through one cycle.
    pub async fn on_cycle(&mut self, ctx: &CycleContext<'_>) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        let was_halted = self.risk.halted();

        // Symbols already owned by a non-idle slot; an instrument is never
        // held twice across slots.
        let mut busy: HashSet<Symbol> = self
            .slots
            .iter()
            .filter_map(|slot| match &slot.state {
                SlotState::Idle => None,
                SlotState::Evaluating { candidate, .. } => Some(candidate.symbol.clone()),
                SlotState::Open { position } | SlotState::Closing { position, .. } => {
                    Some(position.symbol.clone())
                }
            })
            .collect();

        for index in 0..self.slots.len() {
            let slot_id = self.slots[index].id;
            let state = std::mem::replace(&mut self.slots[index].state, SlotState::Idle);

            let mut next = match state {
                SlotState::Idle => self.step_idle(slot_id, ctx, &mut busy, &mut events),
                SlotState::Evaluating {
                    candidate,
                    matched_cycles,
                    cycles_in_state,
                } => {
                    self.step_evaluating(
                        slot_id,
                        candidate,
                        matched_cycles,
                        cycles_in_state,
                        ctx,
                        &mut busy,
                        &mut events,
                    )
                    .await
                }
                SlotState::Open { position } => {
                    self.step_open(slot_id, position, ctx, &mut events)
                }
                closing @ SlotState::Closing { .. } => closing,
            };

            if let SlotState::Closing {
                escalated: false, ..
            } = &next
            {
                next = self.attempt_close(slot_id, next, ctx, &mut events).await;
            }

            self.slots[index].state = next;
        }

        if !was_halted && self.risk.halted() {
            events.push(LifecycleEvent::SessionHalted {
                session_pnl: self.risk.session_pnl(),
            });
        }

        events
    }

    fn step_idle(
        &mut self,
        slot_id: usize,
        ctx: &CycleContext<'_>,
        busy: &mut HashSet<Symbol>,
        events: &mut Vec<LifecycleEvent>,
    ) -> SlotState {
        if self.risk.halted() {
            return SlotState::Idle;
        }

        let Some(record) = ctx.rankings.iter().find(|record| {
            self.qualifies(record) && !busy.contains(&record.symbol)
        }) else {
            return SlotState::Idle;
        };

        busy.insert(record.symbol.clone());
        info!(
            slot = slot_id,
            symbol = %record.symbol,
            score = record.overall_score,
            direction = record.direction.as_str(),
            "candidate admitted for evaluation"
        );
        events.push(LifecycleEvent::EvaluationStarted {
            slot: slot_id,
            symbol: record.symbol.clone(),
            direction: record.direction,
            score: record.overall_score,
        });

        SlotState::Evaluating {
            candidate: EntryCandidate {
                symbol: record.symbol.clone(),
                direction: record.direction,
                score: record.overall_score,
            },
            matched_cycles: 1,
            cycles_in_state: 1,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn step_evaluating(
        &mut self,
        slot_id: usize,
        candidate: EntryCandidate,
        matched_cycles: u32,
        cycles_in_state: u32,
        ctx: &CycleContext<'_>,
        busy: &mut HashSet<Symbol>,
        events: &mut Vec<LifecycleEvent>,
    ) -> SlotState {
        if self.risk.halted() {
            return reverted(slot_id, &candidate, RevertReason::Halted, busy, events);
        }

        let cycles_in_state = cycles_in_state + 1;
        let current = ctx
            .rankings
            .iter()
            .find(|record| record.symbol == candidate.symbol);

        let Some(record) = current else {
            return reverted(slot_id, &candidate, RevertReason::Disqualified, busy, events);
        };
        if !self.qualifies(record) {
            return reverted(slot_id, &candidate, RevertReason::Disqualified, busy, events);
        }
        if record.direction != candidate.direction {
            return reverted(
                slot_id,
                &candidate,
                RevertReason::DirectionFlipped,
                busy,
                events,
            );
        }

        let matched_cycles = matched_cycles + 1;
        if matched_cycles < self.config.confirmation_cycles {
            if cycles_in_state >= self.config.max_evaluation_cycles {
                return reverted(slot_id, &candidate, RevertReason::TimedOut, busy, events);
            }
            return SlotState::Evaluating {
                candidate,
                matched_cycles,
                cycles_in_state,
            };
        }

        // Direction confirmed: size and commit.
        let Some(price) = current_price(&candidate.symbol, ctx) else {
            return reverted(slot_id, &candidate, RevertReason::NoPrice, busy, events);
        };
        let Some((notional, quantity)) = self.risk.size_position(price, &self.config) else {
            return reverted(slot_id, &candidate, RevertReason::NoPrice, busy, events);
        };

        let spec = OrderSpec {
            symbol: candidate.symbol.clone(),
            direction: candidate.direction,
            notional,
            quantity,
            mark_price: price,
        };

        match self.executor.open_position(&spec).await {
            Ok(confirmation) => {
                let position = Position::open(
                    candidate.symbol.clone(),
                    candidate.direction,
                    confirmation.fill_price,
                    ctx.now,
                    notional,
                    quantity,
                    self.config.stop_loss_pct,
                    self.config.take_profit_pct,
                );
                info!(
                    slot = slot_id,
                    symbol = %position.symbol,
                    entry = position.entry_price,
                    stop = position.stop_loss(),
                    target = position.take_profit(),
                    "position opened"
                );
                events.push(LifecycleEvent::PositionOpened {
                    slot: slot_id,
                    position: position.clone(),
                });
                SlotState::Open { position }
            }
            Err(err) => {
                warn!(
                    slot = slot_id,
                    symbol = %candidate.symbol,
                    error = %err,
                    "entry order failed, reverting evaluation"
                );
                reverted(slot_id, &candidate, RevertReason::OpenFailed, busy, events)
            }
        }
    }

    fn step_open(
        &mut self,
        slot_id: usize,
        position: Position,
        ctx: &CycleContext<'_>,
        events: &mut Vec<LifecycleEvent>,
    ) -> SlotState {
        let Some(price) = current_price(&position.symbol, ctx) else {
            // No usable price this cycle; hold and re-check next tick.
            return SlotState::Open { position };
        };

        let reason = if position.stop_breached(price) {
            Some(ExitReason::StopLoss)
        } else if position.target_reached(price) {
            Some(ExitReason::TakeProfit)
        } else if ctx.now.since(position.entry_time) >= self.config.max_hold() {
            Some(ExitReason::MaxHold)
        } else if reversal_against(&position, ctx.vectors.get(&position.symbol)) {
            Some(ExitReason::TechnicalReversal)
        } else if self.risk.halted() {
            Some(ExitReason::SessionHalt)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                info!(
                    slot = slot_id,
                    symbol = %position.symbol,
                    reason = reason.as_str(),
                    price,
                    "exit condition met"
                );
                events.push(LifecycleEvent::ExitTriggered {
                    slot: slot_id,
                    symbol: position.symbol.clone(),
                    reason,
                });
                SlotState::Closing {
                    position,
                    reason,
                    attempts: 0,
                    escalated: false,
                }
            }
            None => SlotState::Open { position },
        }
    }

    async fn attempt_close(
        &mut self,
        slot_id: usize,
        state: SlotState,
        ctx: &CycleContext<'_>,
        events: &mut Vec<LifecycleEvent>,
    ) -> SlotState {
        let (position, reason, attempts) = match state {
            SlotState::Closing {
                position,
                reason,
                attempts,
                ..
            } => (position, reason, attempts),
            other => return other,
        };

        let mark_price = current_price(&position.symbol, ctx).unwrap_or(position.entry_price);
        let request = CloseRequest {
            position_id: position.id,
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            mark_price,
            reason,
        };

        match self.executor.close_position(&request).await {
            Ok(confirmation) => {
                let realized = position.unrealized_pnl(confirmation.fill_price);
                self.risk.record_realized(realized);
                info!(
                    slot = slot_id,
                    symbol = %position.symbol,
                    reason = reason.as_str(),
                    realized_pnl = realized,
                    session_pnl = self.risk.session_pnl(),
                    "position closed"
                );
                events.push(LifecycleEvent::PositionClosed {
                    slot: slot_id,
                    symbol: position.symbol.clone(),
                    reason,
                    realized_pnl: realized,
                });
                SlotState::Idle
            }
            Err(err) => {
                let attempts = attempts + 1;
                if attempts >= self.config.close_retry_limit {
                    error!(
                        slot = slot_id,
                        symbol = %position.symbol,
                        attempts,
                        error = %err,
                        "close failed repeatedly; escalating for operator attention"
                    );
                    events.push(LifecycleEvent::CloseEscalated {
                        slot: slot_id,
                        symbol: position.symbol.clone(),
                        attempts,
                    });
                    SlotState::Closing {
                        position,
                        reason,
                        attempts,
                        escalated: true,
                    }
                } else {
                    warn!(
                        slot = slot_id,
                        symbol = %position.symbol,
                        attempts,
                        error = %err,
                        "close attempt failed, will retry"
                    );
                    SlotState::Closing {
                        position,
                        reason,
                        attempts,
                        escalated: false,
                    }
                }
            }
        }
    }

    fn qualifies(&self, record: &ScoreRecord) -> bool {
        record.overall_score >= self.config.entry_threshold
            && record.aligned_signals >= self.config.min_aligned_signals
            && record.direction != Direction::Neutral
            && !record.degraded
    }
}

fn reverted(
    slot_id: usize,
    candidate: &EntryCandidate,
    reason: RevertReason,
    busy: &mut HashSet<Symbol>,
    events: &mut Vec<LifecycleEvent>,
) -> SlotState {
    busy.remove(&candidate.symbol);
    events.push(LifecycleEvent::EvaluationReverted {
        slot: slot_id,
        symbol: candidate.symbol.clone(),
        reason,
    });
    SlotState::Idle
}

fn current_price(symbol: &Symbol, ctx: &CycleContext<'_>) -> Option<f64> {
    if let Some(quote) = ctx.quotes.get(symbol) {
        return Some(quote.price);
    }
    ctx.vectors.get(symbol).and_then(|v| v.last_close.value())
}

/// Trend-convergence histogram flipped against the position with the
/// oscillator leaving its favorable zone.
fn reversal_against(position: &Position, vector: Option<&IndicatorVector>) -> bool {
    let Some(vector) = vector else {
        return false;
    };
    let (Some(histogram), Some(rsi)) = (vector.macd_histogram.value(), vector.rsi.value()) else {
        return false;
    };

    match position.direction {
        Direction::Bearish => histogram > 0.0 && rsi <= 30.0,
        _ => histogram < 0.0 && rsi >= 70.0,
    }
}
