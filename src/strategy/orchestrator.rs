//! Strategy orchestration
//!
//! Routes inbound swap events to per-pool state and sequences the
//! pipeline: impact -> flow verdict -> signal -> sizing -> position.
//! The only component with mutable shared state; each pool's aggregate
//! is mutated under its own lock, so per-pool processing is serialized
//! while different pools proceed concurrently.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::market::{impact, SwapEvent};
use crate::position::{ExitReason, Position, PositionManager};
use crate::strategy::flow::{FlowClassifier, FlowWindow, WindowEntry};
use crate::strategy::signal::{ExpiryOutcome, Signal, SignalGenerator};
use crate::strategy::sizing::PositionSizer;
use crate::strategy::types::{Action, ClosePositionRequest, OpenPositionRequest};

/// Per-pool mutable aggregate. All of a pool's state lives here, never in
/// process-wide globals.
#[derive(Debug)]
struct PoolState {
    /// Latest post-swap reserves (A, B)
    reserves: (f64, f64),
    /// Latest post-swap price (B per A)
    last_price: f64,
    last_event_at: Option<DateTime<Utc>>,
    window: FlowWindow,
    /// At most one pending signal per pool
    pending_signal: Option<Signal>,
}

impl PoolState {
    fn new(horizon: chrono::Duration) -> Self {
        Self {
            reserves: (0.0, 0.0),
            last_price: 0.0,
            last_event_at: None,
            window: FlowWindow::new(horizon),
            pending_signal: None,
        }
    }
}

/// Routes events through the decision pipeline and emits open/close actions
pub struct StrategyOrchestrator {
    config: Config,
    pools: DashMap<String, Arc<Mutex<PoolState>>>,
    positions: Arc<PositionManager>,
    signals: SignalGenerator,
    sizer: PositionSizer,
    classifier: FlowClassifier,
    actions: mpsc::Sender<Action>,
}

impl StrategyOrchestrator {
    pub fn new(
        config: Config,
        positions: Arc<PositionManager>,
        actions: mpsc::Sender<Action>,
    ) -> Self {
        let signals = SignalGenerator::new(config.strategy.clone());
        let sizer = PositionSizer::new(config.sizing.clone());
        let classifier = FlowClassifier::new(config.flow.clone());

        Self {
            config,
            pools: DashMap::new(),
            positions,
            signals,
            sizer,
            classifier,
            actions,
        }
    }

    pub fn positions(&self) -> &Arc<PositionManager> {
        &self.positions
    }

    /// Process one inbound swap event.
    ///
    /// Returns an event-scoped error for malformed events; the caller logs
    /// and moves on. Events for one pool must arrive in source order;
    /// cross-pool interleaving is unconstrained.
    pub async fn process_event(&self, event: SwapEvent) -> Result<()> {
        // Reject before any state is touched: invalid events never reach
        // the classifier and never update reserves
        let measurement = impact::measure(&event)?;

        let cell = self
            .pools
            .entry(event.pool_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PoolState::new(self.classifier.horizon()))))
            .clone();
        let mut state = cell.lock().await;

        // Idempotence: per-pool timestamps are source-ordered, so anything
        // not newer than the last processed event is a replay
        if let Some(last) = state.last_event_at {
            if event.timestamp <= last {
                debug!(
                    "Dropping replayed event for {} at {}",
                    event.pool_id, event.timestamp
                );
                return Ok(());
            }
        }

        state.reserves = (event.reserve_a_after, event.reserve_b_after);
        state.last_price = measurement.price_after;
        state.last_event_at = Some(event.timestamp);

        // Exit evaluation runs before any new-entry work on this pool
        if let Some(closed) = self
            .positions
            .evaluate_exit(&event.pool_id, state.last_price, event.timestamp)
            .await
        {
            self.emit_close(closed).await;
        }

        self.convert_due_signal(&event.pool_id, &mut state, event.timestamp)
            .await;

        if measurement.magnitude_bp() >= self.config.strategy.min_impact_bp {
            // Classify against the window before the trigger joins it
            let verdict = self.classifier.classify(&state.window, &measurement);
            debug!(
                "Impact {:.1} bps on {} classified {}",
                measurement.impact_bp, event.pool_id, verdict
            );

            let busy = state.pending_signal.is_some()
                || self.positions.has_live(&event.pool_id).await;

            if let Some(signal) = self.signals.evaluate(&measurement, verdict, busy) {
                info!(
                    "Fade signal for {}: {} against {:.1} bps shock, entry at {}",
                    signal.pool_id, signal.direction, signal.trigger_impact_bp,
                    signal.entry_deadline
                );
                state.pending_signal = Some(signal);
            }
        }

        // The triggering impact joins the window regardless of verdict;
        // sub-threshold impacts are recorded too, they are the flow the
        // trend checks measure
        state.window.insert(WindowEntry::from(&measurement));

        Ok(())
    }

    /// Drive time-based work for pools with no fresh events: signal
    /// deadlines and timeout exits. Called on the poll interval.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let pool_ids: Vec<String> = self.pools.iter().map(|e| e.key().clone()).collect();

        for pool_id in pool_ids {
            let cell = match self.pools.get(&pool_id) {
                Some(entry) => entry.value().clone(),
                None => continue,
            };
            let mut state = cell.lock().await;

            if state.last_price <= 0.0 {
                continue;
            }

            if let Some(closed) = self
                .positions
                .evaluate_exit(&pool_id, state.last_price, now)
                .await
            {
                self.emit_close(closed).await;
            }

            self.convert_due_signal(&pool_id, &mut state, now).await;
        }
    }

    /// Entry-execution confirmation from the collaborator
    pub async fn confirm_entry(&self, pool_id: &str, now: DateTime<Utc>) -> Result<Position> {
        self.positions.confirm_entry(pool_id, now).await
    }

    /// Resolve the pool's pending signal if its deadline arrived: cancel
    /// as stale, or size and register a pending position.
    async fn convert_due_signal(
        &self,
        pool_id: &str,
        state: &mut PoolState,
        now: DateTime<Utc>,
    ) {
        let due = state
            .pending_signal
            .as_ref()
            .map(|s| s.is_due(now))
            .unwrap_or(false);
        if !due {
            return;
        }

        let signal = match state.pending_signal.take() {
            Some(signal) => signal,
            None => return,
        };

        match self.signals.resolve_expiry(&signal, state.last_price) {
            ExpiryOutcome::Stale => {
                info!(
                    "Signal for {} canceled as stale: price {:.6} reverted past {:.6}",
                    pool_id, state.last_price, signal.price_before
                );
            }
            ExpiryOutcome::Enter { entry_price } => {
                let depth = PositionSizer::depth_for(state.reserves, signal.direction);
                let size = match self.sizer.size(depth, signal.trigger_impact_bp.abs()) {
                    Ok(size) => size,
                    Err(e) => {
                        warn!("Signal for {} discarded: {}", pool_id, e);
                        return;
                    }
                };

                let position = Position::new(
                    pool_id.to_string(),
                    signal.direction,
                    entry_price,
                    size,
                    self.config.exits.stop_loss_bp,
                    self.config.exits.take_profit_bp,
                    now,
                );
                let request = OpenPositionRequest {
                    position_id: position.id,
                    pool_id: pool_id.to_string(),
                    direction: position.direction,
                    size,
                    entry_price,
                };

                if let Err(e) = self.positions.open(position).await {
                    warn!("Could not open position for {}: {}", pool_id, e);
                    return;
                }

                self.emit(Action::Open(request)).await;
            }
        }
    }

    async fn emit_close(&self, closed: Position) {
        let request = ClosePositionRequest {
            position_id: closed.id,
            pool_id: closed.pool_id.clone(),
            reason: closed.exit_reason.unwrap_or(ExitReason::Timeout),
            exit_price: closed.exit_price.unwrap_or(closed.current_price),
            pnl_bp: closed.pnl_bp(),
        };
        self.emit(Action::Close(request)).await;
    }

    async fn emit(&self, action: Action) {
        if self.actions.send(action).await.is_err() {
            error!("Action channel closed, dropping action");
        }
    }
}
