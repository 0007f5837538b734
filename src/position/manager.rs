//! Position management
//!
//! Owns the lifecycle of fade positions: pending entry, open monitoring,
//! exit on stop-loss, take-profit, or timeout. At most one live position
//! per pool.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ExitConfig;
use crate::error::{Error, Result};
use crate::market::TradeDirection;

/// Lifecycle state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    /// Entry requested, awaiting execution confirmation
    Pending,
    /// Entered and monitored for exit conditions
    Open,
    /// Exited, archived
    Closed,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Timeout,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// A single fade position in a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub pool_id: String,
    pub direction: TradeDirection,
    /// Entry price in B per A
    pub entry_price: f64,
    /// Size in units of the token being bought
    pub size: f64,
    pub stop_loss_bp: f64,
    pub take_profit_bp: f64,
    pub state: PositionState,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub exit_price: Option<f64>,
    /// Latest observed price (updated by price updates)
    #[serde(skip)]
    pub current_price: f64,
}

impl Position {
    pub fn new(
        pool_id: String,
        direction: TradeDirection,
        entry_price: f64,
        size: f64,
        stop_loss_bp: f64,
        take_profit_bp: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool_id,
            direction,
            entry_price,
            size,
            stop_loss_bp,
            take_profit_bp,
            state: PositionState::Pending,
            created_at,
            opened_at: None,
            closed_at: None,
            exit_reason: None,
            exit_price: None,
            current_price: entry_price,
        }
    }

    /// Signed unrealized P&L in basis points at the latest observed price
    pub fn pnl_bp(&self) -> f64 {
        if self.current_price <= 0.0 {
            return 0.0;
        }
        self.direction.pnl_bp(self.entry_price, self.current_price)
    }

    /// Pending or Open
    pub fn is_live(&self) -> bool {
        self.state != PositionState::Closed
    }
}

/// Session trading statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub trades: u32,
    pub winners: u32,
    pub losers: u32,
    pub gross_gain_bp: f64,
    pub gross_loss_bp: f64,
    pub net_bp: f64,
}

impl SessionStats {
    pub fn record_close(&mut self, pnl_bp: f64) {
        self.trades += 1;
        if pnl_bp >= 0.0 {
            self.winners += 1;
            self.gross_gain_bp += pnl_bp;
        } else {
            self.losers += 1;
            self.gross_loss_bp += pnl_bp.abs();
        }
        self.net_bp = self.gross_gain_bp - self.gross_loss_bp;
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        (self.winners as f64 / self.trades as f64) * 100.0
    }
}

/// Position manager
///
/// Evaluation and closure run under one write lock, so a position closes
/// exactly once: whichever trigger acquires the lock first wins and the
/// other finds nothing left to close.
pub struct PositionManager {
    positions: Arc<RwLock<HashMap<String, Position>>>,
    archive: Arc<RwLock<Vec<Position>>>,
    stats: Arc<RwLock<SessionStats>>,
    exits: ExitConfig,
    persistence_path: Option<String>,
}

impl PositionManager {
    pub fn new(exits: ExitConfig, persistence_path: Option<String>) -> Self {
        Self {
            positions: Arc::new(RwLock::new(HashMap::new())),
            archive: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(RwLock::new(SessionStats::default())),
            exits,
            persistence_path,
        }
    }

    /// Load live positions from disk
    pub async fn load(&self) -> Result<()> {
        if let Some(path) = &self.persistence_path {
            if Path::new(path).exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::PositionPersistence(e.to_string()))?;

                let positions: HashMap<String, Position> = serde_json::from_str(&data)
                    .map_err(|e| Error::PositionPersistence(e.to_string()))?;

                let mut guard = self.positions.write().await;
                *guard = positions;

                info!("Loaded {} positions from {}", guard.len(), path);
            }
        }
        Ok(())
    }

    /// Save live positions to disk
    pub async fn save(&self) -> Result<()> {
        if let Some(path) = &self.persistence_path {
            let positions = self.positions.read().await;
            let data = serde_json::to_string_pretty(&*positions)
                .map_err(|e| Error::PositionPersistence(e.to_string()))?;

            tokio::fs::write(path, data)
                .await
                .map_err(|e| Error::PositionPersistence(e.to_string()))?;

            debug!("Saved {} positions to {}", positions.len(), path);
        }
        Ok(())
    }

    /// Register a new pending position
    pub async fn open(&self, position: Position) -> Result<()> {
        let pool_id = position.pool_id.clone();
        let mut positions = self.positions.write().await;

        if positions.get(&pool_id).map(|p| p.is_live()).unwrap_or(false) {
            return Err(Error::PositionAlreadyOpen(pool_id));
        }

        info!(
            "Position {} PENDING for {}: {} size {:.6} at {:.6}",
            position.id, pool_id, position.direction, position.size, position.entry_price
        );
        positions.insert(pool_id, position);
        drop(positions);

        self.save().await?;

        Ok(())
    }

    /// Confirm entry execution: PENDING -> OPEN
    pub async fn confirm_entry(&self, pool_id: &str, now: DateTime<Utc>) -> Result<Position> {
        let mut positions = self.positions.write().await;

        let position = positions
            .get_mut(pool_id)
            .ok_or_else(|| Error::PositionNotFound(pool_id.to_string()))?;

        if position.state != PositionState::Pending {
            return Err(Error::InvalidTransition {
                from: format!("{:?}", position.state),
                to: "Open".to_string(),
            });
        }

        position.state = PositionState::Open;
        position.opened_at = Some(now);

        info!(
            "Position {} PENDING -> OPEN for {} (entry confirmed)",
            position.id, pool_id
        );

        Ok(position.clone())
    }

    /// Update the latest observed price for a pool's position
    pub async fn update_price(&self, pool_id: &str, price: f64) {
        let mut positions = self.positions.write().await;
        if let Some(position) = positions.get_mut(pool_id) {
            position.current_price = price;
        }
    }

    /// Evaluate exit conditions for the pool's OPEN position at `price`.
    ///
    /// At most one trigger fires per evaluation; when a gap crosses both
    /// bands the stop-loss wins. Returns the closed position, or None when
    /// nothing is open or no condition triggered.
    pub async fn evaluate_exit(
        &self,
        pool_id: &str,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<Position> {
        let mut positions = self.positions.write().await;

        let position = positions.get_mut(pool_id)?;
        if position.state != PositionState::Open {
            return None;
        }

        position.current_price = price;
        let pnl_bp = position.direction.pnl_bp(position.entry_price, price);
        let held = now.signed_duration_since(position.opened_at.unwrap_or(position.created_at));

        let reason = if pnl_bp <= -position.stop_loss_bp {
            Some(ExitReason::StopLoss)
        } else if pnl_bp >= position.take_profit_bp {
            Some(ExitReason::TakeProfit)
        } else if held >= Duration::seconds(self.exits.max_hold_secs as i64) {
            // Exit at market regardless of P&L
            Some(ExitReason::Timeout)
        } else {
            None
        }?;

        let mut closed = positions.remove(pool_id)?;
        closed.state = PositionState::Closed;
        closed.closed_at = Some(now);
        closed.exit_reason = Some(reason);
        closed.exit_price = Some(price);
        drop(positions);

        info!(
            "Position {} OPEN -> CLOSED for {}: {} at {:.6} ({:+.1} bps)",
            closed.id, pool_id, reason, price, pnl_bp
        );

        self.stats.write().await.record_close(pnl_bp);
        self.archive.write().await.push(closed.clone());

        if let Err(e) = self.save().await {
            debug!("Position persistence after close failed: {}", e);
        }

        Some(closed)
    }

    /// Get the pool's live position, if any
    pub async fn get(&self, pool_id: &str) -> Option<Position> {
        let positions = self.positions.read().await;
        positions.get(pool_id).cloned()
    }

    /// Whether the pool has a PENDING or OPEN position
    pub async fn has_live(&self, pool_id: &str) -> bool {
        let positions = self.positions.read().await;
        positions.get(pool_id).map(|p| p.is_live()).unwrap_or(false)
    }

    /// Synchronous snapshot of all PENDING/OPEN positions, for graceful
    /// shutdown reporting. Independent of the event path.
    pub async fn snapshot(&self) -> Vec<Position> {
        let positions = self.positions.read().await;
        positions.values().cloned().collect()
    }

    /// All closed positions this session
    pub async fn archived(&self) -> Vec<Position> {
        self.archive.read().await.clone()
    }

    pub async fn stats(&self) -> SessionStats {
        self.stats.read().await.clone()
    }

    pub async fn position_count(&self) -> usize {
        self.positions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn exit_config() -> ExitConfig {
        ExitConfig {
            stop_loss_bp: 100.0,
            take_profit_bp: 50.0,
            max_hold_secs: 300,
            poll_interval_ms: 500,
        }
    }

    fn test_position() -> Position {
        Position::new(
            "pool-1".into(),
            TradeDirection::BuyA,
            0.9,
            50.0,
            100.0,
            50.0,
            t0(),
        )
    }

    async fn open_and_confirm(manager: &PositionManager) -> Position {
        manager.open(test_position()).await.unwrap();
        manager.confirm_entry("pool-1", t0()).await.unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_take_profit() {
        let manager = PositionManager::new(exit_config(), None);
        let position = open_and_confirm(&manager).await;
        assert_eq!(position.state, PositionState::Open);

        // +50 bps favorable for buy-A
        let closed = manager
            .evaluate_exit("pool-1", 0.9045, t0() + Duration::seconds(5))
            .await
            .unwrap();

        assert_eq!(closed.state, PositionState::Closed);
        assert_eq!(closed.exit_reason, Some(ExitReason::TakeProfit));
        assert_eq!(manager.position_count().await, 0);
        assert_eq!(manager.archived().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_loss_wins_when_gap_crosses_both() {
        let manager = PositionManager::new(exit_config(), None);
        open_and_confirm(&manager).await;

        // -200 bps adverse; only the stop-loss may fire
        let closed = manager
            .evaluate_exit("pool-1", 0.882, t0() + Duration::seconds(5))
            .await
            .unwrap();

        assert_eq!(closed.exit_reason, Some(ExitReason::StopLoss));
    }

    #[tokio::test]
    async fn test_no_trigger_inside_bands() {
        let manager = PositionManager::new(exit_config(), None);
        open_and_confirm(&manager).await;

        // +20 bps, inside both bands
        let closed = manager
            .evaluate_exit("pool-1", 0.9018, t0() + Duration::seconds(5))
            .await;

        assert!(closed.is_none());
        assert_eq!(manager.position_count().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_exit_regardless_of_pnl() {
        let manager = PositionManager::new(exit_config(), None);
        open_and_confirm(&manager).await;

        // Price barely moved, but the hold limit elapsed
        let closed = manager
            .evaluate_exit("pool-1", 0.9009, t0() + Duration::seconds(301))
            .await
            .unwrap();

        assert_eq!(closed.exit_reason, Some(ExitReason::Timeout));
    }

    #[tokio::test]
    async fn test_closes_exactly_once() {
        let manager = PositionManager::new(exit_config(), None);
        open_and_confirm(&manager).await;

        let first = manager
            .evaluate_exit("pool-1", 0.95, t0() + Duration::seconds(5))
            .await;
        let second = manager
            .evaluate_exit("pool-1", 0.95, t0() + Duration::seconds(5))
            .await;

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(manager.archived().await.len(), 1);
    }

    #[tokio::test]
    async fn test_single_live_position_per_pool() {
        let manager = PositionManager::new(exit_config(), None);
        manager.open(test_position()).await.unwrap();

        let err = manager.open(test_position()).await.unwrap_err();
        assert!(matches!(err, Error::PositionAlreadyOpen(_)));
    }

    #[tokio::test]
    async fn test_pending_positions_are_not_exit_evaluated() {
        let manager = PositionManager::new(exit_config(), None);
        manager.open(test_position()).await.unwrap();

        // Deep adverse move, but entry was never confirmed
        let closed = manager
            .evaluate_exit("pool-1", 0.5, t0() + Duration::seconds(5))
            .await;

        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_confirm_requires_pending() {
        let manager = PositionManager::new(exit_config(), None);
        open_and_confirm(&manager).await;

        let err = manager.confirm_entry("pool-1", t0()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_reports_live_positions() {
        let manager = PositionManager::new(exit_config(), None);
        manager.open(test_position()).await.unwrap();

        let mut other = test_position();
        other.pool_id = "pool-2".into();
        manager.open(other).await.unwrap();
        manager.confirm_entry("pool-2", t0()).await.unwrap();

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|p| p.is_live()));
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");
        let path_str = path.to_str().unwrap().to_string();

        let manager = PositionManager::new(exit_config(), Some(path_str.clone()));
        manager.open(test_position()).await.unwrap();

        let restored = PositionManager::new(exit_config(), Some(path_str));
        restored.load().await.unwrap();

        let position = restored.get("pool-1").await.unwrap();
        assert_eq!(position.state, PositionState::Pending);
        assert_eq!(position.direction, TradeDirection::BuyA);
        assert!((position.entry_price - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_session_stats() {
        let mut stats = SessionStats::default();

        stats.record_close(50.0);
        stats.record_close(-100.0);
        stats.record_close(50.0);

        assert_eq!(stats.trades, 3);
        assert_eq!(stats.winners, 2);
        assert_eq!(stats.losers, 1);
        assert_eq!(stats.net_bp, 0.0);
        assert!((stats.win_rate() - 66.67).abs() < 0.1);
    }
}
