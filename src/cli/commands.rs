//! CLI command implementations

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::position::PositionManager;
use crate::strategy::{Action, StrategyOrchestrator};
use crate::stream::{ReplaySource, SwapEventSource};

/// Run the fade engine against a feed until it is exhausted or ctrl-c
pub async fn start(config: &Config, feed: Option<&str>, dry_run: bool) -> Result<()> {
    let persistence = if dry_run {
        None
    } else {
        config.position.persistence_path.clone()
    };

    let manager = Arc::new(PositionManager::new(config.exits.clone(), persistence));
    manager.load().await?;

    let (action_tx, mut action_rx) = mpsc::channel::<Action>(config.feed.channel_capacity);
    let orchestrator = Arc::new(StrategyOrchestrator::new(
        config.clone(),
        manager.clone(),
        action_tx,
    ));

    // Action consumer. Order placement is a collaborator concern; entries
    // are confirmed immediately here, standing in for the executor.
    let consumer = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while let Some(action) = action_rx.recv().await {
                match action {
                    Action::Open(req) => {
                        info!(
                            "OPEN {} {} size {:.6} at {:.6} ({})",
                            req.pool_id, req.direction, req.size, req.entry_price, req.position_id
                        );
                        if let Err(e) = orchestrator.confirm_entry(&req.pool_id, Utc::now()).await
                        {
                            warn!("Entry confirmation failed for {}: {}", req.pool_id, e);
                        }
                    }
                    Action::Close(req) => {
                        info!(
                            "CLOSE {} {} at {:.6} ({:+.1} bps)",
                            req.pool_id, req.reason, req.exit_price, req.pnl_bp
                        );
                    }
                }
            }
        })
    };

    let mut source: Box<dyn SwapEventSource> = match feed {
        Some(path) => {
            info!("Replaying events from {}", path);
            Box::new(ReplaySource::open(path).await?)
        }
        None => {
            info!("Reading events from stdin");
            Box::new(ReplaySource::stdin())
        }
    };

    let mut poll =
        tokio::time::interval(std::time::Duration::from_millis(config.exits.poll_interval_ms));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            _ = poll.tick() => {
                orchestrator.tick(Utc::now()).await;
            }
            event = source.next_event() => match event {
                Ok(Some(event)) => {
                    if let Err(e) = orchestrator.process_event(event).await {
                        if e.is_event_scoped() {
                            warn!("Event dropped: {}", e);
                        } else {
                            return Err(e.into());
                        }
                    }
                }
                Ok(None) => {
                    info!("Event feed exhausted");
                    break;
                }
                Err(e) if e.is_event_scoped() => warn!("Event dropped: {}", e),
                Err(e) => return Err(e.into()),
            }
        }
    }

    // Let due deadlines resolve, give the consumer a moment to drain
    orchestrator.tick(Utc::now()).await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    consumer.abort();

    report_shutdown(&manager).await;
    manager.save().await?;

    Ok(())
}

/// Graceful-shutdown report of all live positions and session stats
async fn report_shutdown(manager: &PositionManager) {
    let live = manager.snapshot().await;
    if live.is_empty() {
        info!("No live positions at shutdown");
    } else {
        info!("{} live position(s) at shutdown:", live.len());
        for p in &live {
            info!(
                "  {} {} {} size {:.6} entry {:.6} ({:?})",
                p.id, p.pool_id, p.direction, p.size, p.entry_price, p.state
            );
        }
    }

    let stats = manager.stats().await;
    info!(
        "Session: {} trades, {:.0}% win rate, net {:+.1} bps",
        stats.trades,
        stats.win_rate(),
        stats.net_bp
    );
}

/// Show persisted positions
pub async fn status(config: &Config) -> Result<()> {
    let manager = PositionManager::new(
        config.exits.clone(),
        config.position.persistence_path.clone(),
    );
    manager.load().await?;

    let positions = manager.snapshot().await;
    if positions.is_empty() {
        println!("No live positions");
        return Ok(());
    }

    for p in positions {
        println!(
            "{} {} {} size {:.6} entry {:.6} state {:?}",
            p.id, p.pool_id, p.direction, p.size, p.entry_price, p.state
        );
    }

    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.summary());
    Ok(())
}
