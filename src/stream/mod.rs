//! Stream module - swap event ingestion
//!
//! Transport, reconnect, and backoff are collaborator concerns; the core
//! consumes events through the `SwapEventSource` seam.

pub mod replay;

pub use replay::ReplaySource;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::market::SwapEvent;

/// Ordered-per-pool source of swap events
#[async_trait]
pub trait SwapEventSource: Send {
    /// Next event, None once the feed is exhausted
    async fn next_event(&mut self) -> Result<Option<SwapEvent>>;
}

/// Channel-backed source: the seam a live transport collaborator feeds
pub struct ChannelSource {
    rx: mpsc::Receiver<SwapEvent>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<SwapEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl SwapEventSource for ChannelSource {
    async fn next_event(&mut self) -> Result<Option<SwapEvent>> {
        Ok(self.rx.recv().await)
    }
}
