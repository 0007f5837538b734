//! Flow classification
//!
//! Decides whether a large impact is an isolated shock or part of a
//! directional run. Keeps a horizon-bounded window of recent impacts per
//! pool; memory is bounded by the horizon, not by history length.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

use crate::config::FlowConfig;
use crate::market::{ImpactMeasurement, SwapDirection};
use crate::strategy::types::FlowVerdict;

/// One recorded impact inside a pool's flow window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    pub timestamp: DateTime<Utc>,
    pub impact_bp: f64,
    pub direction: SwapDirection,
}

impl From<&ImpactMeasurement> for WindowEntry {
    fn from(impact: &ImpactMeasurement) -> Self {
        Self {
            timestamp: impact.timestamp,
            impact_bp: impact.impact_bp,
            direction: impact.direction,
        }
    }
}

/// Per-pool ordered sequence of recent impacts, bounded by a time horizon.
///
/// Invariants: entries strictly time-ordered, no two entries at the same
/// timestamp. Eviction happens on every insert. `last_insert_at` survives
/// eviction so a feed gap can be told apart from a brand-new pool.
#[derive(Debug, Clone)]
pub struct FlowWindow {
    entries: VecDeque<WindowEntry>,
    horizon: Duration,
    last_insert_at: Option<DateTime<Utc>>,
}

impl FlowWindow {
    pub fn new(horizon: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            horizon,
            last_insert_at: None,
        }
    }

    /// Insert an entry, keeping time order, then evict everything older
    /// than the horizon behind the newest entry.
    ///
    /// Returns false for a duplicate timestamp; the window is unchanged.
    pub fn insert(&mut self, entry: WindowEntry) -> bool {
        if self
            .entries
            .iter()
            .any(|e| e.timestamp == entry.timestamp)
        {
            return false;
        }

        let timestamp = entry.timestamp;
        let pos = self
            .entries
            .partition_point(|e| e.timestamp < timestamp);
        self.entries.insert(pos, entry);

        self.last_insert_at = Some(match self.last_insert_at {
            Some(prev) => prev.max(timestamp),
            None => timestamp,
        });

        self.evict();
        true
    }

    fn evict(&mut self) {
        let newest = match self.entries.back() {
            Some(entry) => entry.timestamp,
            None => return,
        };
        let cutoff = newest - self.horizon;
        while let Some(front) = self.entries.front() {
            if front.timestamp < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Entries within the horizon preceding `at`
    pub fn entries_before(&self, at: DateTime<Utc>) -> impl Iterator<Item = &WindowEntry> {
        let cutoff = at - self.horizon;
        self.entries
            .iter()
            .filter(move |e| e.timestamp > cutoff && e.timestamp < at)
    }

    /// Timestamp of the most recent insert, surviving eviction
    pub fn last_insert_at(&self) -> Option<DateTime<Utc>> {
        self.last_insert_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Labels a triggering impact as isolated or trending from its pool's window
#[derive(Debug, Clone)]
pub struct FlowClassifier {
    config: FlowConfig,
}

impl FlowClassifier {
    pub fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    pub fn horizon(&self) -> Duration {
        Duration::seconds(self.config.horizon_secs as i64)
    }

    /// Classify a triggering impact against the window contents.
    ///
    /// The trigger itself must not be in the window yet; the caller inserts
    /// it afterwards regardless of the verdict. Deterministic given window
    /// contents and thresholds.
    pub fn classify(&self, window: &FlowWindow, trigger: &ImpactMeasurement) -> FlowVerdict {
        // A window whose last insert predates the horizon is stale: the
        // feed gapped and continuity cannot be assumed. A pool with no
        // history at all is not stale, it is simply quiet.
        if let Some(last) = window.last_insert_at() {
            if trigger.timestamp - last > self.horizon() {
                return FlowVerdict::InsufficientData;
            }
        }

        let recent: Vec<&WindowEntry> = window.entries_before(trigger.timestamp).collect();

        if recent.len() < self.config.min_observations {
            return FlowVerdict::InsufficientData;
        }

        let same_direction: Vec<&&WindowEntry> = recent
            .iter()
            .filter(|e| e.direction == trigger.direction)
            .collect();

        let count = same_direction.len();
        let cumulative_bp: f64 = same_direction.iter().map(|e| e.impact_bp.abs()).sum();

        if count > self.config.trend_count_threshold
            || cumulative_bp > self.config.trend_magnitude_ratio * trigger.magnitude_bp()
        {
            FlowVerdict::Trending
        } else {
            FlowVerdict::Isolated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn entry(secs: i64, impact_bp: f64, direction: SwapDirection) -> WindowEntry {
        WindowEntry {
            timestamp: t(secs),
            impact_bp,
            direction,
        }
    }

    fn trigger(secs: i64, impact_bp: f64, direction: SwapDirection) -> ImpactMeasurement {
        ImpactMeasurement {
            pool_id: "pool-1".into(),
            impact_bp,
            direction,
            price_before: 1.0,
            price_after: 1.0 + impact_bp / 10_000.0,
            timestamp: t(secs),
        }
    }

    fn classifier() -> FlowClassifier {
        FlowClassifier::new(FlowConfig {
            horizon_secs: 30,
            trend_count_threshold: 1,
            trend_magnitude_ratio: 1.0,
            min_observations: 0,
        })
    }

    #[test]
    fn test_empty_window_is_isolated() {
        let window = FlowWindow::new(Duration::seconds(30));
        let verdict = classifier().classify(&window, &trigger(0, -1000.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::Isolated);
    }

    #[test]
    fn test_same_direction_count_marks_trending() {
        let mut window = FlowWindow::new(Duration::seconds(30));
        window.insert(entry(1, -80.0, SwapDirection::AtoB));
        window.insert(entry(5, -60.0, SwapDirection::AtoB));

        // Two prior same-direction impacts exceed a threshold of one
        let verdict = classifier().classify(&window, &trigger(10, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::Trending);
    }

    #[test]
    fn test_opposite_direction_flow_stays_isolated() {
        let mut window = FlowWindow::new(Duration::seconds(30));
        window.insert(entry(1, 80.0, SwapDirection::BtoA));
        window.insert(entry(5, 60.0, SwapDirection::BtoA));

        let verdict = classifier().classify(&window, &trigger(10, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::Isolated);
    }

    #[test]
    fn test_cumulative_magnitude_marks_trending() {
        let mut window = FlowWindow::new(Duration::seconds(30));
        // One prior event, below the count threshold, but its magnitude
        // alone exceeds the trigger's
        window.insert(entry(2, -600.0, SwapDirection::AtoB));

        let verdict = classifier().classify(&window, &trigger(10, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::Trending);
    }

    #[test]
    fn test_entries_outside_horizon_ignored() {
        let mut window = FlowWindow::new(Duration::seconds(30));
        window.insert(entry(0, -300.0, SwapDirection::AtoB));
        window.insert(entry(2, -300.0, SwapDirection::AtoB));
        // Keep the feed alive so the gap rule does not kick in
        window.insert(entry(25, 10.0, SwapDirection::BtoA));
        window.insert(entry(40, 10.0, SwapDirection::BtoA));

        // At t=40s the two AtoB entries are evicted and both trend checks
        // see no same-direction flow
        let verdict = classifier().classify(&window, &trigger(41, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::Isolated);
    }

    #[test]
    fn test_feed_gap_returns_insufficient_data() {
        let mut window = FlowWindow::new(Duration::seconds(30));
        window.insert(entry(0, -300.0, SwapDirection::AtoB));

        // Next trigger arrives well past the horizon: no continuity
        let verdict = classifier().classify(&window, &trigger(90, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::InsufficientData);

        // Refreshing the window restores normal classification
        window.insert(entry(90, -400.0, SwapDirection::AtoB));
        let verdict = classifier().classify(&window, &trigger(95, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::Isolated);
    }

    #[test]
    fn test_min_observations_returns_insufficient_data() {
        let clf = FlowClassifier::new(FlowConfig {
            horizon_secs: 30,
            trend_count_threshold: 1,
            trend_magnitude_ratio: 1.0,
            min_observations: 2,
        });

        let mut window = FlowWindow::new(Duration::seconds(30));
        window.insert(entry(1, -80.0, SwapDirection::AtoB));

        let verdict = clf.classify(&window, &trigger(5, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::InsufficientData);

        window.insert(entry(2, 60.0, SwapDirection::BtoA));
        let verdict = clf.classify(&window, &trigger(5, -400.0, SwapDirection::AtoB));
        assert_eq!(verdict, FlowVerdict::Isolated);
    }

    #[test]
    fn test_insert_order_does_not_change_verdict() {
        let entries = [
            entry(1, -80.0, SwapDirection::AtoB),
            entry(5, -60.0, SwapDirection::AtoB),
            entry(8, 40.0, SwapDirection::BtoA),
        ];

        let mut forward = FlowWindow::new(Duration::seconds(30));
        for e in entries.iter() {
            assert!(forward.insert(e.clone()));
        }

        let mut shuffled = FlowWindow::new(Duration::seconds(30));
        for e in [&entries[2], &entries[0], &entries[1]] {
            assert!(shuffled.insert((*e).clone()));
        }

        let clf = classifier();
        let trig = trigger(10, -400.0, SwapDirection::AtoB);
        assert_eq!(clf.classify(&forward, &trig), clf.classify(&shuffled, &trig));
    }

    #[test]
    fn test_duplicate_timestamp_rejected() {
        let mut window = FlowWindow::new(Duration::seconds(30));
        assert!(window.insert(entry(1, -80.0, SwapDirection::AtoB)));
        assert!(!window.insert(entry(1, -80.0, SwapDirection::AtoB)));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_eviction_bounds_memory() {
        let mut window = FlowWindow::new(Duration::seconds(30));
        for i in 0..100 {
            window.insert(entry(i * 10, -50.0, SwapDirection::AtoB));
        }
        // Only entries within 30s of the newest survive
        assert!(window.len() <= 4);
    }
}
