use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::errors::TrafficError;
use super::models::{CustomerMessage, HourBucket, HourKey, LiveSnapshot, StoreId, TrafficEvent};

// ============================================================================
// Aggregation Engine
// ============================================================================
//
// Owns the live per-store counters and the hourly rollups.
//
// - Every mutation goes through `ingest`/`apply`, which hold the write lock
//   for the whole update so the snapshot and its hour bucket change together.
// - Queries take the read lock and hand back copies.
// - The live counter trusts arrival order: `last_update` is overwritten with
//   whatever event came last, the delta is always accumulated.
//
// ============================================================================

/// Number of hours returned by `history`.
pub const HISTORY_WINDOW_HOURS: i64 = 24;

/// How long hour buckets are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Keep every bucket forever.
    #[default]
    Unbounded,
    /// Evict buckets more than this many hours older than "now".
    Hours(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub stores: usize,
    pub hour_buckets: usize,
}

#[derive(Default)]
struct EngineState {
    live: BTreeMap<StoreId, LiveSnapshot>,
    hourly: HashMap<StoreId, BTreeMap<HourKey, HourBucket>>,
}

pub struct AggregationEngine {
    state: RwLock<EngineState>,
    retention: Retention,
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(Retention::Unbounded)
    }
}

impl AggregationEngine {
    pub fn new(retention: Retention) -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
            retention,
        }
    }

    /// Parse and apply one customer message.
    ///
    /// Nothing is applied if the timestamp cannot be parsed or a count overflows.
    pub fn ingest(&self, message: &CustomerMessage) -> Result<LiveSnapshot, TrafficError> {
        let event = TrafficEvent::try_from(message)?;
        self.apply(event)
    }

    /// Apply an already parsed event and return the store's updated snapshot.
    ///
    /// The new counter and bucket are computed before either is stored, so an
    /// overflow in any of them leaves the store exactly as it was.
    pub fn apply(&self, event: TrafficEvent) -> Result<LiveSnapshot, TrafficError> {
        let store_id = event.store_id;
        let hour = HourKey::containing(event.timestamp);
        let overflow = |field| TrafficError::CountOverflow { store_id, field };

        let net_change = event.net_change().ok_or_else(|| overflow("net_change"))?;

        let mut state = self.state.write();

        let current_customers = state
            .live
            .get(&store_id)
            .map_or(0, |snapshot| snapshot.current_customers)
            .checked_add(net_change)
            .ok_or_else(|| overflow("current_customers"))?;

        let bucket = state
            .hourly
            .get(&store_id)
            .and_then(|buckets| buckets.get(&hour))
            .cloned()
            .unwrap_or_else(|| HourBucket::empty(hour))
            .recorded(event.customers_in, event.customers_out)
            .ok_or_else(|| overflow("hour_bucket"))?;

        let updated = LiveSnapshot {
            store_id,
            current_customers,
            last_update: event.timestamp,
        };
        state.live.insert(store_id, updated.clone());
        state.hourly.entry(store_id).or_default().insert(hour, bucket);

        tracing::trace!(
            store_id,
            hour = %hour,
            current_customers,
            "Applied traffic event"
        );

        Ok(updated)
    }

    pub fn live_snapshot(&self, store_id: StoreId) -> Result<LiveSnapshot, TrafficError> {
        self.state
            .read()
            .live
            .get(&store_id)
            .cloned()
            .ok_or(TrafficError::NotFound(store_id))
    }

    /// Snapshots of every store seen so far, ordered by store id.
    pub fn all_live_snapshots(&self) -> Vec<LiveSnapshot> {
        self.state.read().live.values().cloned().collect()
    }

    /// The 24 hour buckets ending with the hour containing `now`, oldest first.
    ///
    /// Hours without events are filled with zero buckets; nothing is stored.
    /// Fails if the window would start before the earliest representable hour.
    pub fn history(&self, store_id: StoreId, now: DateTime<Utc>) -> Result<Vec<HourBucket>, TrafficError> {
        let current = HourKey::containing(now);
        let hours = (0..HISTORY_WINDOW_HOURS)
            .rev()
            .map(|offset| current.hours_before(offset))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TrafficError::malformed(now.to_rfc3339(), "history window out of range"))?;

        let state = self.state.read();
        let buckets = state.hourly.get(&store_id);

        Ok(hours
            .into_iter()
            .map(|hour| {
                buckets
                    .and_then(|b| b.get(&hour))
                    .cloned()
                    .unwrap_or_else(|| HourBucket::empty(hour))
            })
            .collect())
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.read();
        EngineStats {
            stores: state.live.len(),
            hour_buckets: state.hourly.values().map(BTreeMap::len).sum(),
        }
    }

    /// Drop hour buckets older than the retention window. Returns the number evicted.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let Retention::Hours(hours) = self.retention else {
            return 0;
        };

        let Some(cutoff) = HourKey::containing(now).hours_before(i64::from(hours)) else {
            return 0;
        };
        let mut state = self.state.write();
        let mut evicted = 0;

        for buckets in state.hourly.values_mut() {
            let kept = buckets.split_off(&cutoff);
            evicted += buckets.len();
            *buckets = kept;
        }
        state.hourly.retain(|_, buckets| !buckets.is_empty());

        if evicted > 0 {
            tracing::debug!(evicted, cutoff = %cutoff, "Evicted expired hour buckets");
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn message(store_id: StoreId, customers_in: i64, customers_out: i64, ts: &str) -> CustomerMessage {
        CustomerMessage {
            store_id,
            customers_in,
            customers_out,
            time_stamp: ts.to_string(),
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_accumulates_regardless_of_order() {
        let events = [
            message(1, 5, 0, "2024-05-01T10:00:00Z"),
            message(1, 0, 2, "2024-05-01T08:00:00Z"),
            message(1, 3, 4, "2024-05-01T12:30:00Z"),
        ];

        let forward = AggregationEngine::default();
        for event in events.iter().cloned() {
            forward.ingest(&event).unwrap();
        }

        let backward = AggregationEngine::default();
        for event in events.iter().rev().cloned() {
            backward.ingest(&event).unwrap();
        }

        let f = forward.live_snapshot(1).unwrap();
        let b = backward.live_snapshot(1).unwrap();
        assert_eq!(f.current_customers, 2);
        assert_eq!(b.current_customers, 2);

        // last_update follows arrival order, not event time
        assert_eq!(f.last_update, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap());
        assert_eq!(b.last_update, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_snapshot_created_lazily() {
        let engine = AggregationEngine::default();
        assert!(matches!(engine.live_snapshot(3), Err(TrafficError::NotFound(3))));

        let returned = engine.ingest(&message(3, 1, 0, "2024-05-01T09:00:00Z")).unwrap();
        let stored = engine.live_snapshot(3).unwrap();
        assert_eq!(returned, stored);
        assert_eq!(stored.current_customers, 1);
    }

    #[test]
    fn test_negative_counts_are_accepted() {
        let engine = AggregationEngine::default();
        let snapshot = engine.ingest(&message(2, 0, 4, "2024-05-01T09:00:00Z")).unwrap();
        assert_eq!(snapshot.current_customers, -4);

        let snapshot = engine.ingest(&message(2, -1, 0, "2024-05-01T09:05:00Z")).unwrap();
        assert_eq!(snapshot.current_customers, -5);
    }

    #[test]
    fn test_same_hour_events_share_bucket() {
        let engine = AggregationEngine::default();
        engine.ingest(&message(5, 2, 1, "2024-05-01T14:05:00Z")).unwrap();
        engine.ingest(&message(5, 1, 0, "2024-05-01T14:55:00Z")).unwrap();

        let history = engine.history(5, at(14, 30)).unwrap();
        let bucket = history.last().unwrap();
        assert_eq!(bucket.hour.to_string(), "2024-05-01-14");
        assert_eq!(bucket.customers_in_total, 3);
        assert_eq!(bucket.customers_out_total, 1);
        assert_eq!(bucket.net_change, 2);
        assert_eq!(engine.stats().hour_buckets, 1);
    }

    #[test]
    fn test_history_is_24_hours_oldest_first() {
        let engine = AggregationEngine::default();
        engine.ingest(&message(1, 4, 1, "2024-05-01T03:10:00Z")).unwrap();
        engine.ingest(&message(1, 1, 1, "2024-05-01T15:10:00Z")).unwrap();

        let history = engine.history(1, at(15, 45)).unwrap();
        assert_eq!(history.len(), 24);
        assert_eq!(history[0].hour.to_string(), "2024-04-30-16");
        assert_eq!(history[23].hour.to_string(), "2024-05-01-15");
        assert!(history.windows(2).all(|w| w[0].hour < w[1].hour));

        assert_eq!(history[11].hour.to_string(), "2024-05-01-03");
        assert_eq!(history[11].net_change, 3);
        assert_eq!(history[23].customers_in_total, 1);

        let non_zero = history.iter().filter(|b| b.customers_in_total != 0).count();
        assert_eq!(non_zero, 2);
    }

    #[test]
    fn test_history_ignores_events_outside_window() {
        let engine = AggregationEngine::default();
        let now = at(12, 0);
        let old = (now - Duration::hours(30)).to_rfc3339();
        engine.ingest(&message(9, 7, 2, &old)).unwrap();

        let history = engine.history(9, now).unwrap();
        assert_eq!(history.len(), 24);
        assert!(history.iter().all(|b| *b == HourBucket::empty(b.hour)));
    }

    #[test]
    fn test_history_does_not_create_buckets() {
        let engine = AggregationEngine::default();
        let history = engine.history(42, at(8, 0)).unwrap();
        assert_eq!(history.len(), 24);
        assert_eq!(engine.stats(), EngineStats { stores: 0, hour_buckets: 0 });
        assert!(engine.all_live_snapshots().is_empty());
    }

    #[test]
    fn test_all_snapshots_read_is_idempotent() {
        let engine = AggregationEngine::default();
        engine.ingest(&message(2, 1, 0, "2024-05-01T09:00:00Z")).unwrap();
        engine.ingest(&message(1, 3, 1, "2024-05-01T09:01:00Z")).unwrap();

        let first = engine.all_live_snapshots();
        let second = engine.all_live_snapshots();
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|s| s.store_id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_malformed_timestamp_leaves_state_untouched() {
        let engine = AggregationEngine::default();
        engine.ingest(&message(1, 2, 0, "2024-05-01T09:00:00Z")).unwrap();
        let before = engine.live_snapshot(1).unwrap();
        let stats_before = engine.stats();

        let err = engine.ingest(&message(1, 1, 0, "not-a-date")).unwrap_err();
        assert!(matches!(err, TrafficError::MalformedInput { .. }));

        assert_eq!(engine.live_snapshot(1).unwrap(), before);
        assert_eq!(engine.stats(), stats_before);
    }

    #[test]
    fn test_returned_snapshot_is_a_copy() {
        let engine = AggregationEngine::default();
        let mut snapshot = engine.ingest(&message(1, 1, 0, "2024-05-01T09:00:00Z")).unwrap();
        snapshot.current_customers = 100;
        assert_eq!(engine.live_snapshot(1).unwrap().current_customers, 1);
    }

    #[test]
    fn test_unbounded_retention_never_evicts() {
        let engine = AggregationEngine::default();
        engine.ingest(&message(1, 1, 0, "2020-01-01T00:00:00Z")).unwrap();
        assert_eq!(engine.evict_expired(at(0, 0)), 0);
        assert_eq!(engine.stats().hour_buckets, 1);
    }

    #[test]
    fn test_bounded_retention_evicts_old_buckets_only() {
        let engine = AggregationEngine::new(Retention::Hours(48));
        engine.ingest(&message(1, 1, 0, "2024-04-28T10:00:00Z")).unwrap();
        engine.ingest(&message(1, 1, 0, "2024-04-29T12:00:00Z")).unwrap();
        engine.ingest(&message(1, 1, 0, "2024-05-01T11:00:00Z")).unwrap();
        engine.ingest(&message(2, 1, 0, "2024-04-20T10:00:00Z")).unwrap();

        let evicted = engine.evict_expired(at(12, 15));
        assert_eq!(evicted, 2);
        assert_eq!(engine.stats(), EngineStats { stores: 2, hour_buckets: 2 });

        // Live counters survive eviction
        assert_eq!(engine.live_snapshot(1).unwrap().current_customers, 3);
        assert_eq!(engine.live_snapshot(2).unwrap().current_customers, 1);
    }

    #[test]
    fn test_overflowing_net_change_is_rejected() {
        let engine = AggregationEngine::default();
        let err = engine
            .ingest(&message(1, i64::MAX, -1, "2024-05-01T10:00:00Z"))
            .unwrap_err();
        assert!(matches!(err, TrafficError::CountOverflow { store_id: 1, .. }));
        assert_eq!(err.reason(), "count_overflow");
        assert_eq!(engine.stats(), EngineStats { stores: 0, hour_buckets: 0 });
    }

    #[test]
    fn test_overflowing_bucket_leaves_store_untouched() {
        let engine = AggregationEngine::default();
        engine
            .ingest(&message(3, i64::MAX, i64::MAX, "2024-05-01T10:00:00Z"))
            .unwrap();
        let before = engine.live_snapshot(3).unwrap();
        let history_before = engine.history(3, at(10, 45)).unwrap();

        let err = engine.ingest(&message(3, 1, 0, "2024-05-01T10:30:00Z")).unwrap_err();
        assert!(matches!(err, TrafficError::CountOverflow { store_id: 3, .. }));

        assert_eq!(engine.live_snapshot(3).unwrap(), before);
        assert_eq!(before.current_customers, 0);
        assert_eq!(before.last_update, at(10, 0));
        assert_eq!(engine.history(3, at(10, 45)).unwrap(), history_before);
    }

    #[test]
    fn test_overflowing_live_counter_is_rejected() {
        let engine = AggregationEngine::default();
        engine.ingest(&message(4, i64::MAX, 0, "2024-05-01T09:00:00Z")).unwrap();

        let err = engine.ingest(&message(4, 1, 0, "2024-05-01T11:00:00Z")).unwrap_err();
        assert!(matches!(err, TrafficError::CountOverflow { .. }));
        assert_eq!(engine.live_snapshot(4).unwrap().current_customers, i64::MAX);
        assert_eq!(engine.stats().hour_buckets, 1);
    }

    #[test]
    fn test_history_at_calendar_edge_is_rejected() {
        let engine = AggregationEngine::default();
        let earliest = crate::traffic::parse_timestamp("-262143-01-01").unwrap();
        let err = engine.history(1, earliest).unwrap_err();
        assert!(matches!(err, TrafficError::MalformedInput { .. }));

        let retained = AggregationEngine::new(Retention::Hours(48));
        assert_eq!(retained.evict_expired(earliest), 0);
    }

    #[test]
    fn test_concurrent_applies_are_consistent() {
        const WRITERS: i64 = 8;
        const EVENTS: i64 = 500;

        let engine = AggregationEngine::default();
        let done = std::sync::atomic::AtomicBool::new(false);
        let now = at(10, 59);

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    for bucket in engine.history(1, now).unwrap() {
                        assert_eq!(
                            bucket.net_change,
                            bucket.customers_in_total - bucket.customers_out_total
                        );
                    }
                }
            });

            let writers: Vec<_> = (0..WRITERS)
                .map(|writer| {
                    let engine = &engine;
                    scope.spawn(move || {
                        for i in 0..EVENTS {
                            let minute = u32::try_from((writer * EVENTS + i) % 60).unwrap();
                            let ts = format!("2024-05-01T10:{:02}:00Z", minute);
                            engine.ingest(&message(1, 2, 1, &ts)).unwrap();
                        }
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }
            done.store(true, std::sync::atomic::Ordering::Release);
            reader.join().unwrap();
        });

        let total = WRITERS * EVENTS;
        assert_eq!(engine.live_snapshot(1).unwrap().current_customers, total);

        let bucket = engine.history(1, now).unwrap().pop().unwrap();
        assert_eq!(bucket.customers_in_total, 2 * total);
        assert_eq!(bucket.customers_out_total, total);
        assert_eq!(bucket.net_change, total);
    }
}
