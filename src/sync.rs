//! Sync orchestration
//!
//! Drives one sync pass for a metric: work out the query window, fetch the
//! materialized sample batch from the platform, consolidate it, encode the
//! payload, hand it to the backend, and update the bookkeeping. The
//! platform query and the backend live behind traits; both return fully
//! materialized results, so the whole pass is synchronous.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::consolidate::consolidate_if_needed;
use crate::error::MetricsError;
use crate::records::{MetricsPayload, RecordEncoder};
use crate::status::{KeyValueStore, ObserverStatus};
use crate::types::{MetricType, MobilePlatform, Sample};

/// Query window fallback when no last-saved date is known anywhere
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// Source of samples for a metric over a time window.
///
/// Implementations wrap the platform query (Google Fit history client,
/// HKSampleQuery) and resolve any callback or async machinery before
/// returning, so the engine always sees a complete batch.
pub trait SampleQuery {
    fn samples_between(
        &self,
        metric: MetricType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Sample>, MetricsError>;
}

/// The backend metrics endpoint, reduced to the two calls a sync needs
pub trait MetricsBackend {
    /// Push a consolidated batch
    fn send_metrics(&self, payload: &MetricsPayload) -> Result<(), MetricsError>;

    /// The end date of the newest record the backend already holds
    fn last_saved_end_date(
        &self,
        metric: MetricType,
    ) -> Result<Option<DateTime<Utc>>, MetricsError>;
}

/// Result of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A batch was sent; `records` retained samples after consolidation
    Sent { records: usize },
    /// The query window held nothing to send
    NothingToSend,
}

/// One-metric-at-a-time sync driver
pub struct SyncEngine<Q, B, S>
where
    Q: SampleQuery,
    B: MetricsBackend,
    S: KeyValueStore,
{
    query: Q,
    backend: B,
    status: ObserverStatus<S>,
    encoder: RecordEncoder,
}

impl<Q, B, S> SyncEngine<Q, B, S>
where
    Q: SampleQuery,
    B: MetricsBackend,
    S: KeyValueStore,
{
    pub fn new(query: Q, backend: B, store: S, platform: MobilePlatform) -> Self {
        Self {
            query,
            backend,
            status: ObserverStatus::new(store),
            encoder: RecordEncoder::new(platform),
        }
    }

    pub fn status(&self) -> &ObserverStatus<S> {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut ObserverStatus<S> {
        &mut self.status
    }

    /// Run one sync pass for a metric, `now` being the window end.
    ///
    /// The syncing flag is raised for the duration of the pass and lowered
    /// again on every exit path, error included.
    pub fn sync_metric(
        &mut self,
        metric: MetricType,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, MetricsError> {
        self.status.set_syncing(true);
        let result = self.run_pass(metric, now);
        self.status.set_syncing(false);
        result
    }

    fn run_pass(
        &mut self,
        metric: MetricType,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, MetricsError> {
        let start = self.resolve_start_date(metric, now);
        debug!(
            "syncing {} from {} to {}",
            metric.as_str(),
            start,
            now
        );

        let samples = self.query.samples_between(metric, start, now)?;
        let consolidated = consolidate_if_needed(samples);
        if consolidated.is_empty() {
            debug!("{}: nothing to send", metric.as_str());
            return Ok(SyncOutcome::NothingToSend);
        }

        let payload = self.encoder.payload(metric, &consolidated);
        match self.backend.send_metrics(&payload) {
            Ok(()) => {
                self.status.update_last_date_saved(metric, now);
                self.status.update_last_date_saved_observer_only(now);
                let current_day_total: f64 = consolidated
                    .iter()
                    .filter(|s| is_same_day(s.end_time, now))
                    .map(|s| s.value)
                    .sum();
                self.status.update_last_value_sent(metric, current_day_total);
                self.status.record_attempt(true, now);
                Ok(SyncOutcome::Sent {
                    records: payload.metrics.len(),
                })
            }
            Err(e) => {
                warn!("{}: send failed: {e}", metric.as_str());
                self.status.record_attempt(false, now);
                Err(e)
            }
        }
    }

    /// Query start: local last-saved date, else the backend's (cached
    /// locally on a hit), else `now` minus the default lookback. A backend
    /// lookup failure degrades to the lookback rather than aborting the
    /// pass.
    fn resolve_start_date(&mut self, metric: MetricType, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(local) = self.status.last_date_saved(metric) {
            return local;
        }
        match self.backend.last_saved_end_date(metric) {
            Ok(Some(server)) => {
                self.status.update_last_date_saved(metric, server);
                server
            }
            Ok(None) => now - Duration::hours(DEFAULT_LOOKBACK_HOURS),
            Err(e) => {
                warn!("{}: last-saved lookup failed: {e}", metric.as_str());
                now - Duration::hours(DEFAULT_LOOKBACK_HOURS)
            }
        }
    }
}

/// Same UTC calendar day
fn is_same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::MemoryStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    }

    fn sample(source: &str, offset_hours: i64, duration_hours: i64, value: f64) -> Sample {
        let start = now() - Duration::hours(12) + Duration::hours(offset_hours);
        Sample::new(source, start, start + Duration::hours(duration_hours), value).unwrap()
    }

    struct StubQuery {
        samples: Vec<Sample>,
        windows: Rc<RefCell<Vec<(DateTime<Utc>, DateTime<Utc>)>>>,
    }

    impl SampleQuery for StubQuery {
        fn samples_between(
            &self,
            _metric: MetricType,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Sample>, MetricsError> {
            self.windows.borrow_mut().push((start, end));
            Ok(self.samples.clone())
        }
    }

    struct StubBackend {
        sent: Rc<RefCell<Vec<MetricsPayload>>>,
        last_saved: Result<Option<DateTime<Utc>>, ()>,
        fail_send: bool,
    }

    impl MetricsBackend for StubBackend {
        fn send_metrics(&self, payload: &MetricsPayload) -> Result<(), MetricsError> {
            if self.fail_send {
                return Err(MetricsError::SendError("503".to_string()));
            }
            self.sent.borrow_mut().push(payload.clone());
            Ok(())
        }

        fn last_saved_end_date(
            &self,
            _metric: MetricType,
        ) -> Result<Option<DateTime<Utc>>, MetricsError> {
            self.last_saved
                .map_err(|_| MetricsError::SendError("lookup failed".to_string()))
        }
    }

    struct Harness {
        engine: SyncEngine<StubQuery, StubBackend, MemoryStore>,
        windows: Rc<RefCell<Vec<(DateTime<Utc>, DateTime<Utc>)>>>,
        sent: Rc<RefCell<Vec<MetricsPayload>>>,
    }

    fn harness(
        samples: Vec<Sample>,
        last_saved: Result<Option<DateTime<Utc>>, ()>,
        fail_send: bool,
    ) -> Harness {
        let windows = Rc::new(RefCell::new(Vec::new()));
        let sent = Rc::new(RefCell::new(Vec::new()));
        let engine = SyncEngine::new(
            StubQuery {
                samples,
                windows: Rc::clone(&windows),
            },
            StubBackend {
                sent: Rc::clone(&sent),
                last_saved,
                fail_send,
            },
            MemoryStore::new(),
            MobilePlatform::Android,
        );
        Harness {
            engine,
            windows,
            sent,
        }
    }

    #[test]
    fn test_sync_sends_consolidated_batch() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 1, 1, 25.0),
            sample("phone", 5, 1, 50.0),
            sample("watch", 2, 1, 50.0),
        ];
        let mut h = harness(samples, Ok(None), false);

        let outcome = h.engine.sync_metric(MetricType::Step, now()).unwrap();
        assert_eq!(outcome, SyncOutcome::Sent { records: 2 });

        let sent = h.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].metrics.len(), 2);
        assert_eq!(sent[0].metric_type, MetricType::Step);
        assert_eq!(sent[0].source, "OBSERVER");
    }

    #[test]
    fn test_success_updates_bookkeeping() {
        let samples = vec![sample("phone", 0, 3, 150.0), sample("watch", 8, 1, 40.0)];
        let mut h = harness(samples, Ok(None), false);

        h.engine.sync_metric(MetricType::Step, now()).unwrap();

        let status = h.engine.status();
        assert_eq!(status.last_date_saved(MetricType::Step), Some(now()));
        assert_eq!(status.last_date_saved_observer_only(), Some(now()));
        // Both samples end on the sync day
        assert_eq!(status.last_value_sent(MetricType::Step), Some(190.0));
        assert_eq!(status.last_attempt(), None);
        assert!(!status.is_syncing());
    }

    #[test]
    fn test_day_total_excludes_older_days() {
        let yesterday = Sample::new(
            "phone",
            now() - Duration::hours(40),
            now() - Duration::hours(30),
            999.0,
        )
        .unwrap();
        let samples = vec![yesterday, sample("phone", 0, 3, 150.0), sample("watch", 1, 1, 25.0)];
        let mut h = harness(samples, Ok(None), false);

        h.engine.sync_metric(MetricType::Step, now()).unwrap();
        // The 999 window ended the previous UTC day and is left out
        assert_eq!(
            h.engine.status().last_value_sent(MetricType::Step),
            Some(150.0)
        );
    }

    #[test]
    fn test_query_window_uses_local_last_saved() {
        let saved = now() - Duration::hours(2);
        let mut h = harness(vec![sample("phone", 0, 1, 10.0)], Ok(None), false);
        h.engine
            .status_mut()
            .update_last_date_saved(MetricType::Step, saved);

        h.engine.sync_metric(MetricType::Step, now()).unwrap();
        assert_eq!(h.windows.borrow()[0], (saved, now()));
    }

    #[test]
    fn test_query_window_falls_back_to_backend_and_caches() {
        let server = now() - Duration::hours(6);
        // Sends fail, so only the cached backend date can explain pass 2
        let mut h = harness(vec![sample("phone", 0, 1, 10.0)], Ok(Some(server)), true);

        let _ = h.engine.sync_metric(MetricType::Step, now());
        assert_eq!(h.windows.borrow()[0].0, server);
        assert_eq!(
            h.engine.status().last_date_saved(MetricType::Step),
            Some(server)
        );

        let _ = h.engine.sync_metric(MetricType::Step, now());
        assert_eq!(h.windows.borrow()[1].0, server);
    }

    #[test]
    fn test_query_window_default_lookback() {
        let mut h = harness(vec![sample("phone", 0, 1, 10.0)], Ok(None), false);
        h.engine.sync_metric(MetricType::Step, now()).unwrap();
        assert_eq!(
            h.windows.borrow()[0].0,
            now() - Duration::hours(DEFAULT_LOOKBACK_HOURS)
        );
    }

    #[test]
    fn test_backend_lookup_failure_degrades_to_lookback() {
        let mut h = harness(vec![sample("phone", 0, 1, 10.0)], Err(()), false);
        let outcome = h.engine.sync_metric(MetricType::Step, now()).unwrap();
        assert!(matches!(outcome, SyncOutcome::Sent { .. }));
        assert_eq!(
            h.windows.borrow()[0].0,
            now() - Duration::hours(DEFAULT_LOOKBACK_HOURS)
        );
    }

    #[test]
    fn test_empty_batch_sends_nothing() {
        let mut h = harness(Vec::new(), Ok(None), false);
        let outcome = h.engine.sync_metric(MetricType::Step, now()).unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToSend);
        assert!(h.sent.borrow().is_empty());
        assert_eq!(h.engine.status().last_date_saved(MetricType::Step), None);
        assert!(!h.engine.status().is_syncing());
    }

    #[test]
    fn test_send_failure_records_attempt_and_propagates() {
        let mut h = harness(vec![sample("phone", 0, 1, 10.0)], Ok(None), true);
        let result = h.engine.sync_metric(MetricType::Step, now());
        assert!(matches!(result, Err(MetricsError::SendError(_))));

        let status = h.engine.status();
        assert_eq!(status.last_attempt(), Some(now()));
        assert_eq!(status.last_date_saved(MetricType::Step), None);
        assert!(!status.is_syncing());
    }
}
