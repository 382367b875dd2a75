//! Observer sync bookkeeping
//!
//! The scalar state that survives between syncs: last-saved date per metric,
//! last value sent, syncing/created flags, and the timestamp of the last
//! failed send attempt. All of it lives behind an injected key-value store
//! so hosts can back it with SharedPreferences, UserDefaults, or a file,
//! while tests use the in-memory implementation.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::records::{format_measurement_date, parse_measurement_date};
use crate::types::MetricType;

/// Keys used in the host key-value store
pub const OBSERVER_CREATED_KEY: &str = "observer_created";
pub const OBSERVER_SYNCING_KEY: &str = "observer_syncing";
pub const LAST_ATTEMPT_TO_SEND_KEY: &str = "last_attempt_to_send";
pub const OBSERVER_ONLY_LAST_DATE_SAVED_KEY: &str = "last_date_saved_observer";
pub const LAST_STEP_COUNT_SENT_KEY: &str = "last_step_count_sent";
pub const LAST_DATE_SAVED_KEY: &str = "last_date_saved";
pub const LAST_SLEEP_VALUE_SENT_KEY: &str = "last_sleep_value_sent";
pub const LAST_SLEEP_DATE_SAVED_KEY: &str = "last_sleep_date_saved";

/// Minimal string key-value storage contract the host provides
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory store for tests and embedders without platform storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Typed access to observer state over a host store
pub struct ObserverStatus<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ObserverStatus<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Last instant successfully synced for a metric, across all sources.
    /// Only STEP and SLEEP carry a dedicated key.
    pub fn last_date_saved(&self, metric: MetricType) -> Option<DateTime<Utc>> {
        let key = last_date_saved_key(metric)?;
        let raw = self.store.get(key)?;
        parse_measurement_date(&raw).ok()
    }

    pub fn update_last_date_saved(&mut self, metric: MetricType, date: DateTime<Utc>) {
        if let Some(key) = last_date_saved_key(metric) {
            self.store.set(key, &format_measurement_date(date));
        }
    }

    /// Last instant synced by a background observer specifically
    pub fn last_date_saved_observer_only(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(OBSERVER_ONLY_LAST_DATE_SAVED_KEY)?;
        parse_measurement_date(&raw).ok()
    }

    pub fn update_last_date_saved_observer_only(&mut self, date: DateTime<Utc>) {
        self.store
            .set(OBSERVER_ONLY_LAST_DATE_SAVED_KEY, &format_measurement_date(date));
    }

    /// Total value sent for the current day in the last successful sync
    pub fn last_value_sent(&self, metric: MetricType) -> Option<f64> {
        let key = last_value_sent_key(metric)?;
        self.store.get(key)?.parse().ok()
    }

    pub fn update_last_value_sent(&mut self, metric: MetricType, value: f64) {
        if let Some(key) = last_value_sent_key(metric) {
            self.store.set(key, &value.to_string());
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.store
            .get(OBSERVER_SYNCING_KEY)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    pub fn set_syncing(&mut self, syncing: bool) {
        self.store
            .set(OBSERVER_SYNCING_KEY, if syncing { "true" } else { "false" });
    }

    pub fn observer_created(&self) -> bool {
        self.store
            .get(OBSERVER_CREATED_KEY)
            .map(|v| v == "true")
            .unwrap_or(false)
    }

    pub fn set_observer_created(&mut self, created: bool) {
        self.store
            .set(OBSERVER_CREATED_KEY, if created { "true" } else { "false" });
    }

    /// When the last send attempt failed, the instant it was made
    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(LAST_ATTEMPT_TO_SEND_KEY)?;
        parse_measurement_date(&raw).ok()
    }

    /// A successful attempt clears the marker, a failed one stamps it
    pub fn record_attempt(&mut self, success: bool, at: DateTime<Utc>) {
        if success {
            self.store.remove(LAST_ATTEMPT_TO_SEND_KEY);
        } else {
            self.store
                .set(LAST_ATTEMPT_TO_SEND_KEY, &format_measurement_date(at));
        }
    }

    /// Snapshot of observer state for the host UI, dates as epoch millis
    pub fn status_map(&self) -> Map<String, Value> {
        let millis = |d: Option<DateTime<Utc>>| match d {
            Some(date) => json!(date.timestamp_millis()),
            None => Value::Null,
        };
        let last_steps = self
            .last_value_sent(MetricType::Step)
            .map(|v| v as i64)
            .unwrap_or(0);

        let mut map = Map::new();
        map.insert(
            "last_saved".to_string(),
            millis(self.last_date_saved(MetricType::Step)),
        );
        map.insert(
            "last_saved_date_across_sources".to_string(),
            millis(self.last_date_saved(MetricType::Step)),
        );
        map.insert(
            "last_saved_date_observer_only".to_string(),
            millis(self.last_date_saved_observer_only()),
        );
        map.insert(
            "last_attempt_timestamp".to_string(),
            millis(self.last_attempt()),
        );
        map.insert("last_steps_count_saved".to_string(), json!(last_steps));
        map.insert("observer_syncing".to_string(), json!(self.is_syncing()));
        map.insert("created".to_string(), json!(self.observer_created()));
        map.insert(
            "last_saved_sleep_date_across_sources".to_string(),
            millis(self.last_date_saved(MetricType::Sleep)),
        );
        map
    }
}

fn last_date_saved_key(metric: MetricType) -> Option<&'static str> {
    match metric {
        MetricType::Step => Some(LAST_DATE_SAVED_KEY),
        MetricType::Sleep => Some(LAST_SLEEP_DATE_SAVED_KEY),
        _ => None,
    }
}

fn last_value_sent_key(metric: MetricType) -> Option<&'static str> {
    match metric {
        MetricType::Step => Some(LAST_STEP_COUNT_SENT_KEY),
        MetricType::Sleep => Some(LAST_SLEEP_VALUE_SENT_KEY),
        _ => None,
    }
}
