//! Outbound record encoding
//!
//! Maps retained samples to the record format the backend metrics endpoint
//! expects and assembles the payload envelope around them. Also parses the
//! backend's measurement dates, which may or may not carry fractional
//! seconds depending on which writer produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MetricsError;
use crate::types::{MetricType, MobilePlatform, Sample};
use crate::OBSERVER_SOURCE;

/// Wire format for measurement dates: ISO-8601 with milliseconds and offset
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Record value: counts stay integral on the wire, distances keep fractions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(i64),
    Amount(f64),
}

/// One outbound measurement record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub value: MetricValue,
    pub measurement_start_date: String,
    pub measurement_end_date: String,
}

/// Payload envelope for a batch of records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub metrics: Vec<MetricRecord>,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub source: String,
    pub mobile_platform: MobilePlatform,
    /// Unique id per encoded batch, lets the backend drop replays
    pub batch_id: String,
}

/// A record as stored by the backend, returned from last-saved lookups
#[derive(Debug, Clone, Deserialize)]
pub struct StoredMetricRecord {
    pub id: String,
    pub value: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    pub measurement_start_date: String,
    pub measurement_end_date: String,
    pub mobile_platform: Option<String>,
}

impl StoredMetricRecord {
    /// The measurement end instant, the point the next sync resumes from
    pub fn end_date(&self) -> Result<DateTime<Utc>, MetricsError> {
        parse_measurement_date(&self.measurement_end_date)
    }
}

/// Encoder from consolidated samples to outbound records
pub struct RecordEncoder {
    platform: MobilePlatform,
}

impl RecordEncoder {
    pub fn new(platform: MobilePlatform) -> Self {
        Self { platform }
    }

    /// Encode one sample for the given metric.
    ///
    /// Count metrics truncate fractional readings, matching the platform
    /// value extractors this replaces.
    pub fn record(&self, sample: &Sample, metric: MetricType) -> MetricRecord {
        let value = if metric.is_distance() {
            MetricValue::Amount(sample.value)
        } else {
            MetricValue::Count(sample.value as i64)
        };
        MetricRecord {
            value,
            measurement_start_date: format_measurement_date(sample.start_time),
            measurement_end_date: format_measurement_date(sample.end_time),
        }
    }

    /// Assemble the payload envelope for a consolidated batch
    pub fn payload(&self, metric: MetricType, samples: &[Sample]) -> MetricsPayload {
        MetricsPayload {
            metrics: samples.iter().map(|s| self.record(s, metric)).collect(),
            metric_type: metric,
            source: OBSERVER_SOURCE.to_string(),
            mobile_platform: self.platform,
            batch_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Format an instant as a wire measurement date (UTC offset)
pub fn format_measurement_date(date: DateTime<Utc>) -> String {
    date.format(DEFAULT_DATE_FORMAT).to_string()
}

/// Parse a wire measurement date.
///
/// Accepts dates with or without fractional seconds and with either a
/// numeric offset or `Z`.
pub fn parse_measurement_date(raw: &str) -> Result<DateTime<Utc>, MetricsError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.3f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }
    Err(MetricsError::DateParseError(raw.to_string()))
}
