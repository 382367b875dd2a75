//! HealthKit adapter
//!
//! Parses quantity-sample dumps from an HKSampleQuery. Dates are ISO-8601
//! strings; the source bundle identifier names the producing app, with the
//! quantity already converted to the metric's unit on the host side.

use log::debug;
use serde::Deserialize;

use crate::error::MetricsError;
use crate::records::parse_measurement_date;
use crate::types::Sample;

use super::PlatformSampleAdapter;

/// HealthKit quantity-sample adapter
pub struct HealthKitAdapter;

impl PlatformSampleAdapter for HealthKitAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<Sample>, MetricsError> {
        let payload: HealthKitPayload = serde_json::from_str(raw_json)?;
        let entries = payload.samples.unwrap_or_default();

        let mut samples = Vec::with_capacity(entries.len());
        for entry in entries {
            let start = parse_measurement_date(&entry.start_date)?;
            let end = parse_measurement_date(&entry.end_date)?;
            samples.push(Sample::new(entry.source_bundle_id, start, end, entry.quantity)?);
        }
        debug!("parsed {} HealthKit samples", samples.len());
        Ok(samples)
    }
}

#[derive(Debug, Deserialize)]
struct HealthKitPayload {
    samples: Option<Vec<HealthKitSample>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthKitSample {
    source_bundle_id: String,
    start_date: String,
    end_date: String,
    quantity: f64,
}
