//! Google Fit adapter
//!
//! Parses data-point dumps from the Google Fit history client. Windows come
//! as epoch milliseconds; the stream identifier names the producing
//! device/app stream.

use chrono::{TimeZone, Utc};
use log::debug;
use serde::Deserialize;

use crate::error::MetricsError;
use crate::types::Sample;

use super::PlatformSampleAdapter;

/// Google Fit data-point adapter
pub struct GoogleFitAdapter;

impl PlatformSampleAdapter for GoogleFitAdapter {
    fn parse(&self, raw_json: &str) -> Result<Vec<Sample>, MetricsError> {
        let payload: GoogleFitPayload = serde_json::from_str(raw_json)?;
        let points = payload.data_points.unwrap_or_default();

        let mut samples = Vec::with_capacity(points.len());
        for point in points {
            let start = millis_to_instant(point.start_time_millis)?;
            let end = millis_to_instant(point.end_time_millis)?;
            samples.push(Sample::new(point.stream_identifier, start, end, point.value)?);
        }
        debug!("parsed {} Google Fit data points", samples.len());
        Ok(samples)
    }
}

fn millis_to_instant(millis: i64) -> Result<chrono::DateTime<Utc>, MetricsError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| MetricsError::DateParseError(format!("epoch millis out of range: {millis}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleFitPayload {
    data_points: Option<Vec<GoogleFitDataPoint>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleFitDataPoint {
    stream_identifier: String,
    start_time_millis: i64,
    end_time_millis: i64,
    value: f64,
}
