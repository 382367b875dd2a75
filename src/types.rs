//! Core types shared by every stage of the sync pipeline
//!
//! `Sample` is the unit of consolidation: one time-windowed quantity reading
//! from one source. `MetricType` and `MobilePlatform` carry the wire names
//! the backend expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Metric type identifiers, as transmitted to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    #[serde(rename = "STEP")]
    Step,
    #[serde(rename = "SLEEP")]
    Sleep,
    #[serde(rename = "WORKOUT")]
    Workout,
    #[serde(rename = "WALK_DISTANCE")]
    WalkRunDistance,
    #[serde(rename = "SWIM_DISTANCE")]
    SwimDistance,
    #[serde(rename = "BIKE_DISTANCE")]
    BikeDistance,
    #[serde(rename = "WHEEL_CHAIR_DISTANCE")]
    WheelChairDistance,
    #[serde(rename = "SNOW_SPORTS_DISTANCE")]
    DownhillSnowSportsDistance,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Step => "STEP",
            MetricType::Sleep => "SLEEP",
            MetricType::Workout => "WORKOUT",
            MetricType::WalkRunDistance => "WALK_DISTANCE",
            MetricType::SwimDistance => "SWIM_DISTANCE",
            MetricType::BikeDistance => "BIKE_DISTANCE",
            MetricType::WheelChairDistance => "WHEEL_CHAIR_DISTANCE",
            MetricType::DownhillSnowSportsDistance => "SNOW_SPORTS_DISTANCE",
        }
    }

    /// Parse a backend metric name (e.g., "STEP") into a metric type
    pub fn parse(name: &str) -> Result<Self, MetricsError> {
        match name {
            "STEP" => Ok(MetricType::Step),
            "SLEEP" => Ok(MetricType::Sleep),
            "WORKOUT" => Ok(MetricType::Workout),
            "WALK_DISTANCE" => Ok(MetricType::WalkRunDistance),
            "SWIM_DISTANCE" => Ok(MetricType::SwimDistance),
            "BIKE_DISTANCE" => Ok(MetricType::BikeDistance),
            "WHEEL_CHAIR_DISTANCE" => Ok(MetricType::WheelChairDistance),
            "SNOW_SPORTS_DISTANCE" => Ok(MetricType::DownhillSnowSportsDistance),
            other => Err(MetricsError::UnsupportedMetric(other.to_string())),
        }
    }

    /// Distance metrics carry fractional quantities; everything else is an
    /// integer count when encoded into records.
    pub fn is_distance(&self) -> bool {
        matches!(
            self,
            MetricType::WalkRunDistance
                | MetricType::SwimDistance
                | MetricType::BikeDistance
                | MetricType::WheelChairDistance
                | MetricType::DownhillSnowSportsDistance
        )
    }
}

/// Platform identifier for outbound payload provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MobilePlatform {
    #[serde(rename = "ANDROID")]
    Android,
    #[serde(rename = "IOS")]
    Ios,
}

impl MobilePlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            MobilePlatform::Android => "ANDROID",
            MobilePlatform::Ios => "IOS",
        }
    }
}

/// One time-windowed quantity reading for a single metric from one source.
///
/// The window is `[start_time, end_time)`. Two samples with the same
/// `source_id` are never considered overlap candidates for consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Opaque identifier of the producing device/app/stream
    /// (Google Fit stream identifier, HealthKit source bundle identifier)
    pub source_id: String,
    /// Window start (UTC)
    pub start_time: DateTime<Utc>,
    /// Window end (UTC), never before `start_time`
    pub end_time: DateTime<Utc>,
    /// Non-negative quantity (step count, distance, ...)
    pub value: f64,
}

impl Sample {
    /// Build a sample, rejecting malformed windows and values up front.
    ///
    /// Consolidation assumes well-formed samples; validation happens here,
    /// not inside the algorithm.
    pub fn new(
        source_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        value: f64,
    ) -> Result<Self, MetricsError> {
        if end_time < start_time {
            return Err(MetricsError::InvalidSample(format!(
                "end_time {end_time} precedes start_time {start_time}"
            )));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(MetricsError::InvalidSample(format!(
                "value must be finite and non-negative, got {value}"
            )));
        }
        Ok(Self {
            source_id: source_id.into(),
            start_time,
            end_time,
            value,
        })
    }
}
