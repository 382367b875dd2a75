//! Platform sample adapters
//!
//! Adapters parse materialized platform query results, as marshaled out of
//! the vendor SDK by the host plugin, into neutral samples. The vendor SDK
//! call itself stays on the host side; by the time data reaches this crate
//! it is a plain JSON dump.

mod google_fit;
mod health_kit;

pub use google_fit::GoogleFitAdapter;
pub use health_kit::HealthKitAdapter;

use crate::error::MetricsError;
use crate::types::Sample;

/// Trait for platform sample adapters
pub trait PlatformSampleAdapter {
    /// Parse a raw platform query dump into samples
    fn parse(&self, raw_json: &str) -> Result<Vec<Sample>, MetricsError>;
}
