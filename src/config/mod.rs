//! Externally supplied configuration for the collector core

mod builder;
mod types;

pub use builder::CollectorConfigBuilder;
pub use types::{ApiConfig, CollectorConfig, ScrapeConfig, UrlTemplates};

/// Serialize `Duration` fields as integer milliseconds, matching the
/// `*_ms` convention of the upstream config surface.
pub mod serde_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
