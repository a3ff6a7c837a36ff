//! Durations in config files
//!
//! A bare number is whole seconds (`poll_interval: 10`); text goes through
//! humantime (`wait_budget: 15m`, `sample_interval: 2s 500ms`).

/// `#[serde(with = "crate::duration::seconds")]`
pub mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(#[serde(with = "humantime_serde")] Duration),
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            humantime_serde::serialize(duration, serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Seconds(seconds) => Duration::from_secs(seconds),
            Raw::Text(duration) => duration,
        })
    }
}
