use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use crate::error::DecodeError;

/// Door position reported by a sensor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SensorState {
    Open,
    Closed,
}

/// One physical door sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub id: String,
    pub state: SensorState,
    /// Time of the most recent state change.
    pub last_updated: OffsetDateTime,
}

/// On-disk shape of a sensor record.
#[derive(Serialize, Deserialize)]
struct SensorRecord {
    #[serde(rename = "_id")]
    id: String,
    state: SensorState,
    /// Unix milliseconds.
    #[serde(rename = "lastUpdated")]
    last_updated: i64,
}

impl Sensor {
    /// A sensor seen for the first time. New sensors start out open.
    pub fn provision(id: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            state: SensorState::Open,
            last_updated: now,
        }
    }

    /// Move to `state`, stamping `now` only when the state actually
    /// changes. Returns whether it changed.
    pub fn apply(&mut self, state: SensorState, now: OffsetDateTime) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        self.last_updated = now;
        true
    }

    pub fn is_open(&self) -> bool {
        self.state == SensorState::Open
    }

    /// How long the sensor has been in its current state.
    pub fn time_in_state(&self, now: OffsetDateTime) -> std::time::Duration {
        let elapsed = now - self.last_updated;
        // A clock that stepped backwards yields zero rather than a
        // negative age.
        std::time::Duration::try_from(elapsed).unwrap_or_default()
    }

    /// Time of the last state change in Unix milliseconds.
    pub fn last_updated_ms(&self) -> i64 {
        (self.last_updated.unix_timestamp_nanos() / 1_000_000) as i64
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let record = SensorRecord {
            id: self.id.clone(),
            state: self.state,
            last_updated: self.last_updated_ms(),
        };
        serde_json::to_vec(&record)
    }

    /// Decode and validate a record stored under `key`.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, DecodeError> {
        let record: SensorRecord = serde_json::from_slice(bytes)?;

        if record.id.trim().is_empty() {
            return Err(DecodeError::EmptyId);
        }
        if record.id != key {
            return Err(DecodeError::KeyMismatch {
                key: key.to_string(),
                id: record.id,
            });
        }

        let last_updated =
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(record.last_updated) * 1_000_000)
                .map_err(|_| DecodeError::Timestamp(record.last_updated))?;

        Ok(Self {
            id: record.id,
            state: record.state,
            last_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;

    const T0: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

    #[test]
    fn provisioned_sensor_is_open() {
        let sensor = Sensor::provision("front", T0);
        assert_eq!(sensor.state, SensorState::Open);
        assert_eq!(sensor.last_updated, T0);
    }

    #[test]
    fn repeated_state_keeps_timestamp() {
        let mut sensor = Sensor::provision("front", T0);
        let later = T0 + Duration::from_secs(30);

        assert!(!sensor.apply(SensorState::Open, later));
        assert_eq!(sensor.last_updated, T0);
    }

    #[test]
    fn changed_state_stamps_time() {
        let mut sensor = Sensor::provision("front", T0);
        let later = T0 + Duration::from_secs(30);

        assert!(sensor.apply(SensorState::Closed, later));
        assert_eq!(sensor.state, SensorState::Closed);
        assert_eq!(sensor.last_updated, later);
    }

    #[test]
    fn time_in_state_saturates_at_zero() {
        let sensor = Sensor::provision("front", T0);
        assert_eq!(
            sensor.time_in_state(T0 - Duration::from_secs(5)),
            Duration::ZERO
        );
        assert_eq!(
            sensor.time_in_state(T0 + Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn record_uses_document_field_names() {
        let sensor = Sensor::provision("front", T0);
        let json: serde_json::Value = serde_json::from_slice(&sensor.encode().unwrap()).unwrap();

        assert_eq!(json["_id"], "front");
        assert_eq!(json["state"], "open");
        assert_eq!(json["lastUpdated"], T0.unix_timestamp() * 1000);
    }

    #[test]
    fn decodes_stored_document() {
        let bytes = br#"{"_id":"back","state":"closed","lastUpdated":1709294400000}"#;
        let sensor = Sensor::decode("back", bytes).unwrap();

        assert_eq!(sensor.id, "back");
        assert_eq!(sensor.state, SensorState::Closed);
        assert_eq!(sensor.last_updated, T0);
    }

    #[test]
    fn rejects_unknown_state() {
        let bytes = br#"{"_id":"back","state":"ajar","lastUpdated":0}"#;
        assert!(matches!(
            Sensor::decode("back", bytes),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_missing_timestamp() {
        let bytes = br#"{"_id":"back","state":"open"}"#;
        assert!(matches!(
            Sensor::decode("back", bytes),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_key_mismatch() {
        let bytes = br#"{"_id":"back","state":"open","lastUpdated":0}"#;
        assert!(matches!(
            Sensor::decode("front", bytes),
            Err(DecodeError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn rejects_empty_id() {
        let bytes = br#"{"_id":"","state":"open","lastUpdated":0}"#;
        assert!(matches!(
            Sensor::decode("", bytes),
            Err(DecodeError::EmptyId)
        ));
    }

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!(SensorState::from_str("OPEN").unwrap(), SensorState::Open);
        assert_eq!(SensorState::Closed.to_string(), "closed");
    }
}
