use std::sync::Arc;

use super::model::{Sensor, SensorState};
use super::store::SensorStore;
use crate::clock::Clock;
use crate::error::StoreError;
use crate::tracing::prelude::*;

/// Owns sensor state transitions.
///
/// The registry is the only component that reads or writes the sensor
/// store.
pub struct SensorRegistry {
    store: Arc<dyn SensorStore>,
    clock: Arc<dyn Clock>,
}

impl SensorRegistry {
    pub fn new(store: Arc<dyn SensorStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Move `id` to `state` and persist the result.
    ///
    /// Unknown sensors are provisioned as open before the new state is
    /// applied. Repeating the current state leaves the timestamp alone.
    /// On `Err` nothing may be assumed about the stored state, and the
    /// caller must not touch the sensor's alarm.
    pub fn transition(&self, id: &str, state: SensorState) -> Result<Sensor, StoreError> {
        let now = self.clock.now();

        let (mut sensor, provisioned) = match self.load(id)? {
            Some(sensor) => (sensor, false),
            None => {
                info!(sensor = %id, "Unknown sensor, provisioning");
                (Sensor::provision(id, now), true)
            }
        };

        let previous = sensor.state;
        let changed = sensor.apply(state, now);

        if changed || provisioned {
            self.store.put(id, &sensor.encode()?)?;
        }

        if changed {
            info!(sensor = %id, from = %previous, to = %state, "Sensor state changed");
        } else {
            debug!(sensor = %id, state = %state, "Sensor state unchanged");
        }

        Ok(sensor)
    }

    /// Look up a single sensor.
    pub fn get(&self, id: &str) -> Result<Option<Sensor>, StoreError> {
        self.load(id)
    }

    /// Every sensor with a valid record, unordered.
    pub fn list_all(&self) -> Result<Vec<Sensor>, StoreError> {
        let records = self.store.scan()?;
        let sensors = records
            .into_iter()
            .filter_map(|(id, bytes)| match Sensor::decode(&id, &bytes) {
                Ok(sensor) => Some(sensor),
                Err(e) => {
                    error!(sensor = %id, error = %e, "Failed to decode sensor record");
                    None
                }
            })
            .collect();
        Ok(sensors)
    }

    /// Fetch and decode a record. Undecodable records count as unknown.
    fn load(&self, id: &str) -> Result<Option<Sensor>, StoreError> {
        let Some(bytes) = self.store.get(id)? else {
            return Ok(None);
        };

        match Sensor::decode(id, &bytes) {
            Ok(sensor) => Ok(Some(sensor)),
            Err(e) => {
                error!(sensor = %id, error = %e, "Failed to decode sensor record");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::OffsetDateTime;
    use time::macros::datetime;

    use super::*;
    use crate::clock::ManualClock;
    use crate::sensor::MemoryStore;

    const T0: OffsetDateTime = datetime!(2024-03-01 12:00 UTC);

    struct BrokenStore;

    impl SensorStore for BrokenStore {
        fn get(&self, _id: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        fn put(&self, _id: &str, _record: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }

        fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }
    }

    fn registry() -> (SensorRegistry, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let registry = SensorRegistry::new(store.clone(), clock.clone());
        (registry, store, clock)
    }

    #[test]
    fn unknown_sensor_is_provisioned_open() {
        let (registry, store, _clock) = registry();

        let sensor = registry.transition("front", SensorState::Open).unwrap();

        assert_eq!(sensor.state, SensorState::Open);
        assert_eq!(sensor.last_updated, T0);
        assert!(store.get("front").unwrap().is_some());
    }

    #[test]
    fn unknown_sensor_closed_is_provisioned_then_closed() {
        let (registry, _store, _clock) = registry();

        let sensor = registry.transition("front", SensorState::Closed).unwrap();

        assert_eq!(sensor.state, SensorState::Closed);
        assert_eq!(registry.get("front").unwrap(), Some(sensor));
    }

    #[test]
    fn repeated_state_keeps_last_updated() {
        let (registry, _store, clock) = registry();
        registry.transition("front", SensorState::Open).unwrap();

        clock.advance(Duration::from_secs(60));
        let sensor = registry.transition("front", SensorState::Open).unwrap();

        assert_eq!(sensor.last_updated, T0);
        assert_eq!(registry.get("front").unwrap().unwrap().last_updated, T0);
    }

    #[test]
    fn changed_state_advances_last_updated() {
        let (registry, _store, clock) = registry();
        registry.transition("front", SensorState::Open).unwrap();

        clock.advance(Duration::from_secs(60));
        let sensor = registry.transition("front", SensorState::Closed).unwrap();

        let expected = T0 + Duration::from_secs(60);
        assert_eq!(sensor.last_updated, expected);
        assert_eq!(
            registry.get("front").unwrap().unwrap().last_updated,
            expected
        );
    }

    #[test]
    fn corrupt_record_is_reprovisioned() {
        let (registry, store, _clock) = registry();
        store.put("front", b"not json").unwrap();

        let sensor = registry.transition("front", SensorState::Closed).unwrap();

        assert_eq!(sensor.state, SensorState::Closed);
        assert_eq!(registry.get("front").unwrap(), Some(sensor));
    }

    #[test]
    fn store_failure_is_propagated() {
        let clock = Arc::new(ManualClock::new(T0));
        let registry = SensorRegistry::new(Arc::new(BrokenStore), clock);

        assert!(matches!(
            registry.transition("front", SensorState::Open),
            Err(StoreError::Backend(_))
        ));
        assert!(registry.list_all().is_err());
    }

    #[test]
    fn list_all_skips_corrupt_records() {
        let (registry, store, _clock) = registry();
        registry.transition("front", SensorState::Open).unwrap();
        registry.transition("back", SensorState::Closed).unwrap();
        store.put("garage", b"{}").unwrap();

        let mut ids: Vec<_> = registry
            .list_all()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        ids.sort();

        assert_eq!(ids, ["back", "front"]);
    }
}
