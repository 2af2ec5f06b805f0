//! Glue between door events, sensor state and alarms.
//!
//! Every event for a sensor is applied under that sensor's lock: the
//! state transition is persisted first, and only then is the alarm set or
//! cleared. Events for the same sensor therefore take effect in arrival
//! order, and a failed write never touches the alarm.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::alarm::{AlarmScheduler, AlarmSnapshot};
use crate::error::StoreError;
use crate::sensor::{Sensor, SensorRegistry, SensorState};
use crate::tracing::prelude::*;

pub struct Monitor {
    registry: SensorRegistry,
    scheduler: AlarmScheduler,
    /// Per-sensor event serialization.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Monitor {
    pub fn new(registry: SensorRegistry, scheduler: AlarmScheduler) -> Self {
        Self {
            registry,
            scheduler,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    /// A door was opened: record it and (re)start the sensor's alarm.
    ///
    /// Returns the recorded sensor with its alarm as they stood when the
    /// event was applied.
    pub async fn door_opened(
        &self,
        sensor_id: &str,
    ) -> Result<(Sensor, Option<AlarmSnapshot>), StoreError> {
        self.handle(sensor_id, SensorState::Open).await
    }

    /// A door was closed: record it and clear the sensor's alarm.
    pub async fn door_closed(
        &self,
        sensor_id: &str,
    ) -> Result<(Sensor, Option<AlarmSnapshot>), StoreError> {
        self.handle(sensor_id, SensorState::Closed).await
    }

    async fn handle(
        &self,
        sensor_id: &str,
        state: SensorState,
    ) -> Result<(Sensor, Option<AlarmSnapshot>), StoreError> {
        let lock = self.lock_for(sensor_id);
        let result = {
            let _guard = lock.lock().await;
            self.apply(sensor_id, state)
        };
        self.release(sensor_id, lock);
        result
    }

    /// Persist the transition, then set or clear the alarm. Runs under
    /// the sensor's lock.
    fn apply(
        &self,
        sensor_id: &str,
        state: SensorState,
    ) -> Result<(Sensor, Option<AlarmSnapshot>), StoreError> {
        let sensor = match self.registry.transition(sensor_id, state) {
            Ok(sensor) => sensor,
            Err(e) => {
                error!(sensor = %sensor_id, state = %state, error = %e, "Failed to record sensor event");
                return Err(e);
            }
        };

        match state {
            SensorState::Open => self.scheduler.set_alarm(sensor_id),
            SensorState::Closed => {
                self.scheduler.clear_alarm(sensor_id);
            }
        }

        let alarm = self.scheduler.alarm(sensor_id);
        Ok((sensor, alarm))
    }

    fn lock_for(&self, sensor_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(sensor_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the sensor's lock entry once no other event holds or waits
    /// on it.
    fn release(&self, sensor_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        // Clones are only taken under `locks`: one here, one in the map.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(sensor_id);
        }
    }

    /// Re-derive alarms from persisted sensor state.
    ///
    /// Timers do not survive a restart, so any sensor left open past its
    /// grace period while the process was down is alarmed immediately.
    /// Sensors still within their grace period get no alarm until their
    /// next event. Returns the number of alarms triggered; a store
    /// failure is logged and counts as zero.
    pub fn reconcile(&self) -> usize {
        info!("Checking all sensors on startup");

        let sensors = match self.registry.list_all() {
            Ok(sensors) => sensors,
            Err(e) => {
                error!(error = %e, "Failed to list sensors for reconciliation");
                return 0;
            }
        };

        let mut triggered = 0;
        for sensor in &sensors {
            debug!(sensor = %sensor.id, state = %sensor.state, "Checking sensor");
            if self.scheduler.check_alarm(sensor) {
                triggered += 1;
            }
        }

        info!(
            sensors = sensors.len(),
            triggered = triggered,
            "Startup reconciliation complete"
        );
        triggered
    }

    /// Every known sensor with its live alarm, if any.
    pub fn sensors(&self) -> Result<Vec<(Sensor, Option<AlarmSnapshot>)>, StoreError> {
        let mut sensors: Vec<_> = self
            .registry
            .list_all()?
            .into_iter()
            .map(|sensor| {
                let alarm = self.scheduler.alarm(&sensor.id);
                (sensor, alarm)
            })
            .collect();
        sensors.sort_by(|(a, _), (b, _)| a.id.cmp(&b.id));
        Ok(sensors)
    }

    pub fn sensor(
        &self,
        sensor_id: &str,
    ) -> Result<Option<(Sensor, Option<AlarmSnapshot>)>, StoreError> {
        Ok(self.registry.get(sensor_id)?.map(|sensor| {
            let alarm = self.scheduler.alarm(&sensor.id);
            (sensor, alarm)
        }))
    }
}
