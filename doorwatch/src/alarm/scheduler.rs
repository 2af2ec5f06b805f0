use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::clock::Clock;
use crate::config::format_hms;
use crate::notify::{NotificationGateway, Receipt};
use crate::sensor::Sensor;
use crate::tracing::prelude::*;

/// Externally visible phase of a live alarm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlarmPhase {
    Scheduled,
    Fired,
}

/// Point-in-time copy of one live alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSnapshot {
    pub sensor_id: String,
    pub phase: AlarmPhase,
    /// Time left before a scheduled alarm fires.
    pub remaining: Option<Duration>,
    pub receipt: Option<Receipt>,
}

enum Phase {
    Scheduled {
        timer: JoinHandle<()>,
        fire_at: Instant,
    },
    Fired {
        receipt: Option<Receipt>,
    },
}

struct Alarm {
    /// Distinguishes this alarm from earlier ones for the same sensor.
    generation: u64,
    phase: Phase,
}

impl Alarm {
    fn snapshot(&self, sensor_id: &str, now: Instant) -> AlarmSnapshot {
        let (phase, remaining, receipt) = match &self.phase {
            Phase::Scheduled { fire_at, .. } => (
                AlarmPhase::Scheduled,
                Some(fire_at.saturating_duration_since(now)),
                None,
            ),
            Phase::Fired { receipt } => (AlarmPhase::Fired, None, receipt.clone()),
        };
        AlarmSnapshot {
            sensor_id: sensor_id.to_string(),
            phase,
            remaining,
            receipt,
        }
    }
}

#[derive(Default)]
struct Alarms {
    live: HashMap<String, Alarm>,
    last_generation: u64,
}

impl Alarms {
    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }
}

/// A timer that ran out, posted to the coordinator.
#[derive(Debug)]
struct Expiry {
    sensor_id: String,
    generation: u64,
}

struct Inner {
    grace_period: Duration,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    /// Guards bookkeeping only. Never held across a gateway call.
    alarms: Mutex<Alarms>,
    expiry_tx: mpsc::UnboundedSender<Expiry>,
    /// In-flight sends and cancels.
    tasks: TaskTracker,
}

/// Owns the set of live alarms.
///
/// Cheap to clone; clones share the same alarms. Timer expiry is handled
/// by the paired [`AlarmCoordinator`], which must be running for
/// scheduled alarms to fire.
#[derive(Clone)]
pub struct AlarmScheduler {
    inner: Arc<Inner>,
}

/// Consumes timer expiries and starts the notification for each alarm
/// that is still current.
pub struct AlarmCoordinator {
    inner: Arc<Inner>,
    expiry_rx: mpsc::UnboundedReceiver<Expiry>,
}

impl AlarmScheduler {
    pub fn new(
        grace_period: Duration,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
    ) -> (Self, AlarmCoordinator) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            grace_period,
            gateway,
            clock,
            alarms: Mutex::new(Alarms::default()),
            expiry_tx,
            tasks: TaskTracker::new(),
        });
        let coordinator = AlarmCoordinator {
            inner: inner.clone(),
            expiry_rx,
        };
        (Self { inner }, coordinator)
    }

    /// Start a fresh grace period for `sensor_id`.
    ///
    /// Any existing alarm for the sensor is cleared first, exactly as
    /// [`clear_alarm`](Self::clear_alarm) would, so repeated calls never
    /// leave overlapping timers behind.
    pub fn set_alarm(&self, sensor_id: &str) {
        let inner = &self.inner;
        let previous = {
            let mut alarms = inner.alarms.lock();
            let generation = alarms.next_generation();
            let fire_at = Instant::now() + inner.grace_period;
            let timer = inner.spawn_timer(sensor_id, generation, fire_at);
            alarms.live.insert(
                sensor_id.to_string(),
                Alarm {
                    generation,
                    phase: Phase::Scheduled { timer, fire_at },
                },
            )
        };

        if let Some(previous) = previous {
            inner.discard(sensor_id, previous);
        }

        info!(
            sensor = %sensor_id,
            grace_period = %format_hms(inner.grace_period),
            "Alarm scheduled"
        );
    }

    /// Drop the alarm for `sensor_id`, if any.
    ///
    /// A pending timer is cancelled. A fired alarm with a receipt has its
    /// notification cancelled in the background; the call does not wait
    /// for the provider. Returns whether there was an alarm to clear.
    pub fn clear_alarm(&self, sensor_id: &str) -> bool {
        let removed = self.inner.alarms.lock().live.remove(sensor_id);
        match removed {
            Some(alarm) => {
                self.inner.discard(sensor_id, alarm);
                true
            }
            None => {
                debug!(sensor = %sensor_id, "No alarm to clear");
                false
            }
        }
    }

    /// Fire immediately if `sensor` has already been open for the whole
    /// grace period, e.g. because the process was down while it elapsed.
    ///
    /// Installs a fired alarm without a timer so that a later close can
    /// still cancel the notification. Does nothing for closed sensors,
    /// sensors still within their grace period, or sensors that already
    /// have a live alarm. Returns whether a notification was started.
    pub fn check_alarm(&self, sensor: &Sensor) -> bool {
        if !sensor.is_open() {
            return false;
        }

        let inner = &self.inner;
        let open_for = sensor.time_in_state(inner.clock.now());
        if open_for < inner.grace_period {
            return false;
        }

        let generation = {
            let mut alarms = inner.alarms.lock();
            if alarms.live.contains_key(&sensor.id) {
                debug!(sensor = %sensor.id, "Alarm already live, not re-triggering");
                return false;
            }
            let generation = alarms.next_generation();
            alarms.live.insert(
                sensor.id.clone(),
                Alarm {
                    generation,
                    phase: Phase::Fired { receipt: None },
                },
            );
            generation
        };

        info!(
            sensor = %sensor.id,
            open_for = %format_hms(open_for),
            "Sensor open past grace period, triggering alarm"
        );
        inner.spawn_trigger(sensor.id.clone(), generation, open_for);
        true
    }

    /// The live alarm for `sensor_id`, if any.
    pub fn alarm(&self, sensor_id: &str) -> Option<AlarmSnapshot> {
        let now = Instant::now();
        self.inner
            .alarms
            .lock()
            .live
            .get(sensor_id)
            .map(|alarm| alarm.snapshot(sensor_id, now))
    }

    /// Every live alarm, unordered.
    pub fn live_alarms(&self) -> Vec<AlarmSnapshot> {
        let now = Instant::now();
        self.inner
            .alarms
            .lock()
            .live
            .iter()
            .map(|(id, alarm)| alarm.snapshot(id, now))
            .collect()
    }

    /// Stop pending timers and wait for in-flight sends and cancels.
    pub async fn shutdown(&self) {
        for alarm in self.inner.alarms.lock().live.values() {
            if let Phase::Scheduled { timer, .. } = &alarm.phase {
                timer.abort();
            }
        }
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }
}

impl Inner {
    fn spawn_timer(&self, sensor_id: &str, generation: u64, fire_at: Instant) -> JoinHandle<()> {
        let expiry_tx = self.expiry_tx.clone();
        let sensor_id = sensor_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            // Fails only once the coordinator has shut down.
            let _ = expiry_tx.send(Expiry {
                sensor_id,
                generation,
            });
        })
    }

    /// Tear down an alarm that has already been removed from the live set.
    fn discard(&self, sensor_id: &str, alarm: Alarm) {
        match alarm.phase {
            Phase::Scheduled { timer, .. } => {
                timer.abort();
                info!(sensor = %sensor_id, "Pending alarm cleared");
            }
            Phase::Fired {
                receipt: Some(receipt),
            } => {
                info!(
                    sensor = %sensor_id,
                    receipt = %receipt,
                    "Fired alarm cleared, cancelling notification"
                );
                self.spawn_cancel(sensor_id, receipt);
            }
            Phase::Fired { receipt: None } => {
                info!(sensor = %sensor_id, "Fired alarm cleared");
            }
        }
    }

    fn spawn_cancel(&self, sensor_id: &str, receipt: Receipt) {
        let gateway = self.gateway.clone();
        let sensor_id = sensor_id.to_string();
        self.tasks.spawn(async move {
            cancel_notification(gateway.as_ref(), &sensor_id, &receipt).await;
        });
    }

    fn spawn_trigger(self: &Arc<Self>, sensor_id: String, generation: u64, open_for: Duration) {
        let inner = Arc::clone(self);
        self.tasks.spawn(async move {
            inner.trigger(&sensor_id, generation, open_for).await;
        });
    }

    /// Send the notification for alarm `generation` of `sensor_id`, then
    /// attach the receipt to the alarm if it is still live.
    async fn trigger(&self, sensor_id: &str, generation: u64, open_for: Duration) {
        let message = format!(
            "{sensor_id} has been open for at least {}",
            format_hms(open_for)
        );
        let title = format!("{sensor_id} left open");

        let receipt = match self.gateway.send(&message, Some(&title)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(sensor = %sensor_id, error = %e, "Failed to send alarm notification");
                return;
            }
        };

        info!(sensor = %sensor_id, receipt = ?receipt, "Alarm triggered");

        let Some(receipt) = receipt else {
            return;
        };

        let orphan = {
            let mut alarms = self.alarms.lock();
            let slot = alarms
                .live
                .get_mut(sensor_id)
                .filter(|alarm| alarm.generation == generation)
                .and_then(|alarm| match &mut alarm.phase {
                    Phase::Fired { receipt: slot } if slot.is_none() => Some(slot),
                    _ => None,
                });
            match slot {
                Some(slot) => {
                    *slot = Some(receipt);
                    None
                }
                None => Some(receipt),
            }
        };

        match orphan {
            None => debug!(sensor = %sensor_id, "Alarm receipt recorded"),
            Some(receipt) => {
                warn!(
                    sensor = %sensor_id,
                    receipt = %receipt,
                    "Alarm cleared while its notification was in flight, cancelling"
                );
                cancel_notification(self.gateway.as_ref(), sensor_id, &receipt).await;
            }
        }
    }
}

async fn cancel_notification(gateway: &dyn NotificationGateway, sensor_id: &str, receipt: &Receipt) {
    match gateway.cancel(receipt).await {
        Ok(()) => info!(sensor = %sensor_id, receipt = %receipt, "Notification cancelled"),
        Err(e) => warn!(
            sensor = %sensor_id,
            receipt = %receipt,
            error = %e,
            "Failed to cancel notification, it stays active at the provider"
        ),
    }
}

impl AlarmCoordinator {
    pub async fn run(mut self, cancellation: CancellationToken) {
        debug!("Alarm coordinator started");

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    break;
                }
                Some(expiry) = self.expiry_rx.recv() => {
                    self.handle_expiry(expiry);
                }
            }
        }

        debug!("Alarm coordinator stopped");
    }

    fn handle_expiry(&self, expiry: Expiry) {
        let Expiry {
            sensor_id,
            generation,
        } = expiry;

        {
            let mut alarms = self.inner.alarms.lock();
            match alarms.live.get_mut(&sensor_id) {
                Some(alarm)
                    if alarm.generation == generation
                        && matches!(alarm.phase, Phase::Scheduled { .. }) =>
                {
                    alarm.phase = Phase::Fired { receipt: None };
                }
                _ => {
                    debug!(sensor = %sensor_id, generation, "Ignoring stale alarm expiry");
                    return;
                }
            }
        }

        self.inner
            .spawn_trigger(sensor_id, generation, self.inner.grace_period);
    }
}
