//! Delayed door-open alarms.
//!
//! # State Machine
//!
//! One alarm per sensor:
//!
//! ```text
//!          set_alarm()              grace period expires
//!  Idle ──────────────► Scheduled ──────────────────────► Fired
//!   ▲                     │   ▲                             │
//!   │    clear_alarm()    │   │ set_alarm() (new window)    │
//!   ├─────────────────────┘   └─────────────────────────────┤
//!   │                                                       │
//!   └──────────── clear_alarm() (cancels receipt) ──────────┘
//!
//!          check_alarm() on a sensor already past its grace period
//!  Idle ──────────────────────────────────────────────────► Fired
//! ```
//!
//! - **Idle:** no record for the sensor.
//! - **Scheduled:** a one-shot timer is pending.
//! - **Fired:** the notification was attempted. Holds the provider
//!   receipt if one came back. Stays here until cleared; there is no
//!   retry.
//!
//! Timer expiry is delivered as a message to [`AlarmCoordinator`], which
//! decides whether the expiry still belongs to the live alarm. Every alarm
//! carries a generation number, so a timer that lost a race with
//! `clear_alarm` or a newer `set_alarm` is recognised and ignored.

mod scheduler;

pub use scheduler::{AlarmCoordinator, AlarmPhase, AlarmScheduler, AlarmSnapshot};
