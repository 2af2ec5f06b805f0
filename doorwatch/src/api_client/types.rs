//! API data transfer objects.
//!
//! These types define the API contract shared between the server and
//! clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::alarm::AlarmPhase;
use crate::sensor::SensorState;

/// A sensor and its alarm, if one is live.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct SensorView {
    pub id: String,
    pub state: SensorState,
    /// Time of the last state change, in Unix milliseconds.
    pub last_updated_ms: i64,
    pub alarm: Option<AlarmView>,
}

/// Live alarm status.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct AlarmView {
    pub phase: AlarmPhase,
    /// Seconds until a scheduled alarm fires.
    pub fires_in_secs: Option<u64>,
    /// Provider receipt of a fired, cancellable notification.
    pub receipt: Option<String>,
}
