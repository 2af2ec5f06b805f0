//! Sensor state and its persistence.

mod model;
mod registry;
mod store;

pub use model::{Sensor, SensorState};
pub use registry::SensorRegistry;
pub use store::{MemoryStore, SensorStore, SledStore};
