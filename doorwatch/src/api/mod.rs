//! HTTP API: door event ingress and sensor status.

mod server;
mod v0;

pub use server::{SharedState, router, serve};
