//! Door sensor monitor.
//!
//! Tracks the open/closed state of door sensors and raises a push
//! notification when a door stays open longer than a configured grace
//! period. The notification is cancelled again if the door closes.

pub mod alarm;
pub mod api;
pub mod api_client;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod sensor;
pub mod tracing;
