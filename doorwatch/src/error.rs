//! Error types.
//!
//! Which component returns which kind:
//!
//! - [`StoreError`] comes out of the sensor store and is propagated by
//!   [`SensorRegistry::transition`](crate::sensor::SensorRegistry::transition)
//!   to the ingress, which reports the event as not recorded.
//! - [`DecodeError`] is produced when a persisted record fails
//!   validation. The registry logs it and treats the sensor as unknown.
//! - [`GatewayError`] is returned by notification gateways. The alarm
//!   scheduler logs it and carries on; it never reaches the ingress.

use thiserror::Error;

/// Persistence failure in the sensor store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("failed to encode sensor record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// A persisted sensor record that failed validation.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed sensor record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("sensor record has an empty id")]
    EmptyId,

    #[error("sensor record stored under {key:?} claims id {id:?}")]
    KeyMismatch { key: String, id: String },

    #[error("sensor timestamp {0} ms is out of range")]
    Timestamp(i64),
}

/// Failure talking to the push notification provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to notification provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("notification provider rejected the request: {0}")]
    Rejected(String),
}

/// Invalid or missing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
