//! Outbound push notifications.
//!
//! A [`NotificationGateway`] sends an alert and, when the provider hands
//! back a [`Receipt`], can cancel it later. Gateways make a single
//! best-effort attempt per call; retrying is not their job.

mod pushover;
#[cfg(any(test, feature = "test-util"))]
mod recording;
mod types;

use async_trait::async_trait;

pub use pushover::PushoverGateway;
#[cfg(any(test, feature = "test-util"))]
pub use recording::{RecordingGateway, SentNotification};
pub use types::Receipt;

use crate::error::GatewayError;

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Deliver an alert.
    ///
    /// `Ok(Some(receipt))` means the alert can be cancelled later;
    /// `Ok(None)` is a successful send that cannot be.
    async fn send(&self, message: &str, title: Option<&str>)
    -> Result<Option<Receipt>, GatewayError>;

    /// Cancel a previously sent alert.
    async fn cancel(&self, receipt: &Receipt) -> Result<(), GatewayError>;
}
