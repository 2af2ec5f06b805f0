//! A gateway that records calls instead of talking to a provider.
//!
//! Only built for tests and with the `test-util` feature. Sends can be
//! held open to reproduce a send that is still in flight when its alarm
//! is cleared.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{NotificationGateway, Receipt};
use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub message: String,
    pub title: Option<String>,
}

pub struct RecordingGateway {
    sent: Mutex<Vec<SentNotification>>,
    cancelled: Mutex<Vec<Receipt>>,
    issue_receipts: AtomicBool,
    fail_sends: AtomicBool,
    fail_cancels: AtomicBool,
    receipt_counter: AtomicU32,
    gate: watch::Sender<bool>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    /// A gateway whose sends succeed without a receipt.
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            sent: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            issue_receipts: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_cancels: AtomicBool::new(false),
            receipt_counter: AtomicU32::new(0),
            gate,
        }
    }

    /// A gateway that returns receipts `r-1`, `r-2`, ... for each send.
    pub fn with_receipts() -> Self {
        let gateway = Self::new();
        gateway.issue_receipts.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }

    /// Block sends (after they are recorded) until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<Receipt> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(
        &self,
        message: &str,
        title: Option<&str>,
    ) -> Result<Option<Receipt>, GatewayError> {
        self.sent.lock().push(SentNotification {
            message: message.to_string(),
            title: title.map(str::to_string),
        });

        let mut gate = self.gate.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = gate.wait_for(|open| *open).await;

        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("send failure injected".to_string()));
        }
        if !self.issue_receipts.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let n = self.receipt_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(Receipt::new(format!("r-{n}"))))
    }

    async fn cancel(&self, receipt: &Receipt) -> Result<(), GatewayError> {
        self.cancelled.lock().push(receipt.clone());
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected(
                "cancel failure injected".to_string(),
            ));
        }
        Ok(())
    }
}
