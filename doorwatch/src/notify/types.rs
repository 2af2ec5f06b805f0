use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider token identifying a sent alert that can be cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(String);

impl Receipt {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Form body of a send request.
#[derive(Debug, Serialize)]
pub(super) struct SendRequest<'a> {
    pub user: &'a str,
    pub token: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    pub priority: i8,
    pub retry: u64,
    pub expire: u64,
}

/// Form body of a cancel request.
#[derive(Debug, Serialize)]
pub(super) struct CancelRequest<'a> {
    pub user: &'a str,
    pub token: &'a str,
}

/// Provider response to a send request.
///
/// `status` is 1 on success. A `receipt` is only present for alerts sent
/// with acknowledgement-required priority.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(super) struct SendResponse {
    pub status: i64,
    pub request: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}
