//! Pushover notification gateway.

use async_trait::async_trait;

use super::NotificationGateway;
use super::types::{CancelRequest, Receipt, SendRequest, SendResponse};
use crate::config::PushoverConfig;
use crate::error::GatewayError;
use crate::tracing::prelude::*;

pub struct PushoverGateway {
    config: PushoverConfig,
    http: reqwest::Client,
}

impl PushoverGateway {
    pub fn new(config: PushoverConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self::with_client(config, http))
    }

    /// Use a preconfigured HTTP client. The configured timeout is not
    /// applied.
    pub fn with_client(config: PushoverConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn cancel_url(&self, receipt: &Receipt) -> String {
        format!("{}/{}/cancel.json", self.config.receipts_url, receipt)
    }
}

/// Turn a non-2xx response into an error carrying the body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl NotificationGateway for PushoverGateway {
    async fn send(
        &self,
        message: &str,
        title: Option<&str>,
    ) -> Result<Option<Receipt>, GatewayError> {
        let request = SendRequest {
            user: &self.config.user_key,
            token: &self.config.app_token,
            message,
            title,
            priority: self.config.priority,
            retry: self.config.retry.as_secs(),
            expire: self.config.expire.as_secs(),
        };

        let response = self
            .http
            .post(&self.config.messages_url)
            .form(&request)
            .send()
            .await?;
        let response: SendResponse = check_status(response).await?.json().await?;

        if response.status != 1 {
            return Err(GatewayError::Rejected(response.errors.join("; ")));
        }

        let receipt = response
            .receipt
            .filter(|r| !r.is_empty())
            .map(Receipt::new);

        debug!(
            request = %response.request,
            receipt = ?receipt,
            "Notification sent"
        );

        Ok(receipt)
    }

    async fn cancel(&self, receipt: &Receipt) -> Result<(), GatewayError> {
        let request = CancelRequest {
            user: &self.config.user_key,
            token: &self.config.app_token,
        };

        let response = self
            .http
            .post(self.cancel_url(receipt))
            .form(&request)
            .send()
            .await?;
        check_status(response).await?;

        debug!(receipt = %receipt, "Notification cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        Form, Json, Router,
        extract::{Path, State},
        http::StatusCode,
        routing::post,
    };
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;

    type Fields = HashMap<String, String>;

    /// What the fake provider saw and how it should answer.
    #[derive(Default)]
    struct Provider {
        sends: Mutex<Vec<Fields>>,
        cancels: Mutex<Vec<(String, Fields)>>,
        send_reply: Mutex<Option<(StatusCode, Value)>>,
        cancel_status: Mutex<Option<StatusCode>>,
    }

    async fn messages(
        State(provider): State<Arc<Provider>>,
        Form(form): Form<Fields>,
    ) -> (StatusCode, Json<Value>) {
        provider.sends.lock().push(form);
        let (status, body) = provider
            .send_reply
            .lock()
            .clone()
            .unwrap_or((StatusCode::OK, json!({"status": 1, "request": "req-1"})));
        (status, Json(body))
    }

    async fn cancel(
        State(provider): State<Arc<Provider>>,
        Path(receipt): Path<String>,
        Form(form): Form<Fields>,
    ) -> (StatusCode, Json<Value>) {
        provider.cancels.lock().push((receipt, form));
        let status = provider.cancel_status.lock().unwrap_or(StatusCode::OK);
        (status, Json(json!({"status": 1, "request": "req-2"})))
    }

    /// Start a fake provider and a gateway pointed at it.
    async fn start() -> (PushoverGateway, Arc<Provider>) {
        let provider = Arc::new(Provider::default());
        let app = Router::new()
            .route("/1/messages.json", post(messages))
            .route("/1/receipts/{receipt}/cancel.json", post(cancel))
            .with_state(provider.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = PushoverConfig {
            messages_url: format!("http://{addr}/1/messages.json"),
            receipts_url: format!("http://{addr}/1/receipts"),
            user_key: "user-key".to_string(),
            app_token: "app-token".to_string(),
            priority: 2,
            retry: Duration::from_secs(60),
            expire: Duration::from_secs(3600),
            timeout: Duration::from_secs(5),
        };
        (gateway(config), provider)
    }

    fn gateway(config: PushoverConfig) -> PushoverGateway {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .build()
            .unwrap();
        PushoverGateway::with_client(config, http)
    }

    #[tokio::test]
    async fn send_posts_credentials_and_parameters() {
        let (gateway, provider) = start().await;

        let receipt = gateway
            .send("front has been open", Some("front left open"))
            .await
            .unwrap();

        assert_eq!(receipt, None);
        let sends = provider.sends.lock();
        assert_eq!(sends.len(), 1);
        let form = &sends[0];
        assert_eq!(form["user"], "user-key");
        assert_eq!(form["token"], "app-token");
        assert_eq!(form["message"], "front has been open");
        assert_eq!(form["title"], "front left open");
        assert_eq!(form["priority"], "2");
        assert_eq!(form["retry"], "60");
        assert_eq!(form["expire"], "3600");
    }

    #[tokio::test]
    async fn send_without_title_omits_field() {
        let (gateway, provider) = start().await;

        gateway.send("hello", None).await.unwrap();

        assert!(!provider.sends.lock()[0].contains_key("title"));
    }

    #[tokio::test]
    async fn send_returns_receipt_when_present() {
        let (gateway, provider) = start().await;
        *provider.send_reply.lock() = Some((
            StatusCode::OK,
            json!({"status": 1, "request": "req-1", "receipt": "r-123"}),
        ));

        let receipt = gateway.send("hello", None).await.unwrap();

        assert_eq!(receipt, Some(Receipt::new("r-123")));
    }

    #[tokio::test]
    async fn send_reports_http_errors() {
        let (gateway, provider) = start().await;
        *provider.send_reply.lock() = Some((
            StatusCode::BAD_REQUEST,
            json!({"status": 0, "request": "req-1", "errors": ["user key is invalid"]}),
        ));

        let err = gateway.send("hello", None).await.unwrap_err();

        assert!(matches!(err, GatewayError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn send_reports_provider_rejection() {
        let (gateway, provider) = start().await;
        *provider.send_reply.lock() = Some((
            StatusCode::OK,
            json!({"status": 0, "request": "req-1", "errors": ["message cannot be blank"]}),
        ));

        let err = gateway.send("", None).await.unwrap_err();

        match err {
            GatewayError::Rejected(reason) => assert_eq!(reason, "message cannot be blank"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn send_reports_unreachable_provider() {
        let config = PushoverConfig {
            // Port 9 (discard) on localhost is not expected to be listening.
            messages_url: "http://127.0.0.1:9/1/messages.json".to_string(),
            timeout: Duration::from_secs(2),
            ..PushoverConfig::default()
        };
        let gateway = gateway(config);

        let err = gateway.send("hello", None).await.unwrap_err();

        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn cancel_posts_to_receipt_endpoint() {
        let (gateway, provider) = start().await;

        gateway.cancel(&Receipt::new("r-123")).await.unwrap();

        let cancels = provider.cancels.lock();
        assert_eq!(cancels.len(), 1);
        let (receipt, form) = &cancels[0];
        assert_eq!(receipt, "r-123");
        assert_eq!(form["user"], "user-key");
        assert_eq!(form["token"], "app-token");
    }

    #[tokio::test]
    async fn cancel_reports_http_errors() {
        let (gateway, provider) = start().await;
        *provider.cancel_status.lock() = Some(StatusCode::NOT_FOUND);

        let err = gateway.cancel(&Receipt::new("r-123")).await.unwrap_err();

        assert!(matches!(err, GatewayError::Status { status: 404, .. }));
    }
}
