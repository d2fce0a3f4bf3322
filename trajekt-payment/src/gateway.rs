use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use trajekt_domain::payment::PaymentChannel;

use crate::channels::{self, CustomerDetails};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Connection refused or 5xx: the gateway itself is in trouble
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    /// Transport failures and unreadable responses
    #[error("Gateway request failed: {0}")]
    Http(String),

    /// 4xx: the gateway understood us and said no. Never retried.
    #[error("Gateway rejected the request ({status_code}): {message}")]
    Rejected { status_code: String, message: String },

    #[error("Gateway request timed out: {0}")]
    Timeout(String),
}

impl GatewayError {
    pub fn retryable(&self) -> bool {
        !matches!(self, GatewayError::Rejected { .. })
    }
}

/// One virtual account as it appears in gateway payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaNumber {
    pub bank: String,
    pub va_number: String,
}

/// Gateway view of a transaction. The same shape comes back from charges,
/// status polls and callbacks; almost everything is optional because each
/// flow fills in a different subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub transaction_status: Option<String>,
    pub payment_type: Option<String>,
    pub status_code: Option<String>,
    pub status_message: Option<String>,
    /// Decimal string, e.g. "250000.00"
    pub gross_amount: Option<String>,
    pub signature_key: Option<String>,
    pub va_numbers: Option<Vec<VaNumber>>,
    pub permata_va_number: Option<String>,
    pub qr_string: Option<String>,
    pub expiry_time: Option<String>,
    /// Cumulative refunded amount as a decimal string
    pub refund_amount: Option<String>,
}

impl GatewayTransaction {
    pub fn va_number(&self) -> Option<&str> {
        self.va_numbers
            .as_ref()
            .and_then(|numbers| numbers.first())
            .map(|v| v.va_number.as_str())
            .or(self.permata_va_number.as_deref())
    }
}

/// Wire-level gateway operations, JSON in and out. `HttpTransport` is the
/// real one; `MockTransport` scripts responses for tests.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn charge(&self, payload: &Value) -> Result<Value, GatewayError>;
    async fn transaction_status(&self, order_id: &str) -> Result<Value, GatewayError>;
    async fn refund(&self, order_id: &str, payload: &Value) -> Result<Value, GatewayError>;
    async fn refund_status(&self, order_id: &str) -> Result<Value, GatewayError>;
    async fn cancel_refund(&self, order_id: &str) -> Result<Value, GatewayError>;
}

/// reqwest transport: basic auth with the server key, JSON bodies, bounded
/// request timeout.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    server_key: String,
}

impl HttpTransport {
    pub fn new(base_url: String, server_key: String, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            server_key,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.server_key, Some(""))
            .json(body)
            .send()
            .await
            .map_err(request_err)?;
        read_json(response).await
    }

    async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await
            .map_err(request_err)?;
        read_json(response).await
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn charge(&self, payload: &Value) -> Result<Value, GatewayError> {
        self.post("/v2/charge", payload).await
    }

    async fn transaction_status(&self, order_id: &str) -> Result<Value, GatewayError> {
        self.get(&format!("/v2/{order_id}/status")).await
    }

    async fn refund(&self, order_id: &str, payload: &Value) -> Result<Value, GatewayError> {
        self.post(&format!("/v2/{order_id}/refund"), payload).await
    }

    async fn refund_status(&self, order_id: &str) -> Result<Value, GatewayError> {
        self.get(&format!("/v2/{order_id}/refund/status")).await
    }

    async fn cancel_refund(&self, order_id: &str) -> Result<Value, GatewayError> {
        self.post(&format!("/v2/{order_id}/refund/cancel"), &Value::Null).await
    }
}

fn request_err(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(err.to_string())
    } else if err.is_connect() {
        GatewayError::Unavailable(err.to_string())
    } else {
        GatewayError::Http(err.to_string())
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    if status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Unavailable(format!("{status}: {body}")));
    }
    if !status.is_success() {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body
            .get("status_message")
            .and_then(Value::as_str)
            .unwrap_or("request rejected")
            .to_string();
        return Err(GatewayError::Rejected {
            status_code: status.as_u16().to_string(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| GatewayError::Http(format!("Unreadable gateway response: {e}")))
}

/// Backoff schedule for gateway calls: base_delay, 2x, 4x, ...
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given 1-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// What a charge attempt produced. With the gateway down this is a local
/// fallback reference the customer can still be shown; `is_fallback` marks
/// it as unconfirmed, and only a verified callback or poll settles it.
#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub transaction_id: Option<String>,
    pub va_number: Option<String>,
    pub qr_reference: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub is_fallback: bool,
    pub raw: Option<Value>,
}

/// Retrying front over a transport
pub struct PaymentGateway {
    transport: Arc<dyn GatewayTransport>,
    retry: RetryPolicy,
}

impl PaymentGateway {
    pub fn new(transport: Arc<dyn GatewayTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Open a transaction for an order. Infallible by design: when every
    /// attempt fails the customer still gets a locally derived reference,
    /// flagged so nothing downstream treats it as confirmed gateway state.
    pub async fn create_transaction(
        &self,
        order_id: &str,
        amount: i64,
        channel: &PaymentChannel,
        item_name: &str,
        customer: &CustomerDetails,
        expiry_minutes: i64,
    ) -> GatewayResult {
        let payload = channels::charge_payload(channel, order_id, amount, item_name, customer, expiry_minutes);
        let expires_at = Utc::now() + chrono::Duration::minutes(expiry_minutes);

        let raw = match self.with_retries("charge", || self.transport.charge(&payload)).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%order_id, error = %err, "charge failed on every attempt, issuing fallback reference");
                return fallback_result(order_id, channel, expires_at);
            }
        };

        match serde_json::from_value::<GatewayTransaction>(raw.clone()) {
            Ok(parsed) => GatewayResult {
                transaction_id: parsed.transaction_id.clone(),
                va_number: parsed.va_number().map(str::to_string),
                qr_reference: parsed.qr_string.clone(),
                expires_at,
                is_fallback: false,
                raw: Some(raw),
            },
            Err(err) => {
                warn!(%order_id, error = %err, "charge response unreadable, issuing fallback reference");
                fallback_result(order_id, channel, expires_at)
            }
        }
    }

    pub async fn get_status(&self, order_id: &str) -> Result<(GatewayTransaction, Value), GatewayError> {
        let raw = self
            .with_retries("status", || self.transport.transaction_status(order_id))
            .await?;
        let parsed = parse_transaction(&raw)?;
        Ok((parsed, raw))
    }

    pub async fn request_refund(
        &self,
        order_id: &str,
        amount: i64,
        reason: &str,
    ) -> Result<(GatewayTransaction, Value), GatewayError> {
        let payload = serde_json::json!({
            "refund_key": format!("rfd-{order_id}"),
            "amount": amount,
            "reason": reason,
        });
        let raw = self
            .with_retries("refund", || self.transport.refund(order_id, &payload))
            .await?;
        let parsed = parse_transaction(&raw)?;
        Ok((parsed, raw))
    }

    pub async fn refund_status(&self, order_id: &str) -> Result<(GatewayTransaction, Value), GatewayError> {
        let raw = self
            .with_retries("refund_status", || self.transport.refund_status(order_id))
            .await?;
        let parsed = parse_transaction(&raw)?;
        Ok((parsed, raw))
    }

    pub async fn cancel_refund(&self, order_id: &str) -> Result<(GatewayTransaction, Value), GatewayError> {
        let raw = self
            .with_retries("cancel_refund", || self.transport.cancel_refund(order_id))
            .await?;
        let parsed = parse_transaction(&raw)?;
        Ok((parsed, raw))
    }

    async fn with_retries<F, Fut>(&self, what: &str, mut call: F) -> Result<Value, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, GatewayError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(%what, attempt, error = %err, delay_ms = delay.as_millis() as u64, "gateway call failed, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn parse_transaction(raw: &Value) -> Result<GatewayTransaction, GatewayError> {
    serde_json::from_value(raw.clone())
        .map_err(|e| GatewayError::Http(format!("Unreadable gateway response: {e}")))
}

fn fallback_result(order_id: &str, channel: &PaymentChannel, expires_at: DateTime<Utc>) -> GatewayResult {
    let (va_number, qr_reference) = match channel {
        PaymentChannel::VirtualAccount { .. } => (Some(fallback_va_number(order_id)), None),
        PaymentChannel::Qris => (None, Some(fallback_qr_reference(order_id))),
        _ => (None, None),
    };
    GatewayResult {
        transaction_id: None,
        va_number,
        qr_reference,
        expires_at,
        is_fallback: true,
        raw: None,
    }
}

/// Deterministic pseudo VA for gateway outages: a fixed prefix plus digits
/// derived from the order id, so a retried creation yields the same number
pub fn fallback_va_number(order_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    let digest = hasher.finalize();
    let digits: String = digest.iter().take(13).map(|b| char::from(b'0' + b % 10)).collect();
    format!("988{digits}")
}

pub fn fallback_qr_reference(order_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    let digest = hasher.finalize();
    let tail: String = digest.iter().take(8).map(|b| format!("{b:02X}")).collect();
    format!("QR-UNAVAILABLE-{tail}")
}

/// Scripted transport for tests: responses are served in push order, calls
/// are recorded by name.
pub struct MockTransport {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<Value, GatewayError>>>,
    calls: parking_lot::Mutex<Vec<String>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            responses: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }
}

impl MockTransport {
    pub fn push(&self, response: Result<Value, GatewayError>) {
        self.responses.lock().push_back(response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn next(&self, call: String) -> Result<Value, GatewayError> {
        self.calls.lock().push(call);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Unavailable("no scripted response".to_string())))
    }
}

#[async_trait]
impl GatewayTransport for MockTransport {
    async fn charge(&self, _payload: &Value) -> Result<Value, GatewayError> {
        self.next("charge".to_string())
    }

    async fn transaction_status(&self, order_id: &str) -> Result<Value, GatewayError> {
        self.next(format!("status:{order_id}"))
    }

    async fn refund(&self, order_id: &str, _payload: &Value) -> Result<Value, GatewayError> {
        self.next(format!("refund:{order_id}"))
    }

    async fn refund_status(&self, order_id: &str) -> Result<Value, GatewayError> {
        self.next(format!("refund_status:{order_id}"))
    }

    async fn cancel_refund(&self, order_id: &str) -> Result<Value, GatewayError> {
        self.next(format!("cancel_refund:{order_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trajekt_domain::payment::Bank;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn customer() -> CustomerDetails {
        CustomerDetails {
            first_name: "Siti".to_string(),
            email: "siti@example.com".to_string(),
            phone: None,
        }
    }

    fn va_channel() -> PaymentChannel {
        PaymentChannel::VirtualAccount { bank: Bank::Bca }
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_fallback_references_are_deterministic() {
        let va = fallback_va_number("TRJ-AAAA2222");
        assert_eq!(va, fallback_va_number("TRJ-AAAA2222"));
        assert_eq!(va.len(), 16);
        assert!(va.starts_with("988"));
        assert!(va.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(va, fallback_va_number("TRJ-BBBB3333"));

        let qr = fallback_qr_reference("TRJ-AAAA2222");
        assert!(qr.starts_with("QR-UNAVAILABLE-"));
        assert_eq!(qr, fallback_qr_reference("TRJ-AAAA2222"));
    }

    #[tokio::test]
    async fn test_charge_retries_then_succeeds() {
        let transport = Arc::new(MockTransport::default());
        transport.push(Err(GatewayError::Unavailable("503".to_string())));
        transport.push(Ok(json!({
            "order_id": "TRJ-AAAA2222",
            "transaction_id": "tx-1",
            "transaction_status": "pending",
            "va_numbers": [{"bank": "bca", "va_number": "23012345678"}],
        })));

        let gateway = PaymentGateway::new(transport.clone(), fast_retry());
        let result = gateway
            .create_transaction("TRJ-AAAA2222", 250_000, &va_channel(), "Merak - Bakauheni", &customer(), 5)
            .await;

        assert!(!result.is_fallback);
        assert_eq!(result.va_number.as_deref(), Some("23012345678"));
        assert_eq!(result.transaction_id.as_deref(), Some("tx-1"));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_charge_exhaustion_falls_back() {
        let transport = Arc::new(MockTransport::default());
        for _ in 0..3 {
            transport.push(Err(GatewayError::Timeout("deadline".to_string())));
        }

        let gateway = PaymentGateway::new(transport.clone(), fast_retry());
        let result = gateway
            .create_transaction("TRJ-AAAA2222", 250_000, &va_channel(), "Merak - Bakauheni", &customer(), 5)
            .await;

        assert!(result.is_fallback);
        assert_eq!(result.va_number.as_deref(), Some(fallback_va_number("TRJ-AAAA2222").as_str()));
        assert!(result.transaction_id.is_none());
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_qris_fallback_uses_placeholder_reference() {
        let transport = Arc::new(MockTransport::default());
        for _ in 0..3 {
            transport.push(Err(GatewayError::Unavailable("down".to_string())));
        }

        let gateway = PaymentGateway::new(transport, fast_retry());
        let result = gateway
            .create_transaction("TRJ-AAAA2222", 50_000, &PaymentChannel::Qris, "Ketapang - Gilimanuk", &customer(), 5)
            .await;

        assert!(result.is_fallback);
        assert!(result.va_number.is_none());
        assert!(result.qr_reference.as_deref().is_some_and(|qr| qr.starts_with("QR-UNAVAILABLE-")));
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let transport = Arc::new(MockTransport::default());
        transport.push(Err(GatewayError::Rejected {
            status_code: "401".to_string(),
            message: "unauthorized".to_string(),
        }));

        let gateway = PaymentGateway::new(transport.clone(), fast_retry());
        let err = gateway.get_status("TRJ-AAAA2222").await.unwrap_err();

        assert!(matches!(err, GatewayError::Rejected { .. }));
        assert_eq!(transport.calls(), vec!["status:TRJ-AAAA2222".to_string()]);
    }

    #[tokio::test]
    async fn test_status_parses_wire_shape() {
        let transport = Arc::new(MockTransport::default());
        transport.push(Ok(json!({
            "order_id": "TRJ-AAAA2222",
            "transaction_status": "settlement",
            "payment_type": "bank_transfer",
            "status_code": "200",
            "gross_amount": "250000.00",
            "signature_key": "abc",
        })));

        let gateway = PaymentGateway::new(transport, fast_retry());
        let (tx, raw) = gateway.get_status("TRJ-AAAA2222").await.unwrap();

        assert_eq!(tx.transaction_status.as_deref(), Some("settlement"));
        assert_eq!(tx.gross_amount.as_deref(), Some("250000.00"));
        assert_eq!(raw["status_code"], "200");
    }
}
