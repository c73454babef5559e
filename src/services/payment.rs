//! payment.rs
//!
//! Service layer for the external payment gateway. The ledger only consumes
//! the refund *outcome*: a non-success response is a hard stop and nothing
//! in the store is mutated.
//!
//! Key pieces:
//! 1. **CircuitBreaker**: keeps a flapping gateway from being hammered;
//!    refund attempts fail fast while the circuit is open.
//! 2. **RefundReasonCode**: the gateway accepts a small fixed code set; the
//!    ledger's free-text reasons are mapped onto it before calling out.
//! 3. **HttpPaymentGateway**: the reqwest client with SHA-256 request-token
//!    signing, implementing the `PaymentGateway` trait the ledger depends on.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests allowed.
    Closed,
    /// Tripped after repeated failures; requests are blocked until the
    /// timeout elapses.
    Open,
    /// One probe request is allowed through to test recovery.
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: RwLock<BreakerInner>,
    failure_count: AtomicU32,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            inner: RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                last_failure: None,
            }),
            failure_count: AtomicU32::new(0),
            failure_threshold,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let timed_out = inner
                    .last_failure
                    .map(|at| at.elapsed() >= self.timeout)
                    .unwrap_or(true);
                if timed_out {
                    inner.state = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.state == CircuitState::HalfOpen {
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
        inner.state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed if failures >= self.failure_threshold => {
                inner.state = CircuitState::Open;
                error!(
                    "Circuit breaker OPENED - {} failures reached threshold {}",
                    failures, self.failure_threshold
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn current_state(&self) -> CircuitState {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).state
    }
}

/// Fixed reason-code set the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReasonCode {
    RequestedByCustomer,
    Duplicate,
    VenueClosure,
    Goodwill,
    Other,
}

impl RefundReasonCode {
    /// Maps a free-text staff reason onto the fixed code set. Unknown
    /// phrasings land on `Other`; the original text stays on the audit
    /// record.
    pub fn from_free_text(reason: &str) -> Self {
        let reason = reason.to_lowercase();
        if reason.contains("duplicate") || reason.contains("double charge") {
            Self::Duplicate
        } else if reason.contains("closure")
            || reason.contains("closed")
            || reason.contains("maintenance")
        {
            Self::VenueClosure
        } else if reason.contains("goodwill")
            || reason.contains("complaint")
            || reason.contains("apology")
        {
            Self::Goodwill
        } else if reason.contains("customer") || reason.contains("request") {
            Self::RequestedByCustomer
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestedByCustomer => "requested_by_customer",
            Self::Duplicate => "duplicate",
            Self::VenueClosure => "venue_closure",
            Self::Goodwill => "goodwill",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment gateway temporarily unavailable")]
    CircuitOpen,
    /// The gateway answered and said no; message passed through verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("payment gateway unreachable: {0}")]
    Transport(String),
}

/// Successful refund outcome as reported by the gateway.
#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub refund_ref: String,
    pub amount: i64,
    pub status: String,
}

/// The one outbound payment contract the ledger consumes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn refund(
        &self,
        payment_ref: &str,
        amount_minor_units: i64,
        reason: RefundReasonCode,
    ) -> Result<RefundReceipt, PaymentError>;
}

// --- Gateway API wire types ---

#[derive(Debug, Serialize)]
struct RefundRequest {
    #[serde(rename = "merchantId")]
    merchant_id: String,
    token: String,
    #[serde(rename = "paymentId")]
    payment_id: String,
    amount: i64,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    success: bool,
    #[serde(rename = "refundId")]
    refund_id: Option<String>,
    amount: Option<i64>,
    status: Option<String>,
    message: Option<String>,
}

/// HTTP client for the payment gateway's refund API.
pub struct HttpPaymentGateway {
    merchant_id: String,
    password: String,
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
}

impl HttpPaymentGateway {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            merchant_id: payment.merchant_id.clone(),
            password: payment.merchant_password.clone(),
            base_url: payment.gateway_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to create HTTP client"),
            circuit_breaker: CircuitBreaker::new(breaker.failure_threshold, breaker.timeout_seconds),
        }
    }

    /// Request token: SHA-256 over amount, payment id, merchant secret and id.
    fn generate_refund_token(&self, amount: i64, payment_id: &str) -> String {
        let token_string = format!(
            "{}{}{}{}",
            amount, payment_id, self.password, self.merchant_id
        );
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.current_state()
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn refund(
        &self,
        payment_ref: &str,
        amount_minor_units: i64,
        reason: RefundReasonCode,
    ) -> Result<RefundReceipt, PaymentError> {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking refund request");
            return Err(PaymentError::CircuitOpen);
        }

        let request = RefundRequest {
            merchant_id: self.merchant_id.clone(),
            token: self.generate_refund_token(amount_minor_units, payment_ref),
            payment_id: payment_ref.to_string(),
            amount: amount_minor_units,
            reason: reason.as_str().to_string(),
        };

        info!(
            "Requesting refund: payment_ref={}, amount={}, reason={}",
            payment_ref,
            amount_minor_units,
            reason.as_str()
        );

        let response = self
            .http_client
            .post(format!("{}/api/v1/PaymentRefund/refund", self.base_url))
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!("Payment gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                return Err(PaymentError::Transport(e.to_string()));
            }
        };

        let body: RefundResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                self.circuit_breaker.record_failure();
                return Err(PaymentError::Transport(e.to_string()));
            }
        };

        // The gateway answered; the circuit only tracks reachability.
        self.circuit_breaker.record_success();

        if !body.success {
            let message = body
                .message
                .unwrap_or_else(|| "refund declined".to_string());
            return Err(PaymentError::Rejected(message));
        }

        Ok(RefundReceipt {
            refund_ref: body.refund_id.unwrap_or_default(),
            amount: body.amount.unwrap_or(amount_minor_units),
            status: body.status.unwrap_or_else(|| "REFUNDED".to_string()),
        })
    }
}
