//! Submission client: bounded retries with exponential backoff, then outcome
//! classification.
//!
//! The contract callers rely on: `submit` never returns an error. Transport
//! failures, authority rejections and exhausted retries all collapse into the
//! same [`SubmissionOutcome`] shape, differing only in status and message.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::time::sleep;

use super::authority::{AuthorityClient, AuthorityError, AuthorityReply};
use super::payload::FiscalInvoice;
use super::retry::{is_retryable_status, RetryPolicy};
use crate::models::SubmissionStatus;

/// Result code the authority uses for an accepted submission.
pub const ACCEPTED_RESULT_CODE: &str = "0000";

/// Which signal marks a 2xx authority reply as accepted.
///
/// Observed authority behaviour varies between deployments, so the rule is
/// configuration, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessRule {
    /// Any 2xx status is an acceptance regardless of body.
    HttpStatus,
    /// A 2xx body carrying `resultCd` must carry the accepted code; other
    /// codes are authority rejections.
    BodyResultCode,
}

impl SuccessRule {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "http-status" => Some(SuccessRule::HttpStatus),
            "body-result-code" => Some(SuccessRule::BodyResultCode),
            _ => None,
        }
    }
}

/// Terminal result of one submission attempt sequence.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    /// Authority body as JSON, the raw text wrapped in a JSON string, or an
    /// `{"error": ...}` object for transport failures.
    pub response: Value,
    pub message: Option<String>,
    pub authority_reference: Option<String>,
    /// HTTP attempts actually made.
    pub attempts: u32,
}

pub struct SubmissionClient {
    authority: Arc<dyn AuthorityClient>,
    retry: RetryPolicy,
    success_rule: SuccessRule,
}

impl SubmissionClient {
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        retry: RetryPolicy,
        success_rule: SuccessRule,
    ) -> Self {
        Self {
            authority,
            retry,
            success_rule,
        }
    }

    /// Submit one payload, retrying transient failures up to the policy's
    /// attempt ceiling. Always returns an outcome.
    #[tracing::instrument(skip(self, payload), fields(invc_no = %payload.invc_no))]
    pub async fn submit(&self, payload: &FiscalInvoice) -> SubmissionOutcome {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.authority.save_sales(payload).await {
                Ok(reply) => {
                    let status = StatusCode::from_u16(reply.status)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

                    if status.is_success() {
                        if attempt > 1 {
                            tracing::info!(attempt, "submission succeeded after retry");
                        }
                        return self.classify_accepted(&reply, attempt);
                    }

                    if is_retryable_status(status) && attempt < self.retry.max_attempts {
                        let backoff = self.retry.backoff_duration(attempt);
                        tracing::warn!(
                            attempt,
                            status = reply.status,
                            backoff_ms = backoff.as_millis() as u64,
                            "retryable authority status, backing off"
                        );
                        sleep(backoff).await;
                        continue;
                    }

                    let message = if is_retryable_status(status) {
                        format!(
                            "retries exhausted after {} attempts: authority returned HTTP {}",
                            attempt, reply.status
                        )
                    } else {
                        format!("authority returned HTTP {}", reply.status)
                    };
                    tracing::warn!(attempt, status = reply.status, "submission failed");
                    return error_outcome(body_value(&reply.body), message, attempt);
                }
                Err(err) => {
                    if attempt < self.retry.max_attempts {
                        let backoff = self.retry.backoff_duration(attempt);
                        tracing::warn!(
                            attempt,
                            error = %err,
                            backoff_ms = backoff.as_millis() as u64,
                            "transport failure, backing off"
                        );
                        sleep(backoff).await;
                        continue;
                    }

                    let class = match err {
                        AuthorityError::Timeout => "timeout",
                        AuthorityError::Connect(_) => "connection error",
                        AuthorityError::Transport(_) => "transport error",
                    };
                    let message = format!(
                        "retries exhausted after {} attempts: {} ({})",
                        attempt, class, err
                    );
                    tracing::warn!(attempt, error = %err, "submission failed");
                    return error_outcome(json!({ "error": message }), message.clone(), attempt);
                }
            }
        }
    }

    /// Classify a 2xx reply. A body that is not parseable JSON is still a
    /// success with the raw text captured, never a failure.
    fn classify_accepted(&self, reply: &AuthorityReply, attempts: u32) -> SubmissionOutcome {
        match serde_json::from_str::<Value>(&reply.body) {
            Ok(value) => {
                if self.success_rule == SuccessRule::BodyResultCode {
                    if let Some(code) = value.get("resultCd").and_then(Value::as_str) {
                        if code != ACCEPTED_RESULT_CODE {
                            let message =
                                format!("authority rejected submission: resultCd {}", code);
                            return error_outcome(value, message, attempts);
                        }
                    }
                }
                let authority_reference = extract_reference(&value);
                SubmissionOutcome {
                    status: SubmissionStatus::Success,
                    response: value,
                    message: None,
                    authority_reference,
                    attempts,
                }
            }
            Err(_) => SubmissionOutcome {
                status: SubmissionStatus::Success,
                response: Value::String(reply.body.clone()),
                message: None,
                authority_reference: None,
                attempts,
            },
        }
    }
}

fn error_outcome(response: Value, message: String, attempts: u32) -> SubmissionOutcome {
    SubmissionOutcome {
        status: SubmissionStatus::Error,
        response,
        message: Some(message),
        authority_reference: None,
        attempts,
    }
}

fn body_value(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn extract_reference(value: &Value) -> Option<String> {
    ["authorityReferenceId", "authority_reference"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::payload::{
        build_payload, InvoiceSource, SourceLineItem, StandardVatRule, NORMAL_SALE_CODE,
        SALE_RECEIPT_CODE, STANDARD_TAX_CODE,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a scripted sequence of per-attempt results; the last entry
    /// repeats once the script runs out.
    struct ScriptedAuthority {
        script: Mutex<VecDeque<Result<AuthorityReply, AuthorityError>>>,
        calls: AtomicU32,
    }

    impl ScriptedAuthority {
        fn new(script: Vec<Result<AuthorityReply, AuthorityError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthorityClient for ScriptedAuthority {
        async fn save_sales(
            &self,
            _payload: &FiscalInvoice,
        ) -> Result<AuthorityReply, AuthorityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script
                    .front()
                    .map_or_else(|| Ok(reply(200, r#"{"resultCd":"0000"}"#)), clone_result)
            }
        }
    }

    fn clone_result(
        result: &Result<AuthorityReply, AuthorityError>,
    ) -> Result<AuthorityReply, AuthorityError> {
        match result {
            Ok(r) => Ok(r.clone()),
            Err(AuthorityError::Timeout) => Err(AuthorityError::Timeout),
            Err(AuthorityError::Connect(msg)) => Err(AuthorityError::Connect(msg.clone())),
            Err(AuthorityError::Transport(msg)) => Err(AuthorityError::Transport(msg.clone())),
        }
    }

    fn reply(status: u16, body: &str) -> AuthorityReply {
        AuthorityReply {
            status,
            body: body.to_string(),
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    fn payload() -> FiscalInvoice {
        let src = InvoiceSource {
            tpin: "1000000000".to_string(),
            bhf_id: "000".to_string(),
            device_serial: "DEV-01".to_string(),
            invoice_number: "INV-1".to_string(),
            sale_date: NaiveDate::from_ymd_opt(2025, 9, 24).unwrap(),
            sale_type_code: NORMAL_SALE_CODE.to_string(),
            receipt_type_code: SALE_RECEIPT_CODE.to_string(),
            payment_type: None,
            customer_tpin: None,
            customer_name: None,
            total_taxable: Decimal::new(862, 2),
            total_tax: Decimal::new(138, 2),
            total_amount: Decimal::new(1000, 2),
            items: vec![SourceLineItem {
                item_code: "P000001".to_string(),
                item_name: "Nshima".to_string(),
                quantity: 1,
                unit_price: Decimal::new(1000, 2),
                tax_code: STANDARD_TAX_CODE.to_string(),
                taxable_amount: Decimal::new(862, 2),
                tax_amount: Decimal::new(138, 2),
                total_amount: Decimal::new(1000, 2),
            }],
        };
        build_payload(&src, &StandardVatRule).unwrap()
    }

    fn client(authority: Arc<ScriptedAuthority>, rule: SuccessRule) -> SubmissionClient {
        SubmissionClient::new(authority, quick_retry(), rule)
    }

    #[tokio::test]
    async fn accepted_body_is_success_with_reference() {
        let authority = Arc::new(ScriptedAuthority::new(vec![Ok(reply(
            200,
            r#"{"resultCd":"0000","authorityReferenceId":"TA_REF_123456"}"#,
        ))]));
        let outcome = client(authority.clone(), SuccessRule::BodyResultCode)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Success);
        assert_eq!(outcome.authority_reference.as_deref(), Some("TA_REF_123456"));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(authority.calls(), 1);
    }

    #[tokio::test]
    async fn permanent_503_attempts_exactly_three_times() {
        let authority = Arc::new(ScriptedAuthority::new(vec![Ok(reply(503, "unavailable"))]));
        let outcome = client(authority.clone(), SuccessRule::BodyResultCode)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Error);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(authority.calls(), 3);
        assert!(outcome.message.unwrap().contains("retries exhausted"));
    }

    #[tokio::test]
    async fn terminal_400_attempts_exactly_once() {
        let authority = Arc::new(ScriptedAuthority::new(vec![Ok(reply(
            400,
            r#"{"detail":"Rejected by mock authority"}"#,
        ))]));
        let outcome = client(authority.clone(), SuccessRule::BodyResultCode)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Error);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(authority.calls(), 1);
        assert!(outcome.message.unwrap().contains("HTTP 400"));
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let authority = Arc::new(ScriptedAuthority::new(vec![
            Ok(reply(503, "unavailable")),
            Err(AuthorityError::Timeout),
            Ok(reply(200, r#"{"resultCd":"0000"}"#)),
        ]));
        let outcome = client(authority.clone(), SuccessRule::BodyResultCode)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Success);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn exhausted_timeouts_name_the_failure_class() {
        let authority = Arc::new(ScriptedAuthority::new(vec![Err(AuthorityError::Timeout)]));
        let outcome = client(authority.clone(), SuccessRule::BodyResultCode)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Error);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.message.unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn body_result_code_rejection_is_terminal_error() {
        let authority = Arc::new(ScriptedAuthority::new(vec![Ok(reply(
            200,
            r#"{"resultCd":"9999","resultMsg":"invalid device"}"#,
        ))]));
        let outcome = client(authority.clone(), SuccessRule::BodyResultCode)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Error);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.message.unwrap().contains("resultCd 9999"));
    }

    #[tokio::test]
    async fn http_status_rule_ignores_body_result_code() {
        let authority = Arc::new(ScriptedAuthority::new(vec![Ok(reply(
            200,
            r#"{"resultCd":"9999"}"#,
        ))]));
        let outcome = client(authority, SuccessRule::HttpStatus)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Success);
    }

    #[tokio::test]
    async fn unparseable_2xx_body_is_success_with_raw_text() {
        let authority = Arc::new(ScriptedAuthority::new(vec![Ok(reply(200, "OK"))]));
        let outcome = client(authority, SuccessRule::BodyResultCode)
            .submit(&payload())
            .await;

        assert_eq!(outcome.status, SubmissionStatus::Success);
        assert_eq!(outcome.response, Value::String("OK".to_string()));
    }

    #[test]
    fn success_rule_parsing() {
        assert_eq!(SuccessRule::parse("http-status"), Some(SuccessRule::HttpStatus));
        assert_eq!(
            SuccessRule::parse("body-result-code"),
            Some(SuccessRule::BodyResultCode)
        );
        assert_eq!(SuccessRule::parse("other"), None);
    }
}
