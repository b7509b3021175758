//! Authority client implementations.
//!
//! The live client speaks HTTP to the tax authority; the mock client returns
//! canned replies for sandbox runs. Both sit behind [`AuthorityClient`] so the
//! submission pipeline never branches on the environment.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::payload::FiscalInvoice;

/// Authority endpoint path for sales submissions.
pub const SAVE_SALES_PATH: &str = "/trnsSales/saveSales";

/// Per-attempt transport failure, before retry handling.
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error("connection error: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Raw per-attempt reply: status and body, untouched.
#[derive(Debug, Clone)]
pub struct AuthorityReply {
    pub status: u16,
    pub body: String,
}

/// One submission attempt against the authority.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    async fn save_sales(&self, payload: &FiscalInvoice) -> Result<AuthorityReply, AuthorityError>;
}

/// Credentials carried in the request headers on every attempt.
#[derive(Debug, Clone)]
pub struct AuthorityCredentials {
    pub tpin: String,
    pub bhf_id: String,
    pub device_serial: String,
    /// Required by private mock endpoints, absent for the live authority.
    pub api_key: Option<Secret<String>>,
}

/// Live HTTP client for the tax authority.
pub struct HttpAuthorityClient {
    client: Client,
    endpoint: String,
    credentials: AuthorityCredentials,
    request_timeout: Duration,
}

impl HttpAuthorityClient {
    pub fn new(
        endpoint: String,
        credentials: AuthorityCredentials,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            credentials,
            request_timeout,
        }
    }
}

#[async_trait]
impl AuthorityClient for HttpAuthorityClient {
    async fn save_sales(&self, payload: &FiscalInvoice) -> Result<AuthorityReply, AuthorityError> {
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), SAVE_SALES_PATH);

        let mut request = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .header("Content-Type", "application/json")
            .header("TPIN", &self.credentials.tpin)
            .header("BhfId", &self.credentials.bhf_id)
            .header("DeviceSerialNo", &self.credentials.device_serial)
            .json(payload);
        if let Some(key) = &self.credentials.api_key {
            request = request.header("x-api-key", key.expose_secret());
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport)?;

        tracing::debug!(status = status, invc_no = %payload.invc_no, "authority reply");

        Ok(AuthorityReply { status, body })
    }
}

fn classify_transport(err: reqwest::Error) -> AuthorityError {
    if err.is_timeout() {
        AuthorityError::Timeout
    } else if err.is_connect() {
        AuthorityError::Connect(err.to_string())
    } else {
        AuthorityError::Transport(err.to_string())
    }
}

/// Canned authority for sandbox runs; mirrors the hosted mock's reply shapes.
pub struct MockAuthorityClient {
    accept: bool,
}

impl MockAuthorityClient {
    pub fn new(accept: bool) -> Self {
        Self { accept }
    }
}

#[async_trait]
impl AuthorityClient for MockAuthorityClient {
    async fn save_sales(&self, payload: &FiscalInvoice) -> Result<AuthorityReply, AuthorityError> {
        let reply = if self.accept {
            AuthorityReply {
                status: 200,
                body: json!({
                    "resultCd": "0000",
                    "resultMsg": "Invoice accepted",
                    "authorityReferenceId": format!("MOCK-{}", Uuid::new_v4().simple()),
                    "invoiceId": payload.invc_no,
                })
                .to_string(),
            }
        } else {
            AuthorityReply {
                status: 400,
                body: json!({
                    "resultCd": "400",
                    "resultMsg": "Invoice rejected by mock authority",
                    "invoiceId": payload.invc_no,
                })
                .to_string(),
            }
        };
        Ok(reply)
    }
}
