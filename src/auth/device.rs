//! Device authorization flow.
//!
//! 1. `request_authorization` asks the service for a device code and a
//!    short user code.
//! 2. The user enters the code at the verification URL.
//! 3. `poll_for_credential` polls once per interval until the service hands
//!    out a token, reports a hard error, or the code expires.

use crate::api::client::{decode_json, protocol_error};
use crate::api::types::{DeviceCodeResponse, DeviceTokenResponse, ErrorEnvelope};
use crate::api::{ApiRequest, ApiResponse, Transport};
use crate::error::{Error, Result};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Error code the poll endpoint returns until the user approves
pub const AUTHORIZATION_PENDING: &str = "authorization_pending";

/// Lower bound for the poll interval
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound for how long a device code is honored, whatever the service says
pub const MAX_AUTHORIZATION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// One login attempt, discarded after a terminal poll outcome.
#[derive(Debug, Clone)]
pub struct DeviceAuthorizationSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub issued_at: Instant,
    pub expires_at: Instant,
    pub interval: Duration,
}

impl DeviceAuthorizationSession {
    pub fn new(response: DeviceCodeResponse, issued_at: Instant) -> Self {
        Self {
            device_code: response.device_code,
            user_code: response.user_code,
            verification_url: response.verification_url,
            issued_at,
            expires_at: issued_at + Duration::from_secs(response.expires_in).min(MAX_AUTHORIZATION_LIFETIME),
            interval: Duration::from_secs(response.interval).max(MIN_POLL_INTERVAL),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Result of a single poll request
enum PollStep {
    Authorized(DeviceTokenResponse),
    /// Not authorized yet, or a transient failure; try again next tick
    Retry(String),
}

fn print_progress_marker() {
    eprint!(".");
    let _ = std::io::stderr().flush();
}

pub struct DeviceAuthenticator {
    transport: Arc<dyn Transport>,
    progress: fn(),
}

impl DeviceAuthenticator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            progress: print_progress_marker,
        }
    }

    /// Replace the progress marker printed on every retried poll.
    pub fn with_progress(mut self, progress: fn()) -> Self {
        self.progress = progress;
        self
    }

    /// Start a device authorization session.
    pub async fn request_authorization(&self) -> Result<DeviceAuthorizationSession> {
        let response = self.transport.send(ApiRequest::post("/auth/device")).await?;
        if !response.is_success() {
            return Err(protocol_error(&response));
        }

        let parsed: DeviceCodeResponse = decode_json(&response)?;
        let session = DeviceAuthorizationSession::new(parsed, Instant::now());

        tracing::debug!(
            "Device code issued, expires in {}s, polling every {}s",
            (session.expires_at - session.issued_at).as_secs(),
            session.interval.as_secs()
        );

        Ok(session)
    }

    /// Poll until the user authorizes the session or it expires.
    ///
    /// Transport failures and `authorization_pending` are retried on the next
    /// tick with no backoff; any other error code ends the loop.
    pub async fn poll_for_credential(
        &self,
        session: &DeviceAuthorizationSession,
    ) -> Result<DeviceTokenResponse> {
        let timeout = |now: Instant| Error::Timeout {
            waited_secs: now.saturating_duration_since(session.issued_at).as_secs(),
        };

        loop {
            let now = Instant::now();
            if session.is_expired(now) {
                return Err(timeout(now));
            }

            // Never sleep past the deadline
            tokio::time::sleep(session.interval.min(session.expires_at - now)).await;

            let now = Instant::now();
            if session.is_expired(now) {
                return Err(timeout(now));
            }

            match self.poll_once(session).await? {
                PollStep::Authorized(token) => {
                    tracing::info!("Device authorization complete");
                    return Ok(token);
                }
                PollStep::Retry(reason) => {
                    tracing::debug!("Poll not ready: {}", reason);
                    (self.progress)();
                }
            }
        }
    }

    async fn poll_once(&self, session: &DeviceAuthorizationSession) -> Result<PollStep> {
        let request = ApiRequest::post("/auth/device/poll")
            .json(json!({ "device_code": session.device_code }));

        let response: ApiResponse = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) if e.is_transient() => return Ok(PollStep::Retry(e.to_string())),
            Err(e) => return Err(e),
        };

        if response.is_success() {
            return decode_json(&response).map(PollStep::Authorized);
        }

        match serde_json::from_slice::<ErrorEnvelope>(&response.body) {
            Ok(envelope) if envelope.error.code == AUTHORIZATION_PENDING => {
                Ok(PollStep::Retry(AUTHORIZATION_PENDING.to_string()))
            }
            _ => Err(protocol_error(&response)),
        }
    }
}
