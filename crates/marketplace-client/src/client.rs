//! Authenticated HTTP client
//!
//! Attaches `Authorization: Bearer <access token>` (read fresh from storage
//! on every call) and, when the server answers 401, exchanges the refresh
//! token for a new pair and resends the original request exactly once.
//!
//! Concurrent requests are not coordinated: two requests that both see a
//! 401 each run their own refresh, and whichever stores its pair last wins.

use std::sync::Arc;
use std::time::Duration;

use common::{Envelope, Secret};
use marketplace_auth::{CredentialPair, CredentialStore, KeyValueStore};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::metrics;
use crate::request::{ApiRequest, Attempt, RequestBody};

/// Transport timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the per-call correlation id, shared by original and retry
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Connection settings, fixed for the client's lifetime.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client with bearer attachment and single-shot credential renewal.
///
/// Cloning shares the connection pool and the credential store.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
}

impl AuthenticatedClient {
    pub fn new(options: ClientOptions, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Transport(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_owned(),
            credentials: CredentialStore::new(store),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Send a request, renewing credentials once on 401.
    ///
    /// Returns the response unchanged on 2xx. A 401 on a renewable request
    /// triggers one refresh; if the refresh token is missing or rejected the
    /// credentials are cleared and the call fails with `AuthExpired`. A 401
    /// after the retry, or from a non-renewable request, is returned as
    /// `Server { status: 401 }`. Other non-2xx responses come back as
    /// `Server` with the envelope's message when it has one.
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let request_id = Uuid::new_v4().to_string();
        self.send_with_id(request, request_id).await
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.path()))]
    async fn send_with_id(
        &self,
        request: &ApiRequest,
        request_id: String,
    ) -> Result<reqwest::Response> {
        let mut token = self.credentials.access_token().await?;
        let mut attempt = Attempt::Initial;

        loop {
            let response = self.dispatch(request, token.as_ref(), &request_id).await?;
            let status = response.status();
            metrics::record_request(request.method().as_str(), status.as_u16());

            if status != StatusCode::UNAUTHORIZED
                || !request.is_renewable()
                || !attempt.may_refresh()
            {
                return check_status(response).await;
            }

            let message = error_message(response).await;
            debug!(?attempt, message = ?message, "unauthorized, renewing credentials");
            let pair = self.renew(message).await?;
            token = Some(pair.access);
            attempt = Attempt::Retried;
        }
    }

    /// Exchange the stored refresh token and persist the new pair.
    ///
    /// Any failure clears the stored credentials. `message` is the 401's
    /// server wording, kept on the resulting `AuthExpired`.
    async fn renew(&self, message: Option<String>) -> Result<CredentialPair> {
        let Some(refresh) = self.credentials.refresh_token().await? else {
            warn!("no refresh token stored, clearing credentials");
            self.expire().await;
            metrics::record_refresh("missing");
            return Err(Error::AuthExpired {
                reason: "no refresh token stored".into(),
                message,
            });
        };

        match marketplace_auth::refresh_token(&self.http, &self.base_url, refresh.expose()).await {
            Ok(pair) => {
                self.credentials.store(&pair).await?;
                metrics::record_refresh("success");
                info!("credentials refreshed");
                Ok(pair)
            }
            Err(e) => {
                warn!(error = %e, "credential refresh failed, clearing credentials");
                self.expire().await;
                metrics::record_refresh("failure");
                Err(Error::AuthExpired {
                    reason: e.to_string(),
                    message,
                })
            }
        }
    }

    async fn expire(&self) {
        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "failed to clear credentials");
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&Secret<String>>,
        request_id: &str,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .header(REQUEST_ID_HEADER, request_id);

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token.bearer());
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(fields) => builder.multipart(ApiRequest::build_form(fields)?),
        };

        builder.send().await.map_err(|e| {
            warn!(error = %e, "request failed before a response arrived");
            Error::Transport(e.to_string())
        })
    }
}

/// Pass 2xx through; turn anything else into `Error::Server`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = error_message(response).await;
    debug!(status = status.as_u16(), message = ?message, "server returned error");
    Err(Error::Server {
        status: status.as_u16(),
        message,
    })
}

/// Server wording from an error body, if it has one.
async fn error_message(response: reqwest::Response) -> Option<String> {
    let body = response.text().await.unwrap_or_default();
    Envelope::<serde_json::Value>::message_in(&body)
}
