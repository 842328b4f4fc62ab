//! Refresh-token exchange
//!
//! POSTs the stored refresh token to `REFRESH_TOKEN_PATH` and returns the
//! new pair. This call goes straight to the transport: it never passes
//! through the client's 401 handling, so a rejected refresh cannot trigger
//! another refresh.

use common::Envelope;
use serde::{Deserialize, Serialize};

use crate::constants::{REFRESH_TOKEN_PATH, TOKEN_EXPIRES_IN};
use crate::credentials::CredentialPair;
use crate::error::{Error, Result};

/// Token fields in the `data` object of login and refresh responses.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenResponse> for CredentialPair {
    fn from(token: TokenResponse) -> Self {
        CredentialPair::new(token.access_token, token.refresh_token)
    }
}

/// Exchange a refresh token for a new credential pair.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<CredentialPair> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), REFRESH_TOKEN_PATH);
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "refreshToken": refresh,
            "token_expires_in": TOKEN_EXPIRES_IN,
        }))
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked or expired
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    let envelope = response
        .json::<Envelope<TokenResponse>>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;

    if !envelope.success {
        let message = envelope.error_message().unwrap_or("refresh not successful");
        return Err(Error::TokenExchange(message.to_owned()));
    }

    envelope
        .data
        .map(CredentialPair::from)
        .ok_or_else(|| Error::TokenExchange("refresh response has no data".into()))
}
