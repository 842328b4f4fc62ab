//! Marketplace endpoints
//!
//! One method per endpoint, each building an `ApiRequest`, sending it through
//! the `AuthenticatedClient`, and decoding the `{ success, data, error,
//! pagination }` envelope. A 2xx envelope with `success: false` becomes
//! `Error::Rejected`.

use common::{Envelope, Secret};
use marketplace_auth::{CredentialPair, TOKEN_EXPIRES_IN, TokenResponse};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::AuthenticatedClient;
use crate::error::{Error, Result};
use crate::models::{NewProduct, Page, Product, ProductUpdate, ProfileUpdate, SignupRequest, User};
use crate::request::ApiRequest;

/// `data` of profile responses
#[derive(Debug, Deserialize)]
struct ProfileData {
    user: User,
}

/// `data` of OTP verification; tokens present when the server signs the user in
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerificationData {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// `/api/products/<id>` with the id encoded as a single path segment.
fn product_path(id: &str) -> String {
    format!("/api/products/{}", urlencoding::encode(id))
}

/// Typed access to every marketplace endpoint.
#[derive(Clone)]
pub struct MarketplaceApi {
    client: AuthenticatedClient,
}

impl MarketplaceApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    // --- Auth ---

    /// Register an account. The server mails an OTP to confirm it.
    pub async fn signup(&self, request: &SignupRequest) -> Result<()> {
        let request = ApiRequest::post("/api/auth/signup").multipart(request.form_fields());
        self.acknowledge(request, "signup rejected").await
    }

    /// Confirm an email with its OTP.
    ///
    /// Returns the credential pair when the server signs the user in as part
    /// of verification, `None` when a separate login is required.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Option<CredentialPair>> {
        let request = ApiRequest::post("/api/auth/verify-otp")
            .json(serde_json::json!({ "email": email, "otp": otp }));
        let envelope: Envelope<VerificationData> =
            self.envelope(request, "verification rejected").await?;
        let data = envelope.data.unwrap_or_default();
        Ok(match (data.access_token, data.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(CredentialPair::new(access, refresh))
            }
            _ => None,
        })
    }

    pub async fn resend_otp(&self, email: &str) -> Result<()> {
        let request = ApiRequest::post("/api/auth/resend-verification-otp")
            .json(serde_json::json!({ "email": email }));
        self.acknowledge(request, "resend rejected").await
    }

    /// Exchange email and password for a credential pair. Does not store it.
    pub async fn login(&self, email: &str, password: &Secret<String>) -> Result<CredentialPair> {
        let request = ApiRequest::post("/api/auth/login")
            .json(serde_json::json!({
                "email": email,
                "password": password.expose(),
                "token_expires_in": TOKEN_EXPIRES_IN,
            }))
            .credential_exchange();
        let token: TokenResponse = self.data(request, "login rejected").await?;
        Ok(token.into())
    }

    /// Revoke the stored refresh token on the server, then clear storage.
    ///
    /// Storage is cleared whatever the server says. With nothing stored no
    /// request is made, so logging out twice is harmless.
    pub async fn logout(&self) -> Result<()> {
        let credentials = self.client.credentials();
        let result = match credentials.refresh_token().await? {
            Some(refresh) => {
                let request = ApiRequest::post("/api/auth/logout")
                    .json(serde_json::json!({ "refreshToken": refresh.expose() }));
                self.client.send(&request).await.map(drop)
            }
            None => {
                debug!("no refresh token stored, skipping server logout");
                Ok(())
            }
        };
        credentials.clear().await?;

        match result {
            // Session already gone server-side; the goal is reached
            Err(Error::AuthExpired { reason, .. }) => {
                warn!(reason = %reason, "logout found session already expired");
                Ok(())
            }
            other => other,
        }
    }

    /// Ask the server to mail a password reset link.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let request = ApiRequest::post("/api/auth/forgot-password")
            .json(serde_json::json!({ "email": email }));
        self.acknowledge(request, "password reset rejected").await
    }

    // --- Profile ---

    /// Own profile when `user_id` is `None`, another user's otherwise.
    pub async fn get_profile(&self, user_id: Option<&str>) -> Result<User> {
        let path = match user_id {
            Some(id) => format!("/api/user/profile/{}", urlencoding::encode(id)),
            None => "/api/user/profile".to_owned(),
        };
        let data: ProfileData = self.data(ApiRequest::get(path), "profile not available").await?;
        Ok(data.user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let request = ApiRequest::put("/api/user/profile").multipart(update.form_fields(now_ms));
        let data: ProfileData = self.data(request, "profile update rejected").await?;
        Ok(data.user)
    }

    // --- Products ---

    pub async fn get_products(&self, page: u32, limit: u32) -> Result<Page<Product>> {
        let request = ApiRequest::get("/api/products")
            .query("page", page)
            .query("limit", limit);
        let envelope: Envelope<Vec<Product>> =
            self.envelope(request, "failed to fetch products").await?;
        let has_next_page = envelope.has_next_page();
        Ok(Page {
            items: envelope.data.unwrap_or_default(),
            has_next_page,
        })
    }

    /// Search titles and descriptions.
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let request = ApiRequest::get("/api/products/search").query("query", query);
        let envelope: Envelope<Vec<Product>> = self.envelope(request, "search failed").await?;
        Ok(envelope.data.unwrap_or_default())
    }

    pub async fn get_product(&self, id: &str) -> Result<Product> {
        self.data(ApiRequest::get(product_path(id)), "Product not found")
            .await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let request = ApiRequest::post("/api/products").multipart(product.form_fields()?);
        self.data(request, "Failed to add product").await
    }

    pub async fn update_product(&self, id: &str, update: &ProductUpdate) -> Result<Product> {
        if update.is_empty() {
            return Err(Error::InvalidRequest("product update has no fields".into()));
        }
        let request =
            ApiRequest::put(product_path(id)).multipart(update.form_fields()?);
        self.data(request, "Failed to update product").await
    }

    pub async fn delete_product(&self, id: &str) -> Result<()> {
        self.acknowledge(
            ApiRequest::delete(product_path(id)),
            "Failed to delete product",
        )
        .await
    }

    // --- Decoding ---

    /// Send and decode the envelope. An empty 2xx body counts as success.
    async fn envelope<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        rejected: &str,
    ) -> Result<Envelope<T>> {
        let response = self.client.send(&request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;

        if body.trim().is_empty() {
            return Ok(Envelope {
                success: true,
                data: None,
                error: None,
                pagination: None,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            Error::Decode(format!("{} {}: {e}", request.method(), request.path()))
        })?;
        if !envelope.success {
            let message = envelope.error_message().unwrap_or(rejected).to_owned();
            return Err(Error::Rejected(message));
        }
        Ok(envelope)
    }

    /// Send and return `data`, which must be present.
    async fn data<T: DeserializeOwned>(&self, request: ApiRequest, rejected: &str) -> Result<T> {
        let path = request.path().to_owned();
        self.envelope(request, rejected)
            .await?
            .data
            .ok_or_else(|| Error::Decode(format!("{path}: response has no data")))
    }

    /// Send and ignore `data`.
    async fn acknowledge(&self, request: ApiRequest, rejected: &str) -> Result<()> {
        self.envelope::<serde_json::Value>(request, rejected)
            .await
            .map(drop)
    }
}
