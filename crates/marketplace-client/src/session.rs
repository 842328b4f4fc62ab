//! Session context
//!
//! Explicit replacement for app-wide "is the user signed in" state. The
//! context is built once at startup (`initialize` checks stored credentials
//! against the profile endpoint) and torn down by `logout`.
//!
//! State transitions are a pure function over `SessionState` and
//! `SessionEvent`; `SessionContext` performs the I/O and feeds events in.
//!
//! ```text
//! Unauthenticated --LoggedIn--> Authenticated
//! Authenticated --ProfileRefreshed--> Authenticated
//! Authenticated --LoggedOut | CredentialsExpired | ProfileCheckFailed--> Unauthenticated
//! ```

use common::Secret;
use marketplace_auth::CredentialPair;
use tracing::{debug, info, warn};

use crate::api::MarketplaceApi;
use crate::error::{Error, Result};
use crate::models::{ProfileUpdate, SignupRequest, User};

pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const SIGNUP_FAILED: &str = "Signup failed. Please try again.";
pub const VERIFICATION_FAILED: &str = "Verification failed. Please try again.";
pub const RESEND_FAILED: &str = "Failed to resend OTP. Please try again.";
pub const PROFILE_UPDATE_FAILED: &str = "Failed to update profile";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { user: User },
}

/// Events that drive session transitions.
#[derive(Debug)]
pub enum SessionEvent {
    /// Login or OTP verification stored a pair and the profile fetch succeeded
    LoggedIn(User),
    /// Profile edited while signed in
    ProfileRefreshed(User),
    /// User logged out
    LoggedOut,
    /// A call failed with `AuthExpired`; credentials are already cleared
    CredentialsExpired,
    /// Startup profile check with stored credentials failed
    ProfileCheckFailed,
}

/// Pure session state machine.
pub fn transition(state: SessionState, event: SessionEvent) -> SessionState {
    match (state, event) {
        (_, SessionEvent::LoggedIn(user)) => SessionState::Authenticated { user },
        (SessionState::Authenticated { .. }, SessionEvent::ProfileRefreshed(user)) => {
            SessionState::Authenticated { user }
        }
        (SessionState::Unauthenticated, SessionEvent::ProfileRefreshed(_)) => {
            SessionState::Unauthenticated
        }
        (
            _,
            SessionEvent::LoggedOut
            | SessionEvent::CredentialsExpired
            | SessionEvent::ProfileCheckFailed,
        ) => SessionState::Unauthenticated,
    }
}

/// Signed-in state plus the last user-facing error.
pub struct SessionContext {
    api: MarketplaceApi,
    state: SessionState,
    last_error: Option<String>,
    auth_checked: bool,
}

impl SessionContext {
    /// Fresh, unchecked context. Prefer `initialize` at startup.
    pub fn new(api: MarketplaceApi) -> Self {
        Self {
            api,
            state: SessionState::Unauthenticated,
            last_error: None,
            auth_checked: false,
        }
    }

    /// Build the context and validate any stored credentials.
    ///
    /// With a stored access token the profile is fetched (refreshing once if
    /// needed). Any failure clears storage and leaves the session
    /// unauthenticated; it is never surfaced as an error.
    pub async fn initialize(api: MarketplaceApi) -> Self {
        let mut session = Self::new(api);
        session.check_stored_session().await;
        session
    }

    async fn check_stored_session(&mut self) {
        let credentials = self.api.client().credentials().clone();
        match credentials.access_token().await {
            Ok(Some(_)) => match self.api.get_profile(None).await {
                Ok(user) => {
                    info!(user_id = %user.id, "restored session");
                    self.apply(SessionEvent::LoggedIn(user));
                }
                Err(e) => {
                    warn!(error = %e, "stored session invalid, clearing credentials");
                    if let Err(e) = credentials.clear().await {
                        warn!(error = %e, "failed to clear credentials");
                    }
                    self.apply(SessionEvent::ProfileCheckFailed);
                }
            },
            Ok(None) => debug!("no stored session"),
            Err(e) => {
                warn!(error = %e, "failed to read stored credentials");
                if let Err(e) = credentials.clear().await {
                    warn!(error = %e, "failed to clear credentials");
                }
                self.apply(SessionEvent::ProfileCheckFailed);
            }
        }
        self.auth_checked = true;
    }

    pub async fn login(&mut self, email: &str, password: &Secret<String>) -> Result<()> {
        self.last_error = None;
        let result = match self.api.login(email, password).await {
            Ok(pair) => self.adopt(&pair).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(user) => {
                info!(user_id = %user.id, "logged in");
                self.apply(SessionEvent::LoggedIn(user));
                Ok(())
            }
            Err(e) => Err(self.fail(e, LOGIN_FAILED)),
        }
    }

    /// Register. The session stays unauthenticated until verification.
    pub async fn signup(&mut self, request: &SignupRequest) -> Result<()> {
        self.last_error = None;
        self.api
            .signup(request)
            .await
            .map_err(|e| self.fail(e, SIGNUP_FAILED))
    }

    /// Verify an email. Signs in when the server returns credentials.
    pub async fn verify_otp(&mut self, email: &str, otp: &str) -> Result<()> {
        self.last_error = None;
        let pair = match self.api.verify_otp(email, otp).await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!("verified without credentials, login required");
                return Ok(());
            }
            Err(e) => return Err(self.fail(e, VERIFICATION_FAILED)),
        };
        match self.adopt(&pair).await {
            Ok(user) => {
                info!(user_id = %user.id, "verified and signed in");
                self.apply(SessionEvent::LoggedIn(user));
                Ok(())
            }
            Err(e) => Err(self.fail(e, VERIFICATION_FAILED)),
        }
    }

    pub async fn resend_otp(&mut self, email: &str) -> Result<()> {
        self.last_error = None;
        self.api
            .resend_otp(email)
            .await
            .map_err(|e| self.fail(e, RESEND_FAILED))
    }

    /// Edit the signed-in user's profile and adopt the server's copy.
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<User> {
        self.last_error = None;
        match self.api.update_profile(update).await {
            Ok(user) => {
                self.update_user(user.clone());
                Ok(user)
            }
            Err(e) => Err(self.fail(e, PROFILE_UPDATE_FAILED)),
        }
    }

    /// Log out. Never fails: server errors are logged and storage is cleared.
    pub async fn logout(&mut self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "logout request failed");
            if let Err(e) = self.api.client().credentials().clear().await {
                warn!(error = %e, "failed to clear credentials");
            }
        }
        info!("logged out");
        self.apply(SessionEvent::LoggedOut);
    }

    /// Replace the cached user (e.g. after a profile edit done elsewhere).
    pub fn update_user(&mut self, user: User) {
        self.apply(SessionEvent::ProfileRefreshed(user));
    }

    /// Record a failure from a call made outside the context.
    ///
    /// `AuthExpired` moves the session to unauthenticated.
    pub fn report(&mut self, error: &Error) {
        if error.is_auth_expired() {
            self.apply(SessionEvent::CredentialsExpired);
        }
    }

    pub fn api(&self) -> &MarketplaceApi {
        &self.api
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated { user } => Some(user),
            SessionState::Unauthenticated => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// Whether stored credentials have been checked since startup.
    pub fn auth_checked(&self) -> bool {
        self.auth_checked
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Store a freshly issued pair and load the profile it belongs to.
    async fn adopt(&self, pair: &CredentialPair) -> Result<User> {
        self.api.client().credentials().store(pair).await?;
        self.api.get_profile(None).await
    }

    fn fail(&mut self, error: Error, default: &str) -> Error {
        let message = error.user_message(default);
        warn!(error = %error, user_message = %message, "session operation failed");
        self.last_error = Some(message);
        self.report(&error);
        error
    }

    fn apply(&mut self, event: SessionEvent) {
        let state = std::mem::replace(&mut self.state, SessionState::Unauthenticated);
        self.state = transition(state, event);
    }
}
