//! Storage keys and auth endpoint paths

/// Storage key for the short-lived bearer token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the long-lived token used only to mint new access tokens
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Refresh endpoint, relative to the API base URL
pub const REFRESH_TOKEN_PATH: &str = "/api/auth/refresh-token";

/// Lifetime requested from the server when issuing tokens (login and refresh)
pub const TOKEN_EXPIRES_IN: &str = "1y";
