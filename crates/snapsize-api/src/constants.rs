//! API constants

/// Versioned prefix for every public route
pub const API_PREFIX: &str = "/api/v0";

/// Prefix of the local-backend transfer route, relative to [`API_PREFIX`]
pub const STORAGE_ROUTE: &str = "/storage";

/// Header carrying the caller's account, set by the upstream identity layer
pub const ACCOUNT_ID_HEADER: &str = "X-Account-Id";

/// Served OpenAPI document
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";
