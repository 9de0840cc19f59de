//! Shared HTTP middleware for Snapsize services

pub mod request_id;
pub mod security_headers;
pub mod service_key;

pub use request_id::{get_request_id, request_id_middleware, RequestId};
pub use security_headers::{security_headers_middleware, SecurityHeaders};
pub use service_key::{require_service_key, ServiceKey};
