use axum::http::HeaderValue;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Header policy derived from the loaded configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityHeaders {
    /// Send `Strict-Transport-Security`; production only
    pub hsts: bool,
}

/// Security headers middleware
/// Adds security headers to all HTTP responses
///
/// Mount with `axum::middleware::from_fn_with_state(policy, security_headers_middleware)`.
pub async fn security_headers_middleware(
    State(policy): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    // The API reference page loads its renderer from a CDN
    let is_docs = request.uri().path().starts_with("/docs");
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if policy.hsts {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    let csp = if is_docs {
        "default-src 'self'; script-src 'self' 'unsafe-inline' https://unpkg.com; style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; font-src 'self' data: https://fonts.gstatic.com; img-src 'self' data: https:; connect-src 'self'"
    } else {
        "default-src 'none'; frame-ancestors 'none'"
    };
    headers.insert("Content-Security-Policy", HeaderValue::from_static(csp));

    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(policy: SecurityHeaders) -> Router {
        Router::new()
            .route("/api/v0/health", get(|| async { "ok" }))
            .route("/docs", get(|| async { "docs" }))
            .layer(middleware::from_fn_with_state(
                policy,
                security_headers_middleware,
            ))
    }

    async fn csp(path: &str) -> String {
        let response = app(SecurityHeaders::default())
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
        assert_eq!(response.headers()["X-Frame-Options"], "DENY");
        response.headers()["Content-Security-Policy"]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_api_responses_are_locked_down() {
        assert!(csp("/api/v0/health").await.starts_with("default-src 'none'"));
    }

    #[tokio::test]
    async fn test_docs_may_load_renderer() {
        assert!(csp("/docs").await.contains("https://unpkg.com"));
    }

    #[tokio::test]
    async fn test_hsts_follows_policy() {
        let request = || Request::builder().uri("/api/v0/health").body(Body::empty()).unwrap();

        let dev = app(SecurityHeaders { hsts: false })
            .oneshot(request())
            .await
            .unwrap();
        assert!(dev.headers().get("Strict-Transport-Security").is_none());

        let prod = app(SecurityHeaders { hsts: true })
            .oneshot(request())
            .await
            .unwrap();
        assert_eq!(
            prod.headers()["Strict-Transport-Security"],
            "max-age=31536000; includeSubDomains"
        );
    }
}
