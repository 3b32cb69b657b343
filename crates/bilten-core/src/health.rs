use axum::http::StatusCode;

/// `GET /healthz` — process liveness.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `GET /readyz` — readiness. The MFA service has no warm-up phase, so
/// ready is the same as alive.
pub async fn readyz() -> StatusCode {
    StatusCode::OK
}
