use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::types::MethodKind;

/// MFA service error variants. Verification failures (wrong code, wrong
/// token) are *not* here — they surface as boolean/unsuccessful results so
/// login-flow callers can branch without exception handling. These variants
/// cover validation, state preconditions, and infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum MfaServiceError {
    #[error("Invalid MFA method type")]
    InvalidMethodKind,
    #[error("Secret is required for TOTP method")]
    MissingSecret,
    #[error("Phone number is required for SMS method")]
    MissingPhoneNumber,
    #[error("Invalid phone number format")]
    InvalidPhoneNumber,
    #[error("Unsupported MFA method")]
    UnsupportedMethod,
    #[error("Invalid TOTP token")]
    InvalidToken,
    #[error("Invalid or expired verification code")]
    InvalidCode,
    #[error("user not found")]
    UserNotFound,
    #[error("MFA method not found")]
    MethodNotFound,
    #[error("MFA secret not found. Please set up TOTP first")]
    SecretNotFound,
    #[error("TOTP is not enabled for this user")]
    TotpNotEnabled,
    #[error("{} method already exists for this user", .0.label())]
    DuplicateMethod(MethodKind),
    #[error("Cannot delete active MFA method. Deactivate it first")]
    MethodActive,
    #[error("Failed to generate QR code")]
    QrGenerationFailed,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl MfaServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidMethodKind => "INVALID_METHOD_TYPE",
            Self::MissingSecret => "MISSING_SECRET",
            Self::MissingPhoneNumber => "MISSING_PHONE_NUMBER",
            Self::InvalidPhoneNumber => "INVALID_PHONE_NUMBER",
            Self::UnsupportedMethod => "UNSUPPORTED_METHOD",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidCode => "INVALID_CODE",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::MethodNotFound => "METHOD_NOT_FOUND",
            Self::SecretNotFound => "SECRET_NOT_FOUND",
            Self::TotpNotEnabled => "TOTP_NOT_ENABLED",
            Self::DuplicateMethod(_) => "DUPLICATE_METHOD",
            Self::MethodActive => "METHOD_ACTIVE",
            Self::QrGenerationFailed => "QR_GENERATION_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for MfaServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidMethodKind
            | Self::MissingSecret
            | Self::MissingPhoneNumber
            | Self::InvalidPhoneNumber
            | Self::UnsupportedMethod => StatusCode::BAD_REQUEST,
            Self::InvalidToken | Self::InvalidCode => StatusCode::UNAUTHORIZED,
            Self::UserNotFound | Self::MethodNotFound | Self::SecretNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::TotpNotEnabled | Self::DuplicateMethod(_) | Self::MethodActive => {
                StatusCode::CONFLICT
            }
            Self::QrGenerationFailed | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Log 500s only — tower-http TraceLayer already records method/uri/status for all
        // requests. 4xx are expected client errors; logging them here would be noise.
        // Internal errors need the anyhow chain logged so the root cause is traceable.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
