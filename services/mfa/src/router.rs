use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use bilten_core::health::{healthz, readyz};
use bilten_core::middleware::request_id_layer;

use crate::handlers::{
    backup::{regenerate_backup_codes, verify_backup_code},
    challenge::{
        disable_email, disable_sms, enable_email, enable_sms, send_email_code, send_sms_code,
        setup_email, setup_sms, verify_email_code, verify_sms_code,
    },
    status::{available_methods, is_mfa_enabled, mfa_status},
    totp::{disable_totp, enable_totp, setup_totp, verify_totp},
    validate::validate_code,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // TOTP
        .route("/mfa/totp/setup", post(setup_totp))
        .route("/mfa/totp/verify", post(verify_totp))
        .route("/mfa/totp/enable", post(enable_totp))
        .route("/mfa/totp/disable", post(disable_totp))
        // SMS
        .route("/mfa/sms/setup", post(setup_sms))
        .route("/mfa/sms/send", post(send_sms_code))
        .route("/mfa/sms/verify", post(verify_sms_code))
        .route("/mfa/sms/enable", post(enable_sms))
        .route("/mfa/sms/disable", post(disable_sms))
        // Email
        .route("/mfa/email/setup", post(setup_email))
        .route("/mfa/email/send", post(send_email_code))
        .route("/mfa/email/verify", post(verify_email_code))
        .route("/mfa/email/enable", post(enable_email))
        .route("/mfa/email/disable", post(disable_email))
        // Backup codes
        .route("/mfa/backup/verify", post(verify_backup_code))
        .route("/mfa/backup/regenerate", post(regenerate_backup_codes))
        // Unified validation + status
        .route("/mfa/validate", post(validate_code))
        .route("/mfa/{user_id}/methods", get(available_methods))
        .route("/mfa/{user_id}/status", get(mfa_status))
        .route("/mfa/{user_id}/enabled", get(is_mfa_enabled))
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
