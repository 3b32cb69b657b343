use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::MfaServiceError;
use crate::state::AppState;
use crate::usecase::totp::{
    DisableTotpUseCase, EnableTotpUseCase, SetupTotpOutput, SetupTotpUseCase, VerifyTotpUseCase,
};

#[derive(Deserialize)]
pub struct SetupTotpRequest {
    pub user_id: Uuid,
}

pub async fn setup_totp(
    State(state): State<AppState>,
    Json(body): Json<SetupTotpRequest>,
) -> Result<Json<SetupTotpOutput>, MfaServiceError> {
    let usecase = SetupTotpUseCase {
        users: state.user_repo(),
        settings: state.settings_repo(),
        qr: state.qr_renderer(),
    };
    let output = usecase.execute(body.user_id).await?;
    Ok(Json(output))
}

#[derive(Deserialize)]
pub struct TotpTokenRequest {
    pub user_id: Uuid,
    pub token: String,
}

pub async fn verify_totp(
    State(state): State<AppState>,
    Json(body): Json<TotpTokenRequest>,
) -> Result<Json<bool>, MfaServiceError> {
    let usecase = VerifyTotpUseCase {
        settings: state.settings_repo(),
    };
    let valid = usecase.execute(body.user_id, &body.token).await?;
    Ok(Json(valid))
}

pub async fn enable_totp(
    State(state): State<AppState>,
    Json(body): Json<TotpTokenRequest>,
) -> Result<Json<serde_json::Value>, MfaServiceError> {
    let usecase = EnableTotpUseCase {
        settings: state.settings_repo(),
        users: state.user_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id, &body.token).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn disable_totp(
    State(state): State<AppState>,
    Json(body): Json<SetupTotpRequest>,
) -> Result<StatusCode, MfaServiceError> {
    let usecase = DisableTotpUseCase {
        settings: state.settings_repo(),
        users: state.user_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
