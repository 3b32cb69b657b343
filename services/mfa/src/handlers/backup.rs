use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::MfaServiceError;
use crate::state::AppState;
use crate::usecase::backup::{RegenerateBackupCodesUseCase, VerifyBackupCodeUseCase};

#[derive(Deserialize)]
pub struct BackupCodeRequest {
    pub user_id: Uuid,
    pub code: String,
}

pub async fn verify_backup_code(
    State(state): State<AppState>,
    Json(body): Json<BackupCodeRequest>,
) -> Result<Json<bool>, MfaServiceError> {
    let usecase = VerifyBackupCodeUseCase {
        settings: state.settings_repo(),
    };
    let valid = usecase.execute(body.user_id, &body.code).await?;
    Ok(Json(valid))
}

#[derive(Deserialize)]
pub struct RegenerateRequest {
    pub user_id: Uuid,
}

pub async fn regenerate_backup_codes(
    State(state): State<AppState>,
    Json(body): Json<RegenerateRequest>,
) -> Result<Json<serde_json::Value>, MfaServiceError> {
    let usecase = RegenerateBackupCodesUseCase {
        settings: state.settings_repo(),
    };
    let codes = usecase.execute(body.user_id).await?;
    Ok(Json(json!({ "backup_codes": codes })))
}
