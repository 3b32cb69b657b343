use axum::{Json, extract::State};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::MfaServiceError;
use crate::state::AppState;
use crate::usecase::validate::{
    ValidateMfaCodeInput, ValidateMfaCodeOutput, ValidateMfaCodeUseCase,
};

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub user_id: Uuid,
    pub method: String,
    pub code: String,
}

pub async fn validate_code(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ValidateMfaCodeOutput>, MfaServiceError> {
    let usecase = ValidateMfaCodeUseCase {
        settings: state.settings_repo(),
        challenges: state.challenge_repo(),
    };
    let output = usecase
        .execute(ValidateMfaCodeInput {
            user_id: body.user_id,
            method: body.method,
            code: body.code,
        })
        .await?;
    Ok(Json(output))
}
