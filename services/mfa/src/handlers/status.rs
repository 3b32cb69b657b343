use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::json;
use uuid::Uuid;

use crate::error::MfaServiceError;
use crate::state::AppState;
use crate::usecase::status::{
    AvailableMethodsOutput, AvailableMethodsUseCase, IsMfaEnabledUseCase, MfaStatusOutput,
    MfaStatusUseCase,
};

pub async fn available_methods(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AvailableMethodsOutput>, MfaServiceError> {
    let usecase = AvailableMethodsUseCase {
        settings: state.settings_repo(),
        methods: state.method_store(),
    };
    let output = usecase.execute(user_id).await?;
    Ok(Json(output))
}

pub async fn mfa_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MfaStatusOutput>, MfaServiceError> {
    let usecase = MfaStatusUseCase {
        settings: state.settings_repo(),
        methods: state.method_store(),
    };
    let output = usecase.execute(user_id).await?;
    Ok(Json(output))
}

pub async fn is_mfa_enabled(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, MfaServiceError> {
    let usecase = IsMfaEnabledUseCase {
        settings: state.settings_repo(),
        methods: state.method_store(),
    };
    let enabled = usecase.execute(user_id).await?;
    Ok(Json(json!({ "enabled": enabled })))
}
