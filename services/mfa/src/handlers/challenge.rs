use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::MfaServiceError;
use crate::state::AppState;
use crate::usecase::challenge::{
    DisableEmailUseCase, DisableSmsUseCase, EnableEmailUseCase, EnableSmsUseCase,
    SendEmailCodeUseCase, SendSmsCodeUseCase, SetupEmailUseCase, SetupSmsUseCase,
    VerifyEmailCodeUseCase, VerifySmsCodeUseCase,
};

#[derive(Deserialize)]
pub struct SetupSmsRequest {
    pub user_id: Uuid,
    pub phone_number: String,
}

pub async fn setup_sms(
    State(state): State<AppState>,
    Json(body): Json<SetupSmsRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), MfaServiceError> {
    let usecase = SetupSmsUseCase {
        users: state.user_repo(),
        settings: state.settings_repo(),
        challenges: state.challenge_repo(),
        methods: state.method_store(),
    };
    let method_id = usecase.execute(body.user_id, &body.phone_number).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "method_id": method_id }))))
}

#[derive(Deserialize)]
pub struct UserRequest {
    pub user_id: Uuid,
}

pub async fn setup_email(
    State(state): State<AppState>,
    Json(body): Json<UserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), MfaServiceError> {
    let usecase = SetupEmailUseCase {
        users: state.user_repo(),
        challenges: state.challenge_repo(),
        methods: state.method_store(),
    };
    let method_id = usecase.execute(body.user_id).await?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "method_id": method_id }))))
}

pub async fn send_sms_code(
    State(state): State<AppState>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, MfaServiceError> {
    let usecase = SendSmsCodeUseCase {
        challenges: state.challenge_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn send_email_code(
    State(state): State<AppState>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, MfaServiceError> {
    let usecase = SendEmailCodeUseCase {
        users: state.user_repo(),
        challenges: state.challenge_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
pub struct CodeRequest {
    pub user_id: Uuid,
    pub code: String,
}

pub async fn verify_sms_code(
    State(state): State<AppState>,
    Json(body): Json<CodeRequest>,
) -> Result<Json<bool>, MfaServiceError> {
    let usecase = VerifySmsCodeUseCase {
        challenges: state.challenge_repo(),
        settings: state.settings_repo(),
    };
    let valid = usecase.execute(body.user_id, &body.code).await?;
    Ok(Json(valid))
}

pub async fn verify_email_code(
    State(state): State<AppState>,
    Json(body): Json<CodeRequest>,
) -> Result<Json<bool>, MfaServiceError> {
    let usecase = VerifyEmailCodeUseCase {
        challenges: state.challenge_repo(),
        settings: state.settings_repo(),
    };
    let valid = usecase.execute(body.user_id, &body.code).await?;
    Ok(Json(valid))
}

pub async fn enable_sms(
    State(state): State<AppState>,
    Json(body): Json<CodeRequest>,
) -> Result<Json<serde_json::Value>, MfaServiceError> {
    let usecase = EnableSmsUseCase {
        users: state.user_repo(),
        settings: state.settings_repo(),
        challenges: state.challenge_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id, &body.code).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn enable_email(
    State(state): State<AppState>,
    Json(body): Json<CodeRequest>,
) -> Result<Json<serde_json::Value>, MfaServiceError> {
    let usecase = EnableEmailUseCase {
        users: state.user_repo(),
        settings: state.settings_repo(),
        challenges: state.challenge_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id, &body.code).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn disable_sms(
    State(state): State<AppState>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, MfaServiceError> {
    let usecase = DisableSmsUseCase {
        users: state.user_repo(),
        settings: state.settings_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disable_email(
    State(state): State<AppState>,
    Json(body): Json<UserRequest>,
) -> Result<StatusCode, MfaServiceError> {
    let usecase = DisableEmailUseCase {
        users: state.user_repo(),
        settings: state.settings_repo(),
        methods: state.method_store(),
    };
    usecase.execute(body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
