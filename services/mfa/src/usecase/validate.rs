use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::repository::{ChallengeRepository, SettingsRepository};
use crate::domain::types::ChallengePurpose;
use crate::error::MfaServiceError;
use crate::usecase::challenge::verify_challenge;
use crate::usecase::totp::verify_enabled_totp;

pub struct ValidateMfaCodeInput {
    pub user_id: Uuid,
    pub method: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateMfaCodeOutput {
    pub success: bool,
    pub method: String,
    pub message: String,
}

/// Unified login-time dispatch: one entry point for every factor. A wrong
/// code is an unsuccessful result, never an error, so login flows branch on
/// `success` without catching. An unknown method name is the one hard error.
pub struct ValidateMfaCodeUseCase<S, CH>
where
    S: SettingsRepository,
    CH: ChallengeRepository,
{
    pub settings: S,
    pub challenges: CH,
}

impl<S, CH> ValidateMfaCodeUseCase<S, CH>
where
    S: SettingsRepository,
    CH: ChallengeRepository,
{
    pub async fn execute(
        &self,
        input: ValidateMfaCodeInput,
    ) -> Result<ValidateMfaCodeOutput, MfaServiceError> {
        self.execute_at(input, Utc::now().timestamp() as u64).await
    }

    pub async fn execute_at(
        &self,
        input: ValidateMfaCodeInput,
        now_secs: u64,
    ) -> Result<ValidateMfaCodeOutput, MfaServiceError> {
        let (success, method) = match input.method.to_lowercase().as_str() {
            "totp" => (
                verify_enabled_totp(&self.settings, input.user_id, &input.code, now_secs)
                    .await?,
                "totp",
            ),
            "sms" => (
                verify_challenge(
                    &self.challenges,
                    &self.settings,
                    input.user_id,
                    ChallengePurpose::SmsMfa,
                    &input.code,
                )
                .await?,
                "sms",
            ),
            "email" => (
                verify_challenge(
                    &self.challenges,
                    &self.settings,
                    input.user_id,
                    ChallengePurpose::EmailMfa,
                    &input.code,
                )
                .await?,
                "email",
            ),
            "backup" => (
                self.settings
                    .consume_backup_code(input.user_id, &input.code)
                    .await?,
                "backup_code",
            ),
            _ => return Err(MfaServiceError::UnsupportedMethod),
        };

        let message = if success {
            "Verification successful"
        } else {
            "Invalid or expired code"
        };
        Ok(ValidateMfaCodeOutput {
            success,
            method: method.to_owned(),
            message: message.to_owned(),
        })
    }
}
