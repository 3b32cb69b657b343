use uuid::Uuid;

use crate::domain::otp;
use crate::domain::repository::SettingsRepository;
use crate::domain::types::SettingsPatch;
use crate::error::MfaServiceError;

pub struct VerifyBackupCodeUseCase<S>
where
    S: SettingsRepository,
{
    pub settings: S,
}

impl<S> VerifyBackupCodeUseCase<S>
where
    S: SettingsRepository,
{
    /// Spend a recovery code. The consume is a single conditional write,
    /// so a code verifies at most once; unknown codes, already-spent codes
    /// and users without settings all come back `false`.
    pub async fn execute(&self, user_id: Uuid, code: &str) -> Result<bool, MfaServiceError> {
        self.settings.consume_backup_code(user_id, code).await
    }
}

pub struct RegenerateBackupCodesUseCase<S>
where
    S: SettingsRepository,
{
    pub settings: S,
}

impl<S> RegenerateBackupCodesUseCase<S>
where
    S: SettingsRepository,
{
    /// Issue a fresh batch and reset the used set. Every previously issued
    /// code stops working, spent or not.
    pub async fn execute(&self, user_id: Uuid) -> Result<Vec<String>, MfaServiceError> {
        let codes = otp::default_backup_codes();
        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    backup_codes: Some(codes.clone()),
                    backup_codes_used: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(codes)
    }
}
