use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::methods::{MethodStore, NewMethod};
use crate::domain::otp;
use crate::domain::repository::{
    MethodCache, MethodRepository, QrRenderer, SettingsRepository, UserRepository,
};
use crate::domain::types::{MethodKind, MethodPatch, OTP_ISSUER, SettingsPatch};
use crate::error::MfaServiceError;

/// Check a submitted token against the stored, enabled secret. Touches
/// `last_used_at` on success. Shared by the dedicated verify flow and the
/// unified dispatch.
pub(crate) async fn verify_enabled_totp<S>(
    settings: &S,
    user_id: Uuid,
    token: &str,
    now_secs: u64,
) -> Result<bool, MfaServiceError>
where
    S: SettingsRepository,
{
    let current = settings
        .find(user_id)
        .await?
        .ok_or(MfaServiceError::TotpNotEnabled)?;
    if !current.totp_enabled {
        return Err(MfaServiceError::TotpNotEnabled);
    }
    let secret = current
        .totp_secret
        .as_deref()
        .ok_or(MfaServiceError::SecretNotFound)?;
    let ok = otp::verify_totp(secret, token, now_secs)
        .map_err(|e| MfaServiceError::Internal(e.into()))?;
    if ok {
        settings.touch_last_used(user_id).await?;
    }
    Ok(ok)
}

#[derive(Debug, Serialize)]
pub struct SetupTotpOutput {
    pub secret: String,
    pub otpauth_uri: String,
    pub qr_data_url: String,
    pub backup_codes: Vec<String>,
}

pub struct SetupTotpUseCase<U, S, Q>
where
    U: UserRepository,
    S: SettingsRepository,
    Q: QrRenderer,
{
    pub users: U,
    pub settings: S,
    pub qr: Q,
}

impl<U, S, Q> SetupTotpUseCase<U, S, Q>
where
    U: UserRepository,
    S: SettingsRepository,
    Q: QrRenderer,
{
    /// Provision a fresh secret and backup-code batch. Overwrites any
    /// earlier un-enabled setup, so a failed or abandoned run is simply
    /// retried. Does not enable anything.
    pub async fn execute(&self, user_id: Uuid) -> Result<SetupTotpOutput, MfaServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(MfaServiceError::UserNotFound)?;

        let secret = otp::generate_secret();
        let backup_codes = otp::default_backup_codes();

        // Persist before rendering: a QR failure leaves state a retry can
        // overwrite.
        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    totp_secret: Some(Some(secret.clone())),
                    backup_codes: Some(backup_codes.clone()),
                    backup_codes_used: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await?;

        let otpauth_uri = otp::otpauth_uri(&secret, &user.email, OTP_ISSUER);
        let qr_data_url = self.qr.render_data_url(&otpauth_uri)?;

        Ok(SetupTotpOutput {
            secret,
            otpauth_uri,
            qr_data_url,
            backup_codes,
        })
    }
}

pub struct VerifyTotpUseCase<S>
where
    S: SettingsRepository,
{
    pub settings: S,
}

impl<S> VerifyTotpUseCase<S>
where
    S: SettingsRepository,
{
    pub async fn execute(&self, user_id: Uuid, token: &str) -> Result<bool, MfaServiceError> {
        self.execute_at(user_id, token, Utc::now().timestamp() as u64)
            .await
    }

    /// Verification against an explicit clock, so tests can pin the
    /// time step.
    pub async fn execute_at(
        &self,
        user_id: Uuid,
        token: &str,
        now_secs: u64,
    ) -> Result<bool, MfaServiceError> {
        verify_enabled_totp(&self.settings, user_id, token, now_secs).await
    }
}

pub struct EnableTotpUseCase<S, U, R, C>
where
    S: SettingsRepository,
    U: UserRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub settings: S,
    pub users: U,
    pub methods: MethodStore<R, C>,
}

impl<S, U, R, C> EnableTotpUseCase<S, U, R, C>
where
    S: SettingsRepository,
    U: UserRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub async fn execute(&self, user_id: Uuid, token: &str) -> Result<(), MfaServiceError> {
        self.execute_at(user_id, token, Utc::now().timestamp() as u64)
            .await
    }

    /// Prove possession of the provisioned secret, then turn the factor on:
    /// credential record, settings flags, account-level flag.
    pub async fn execute_at(
        &self,
        user_id: Uuid,
        token: &str,
        now_secs: u64,
    ) -> Result<(), MfaServiceError> {
        let current = self
            .settings
            .find(user_id)
            .await?
            .ok_or(MfaServiceError::SecretNotFound)?;
        let secret = current
            .totp_secret
            .clone()
            .ok_or(MfaServiceError::SecretNotFound)?;

        let ok = otp::verify_totp(&secret, token, now_secs)
            .map_err(|e| MfaServiceError::Internal(e.into()))?;
        if !ok {
            return Err(MfaServiceError::InvalidToken);
        }

        let created = self
            .methods
            .create(NewMethod {
                user_id,
                kind: MethodKind::Totp,
                secret: Some(secret.clone()),
                phone_number: None,
                is_active: true,
            })
            .await;
        match created {
            Ok(_) => {}
            // Re-enabling after a disable: the soft-deactivated record is
            // still live on the unique index, so refresh and reactivate it.
            Err(MfaServiceError::DuplicateMethod(_)) => {
                let existing = self
                    .methods
                    .find_by_user_and_kind(user_id, MethodKind::Totp, false)
                    .await?
                    .ok_or(MfaServiceError::MethodNotFound)?;
                self.methods
                    .update(
                        existing.id,
                        &MethodPatch {
                            secret: Some(Some(secret)),
                            is_active: Some(true),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            Err(e) => return Err(e),
        }

        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    totp_enabled: Some(true),
                    mfa_enforced: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        self.users
            .set_mfa_enabled(user_id, true, Some(MethodKind::Totp.as_str()))
            .await?;
        self.settings.touch_last_used(user_id).await?;
        Ok(())
    }
}

pub struct DisableTotpUseCase<S, U, R, C>
where
    S: SettingsRepository,
    U: UserRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub settings: S,
    pub users: U,
    pub methods: MethodStore<R, C>,
}

impl<S, U, R, C> DisableTotpUseCase<S, U, R, C>
where
    S: SettingsRepository,
    U: UserRepository,
    R: MethodRepository,
    C: MethodCache,
{
    /// Teardown: deactivate the record (kept for a later re-enable), clear
    /// the settings flags and the secret. The account-level flag drops only
    /// when no active factor of any kind remains.
    pub async fn execute(&self, user_id: Uuid) -> Result<(), MfaServiceError> {
        if let Some(existing) = self
            .methods
            .find_by_user_and_kind(user_id, MethodKind::Totp, false)
            .await?
        {
            if existing.is_active {
                self.methods.deactivate(existing.id).await?;
            }
        }

        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    totp_enabled: Some(false),
                    totp_secret: Some(None),
                    mfa_enforced: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        if !self.methods.has_active_mfa(user_id).await? {
            self.users.set_mfa_enabled(user_id, false, None).await?;
        }
        Ok(())
    }
}
