use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::methods::MethodStore;
use crate::domain::repository::{MethodCache, MethodRepository, SettingsRepository};
use crate::domain::types::{MethodKind, MfaSettings, MfaStats};
use crate::error::MfaServiceError;

fn backup_codes_remaining(settings: &MfaSettings) -> usize {
    settings
        .backup_codes
        .iter()
        .filter(|code| !settings.backup_codes_used.contains(code))
        .count()
}

#[derive(Debug, Serialize)]
pub struct MethodAvailability {
    pub totp: bool,
    pub sms: bool,
    pub email: bool,
    pub backup: bool,
}

#[derive(Debug, Serialize)]
pub struct AvailableMethodsOutput {
    pub methods: MethodAvailability,
    pub has_any_method: bool,
    pub active_method_count: usize,
}

/// Which factors could satisfy a login challenge right now.
pub struct AvailableMethodsUseCase<S, R, C>
where
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub settings: S,
    pub methods: MethodStore<R, C>,
}

impl<S, R, C> AvailableMethodsUseCase<S, R, C>
where
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub async fn execute(
        &self,
        user_id: Uuid,
    ) -> Result<AvailableMethodsOutput, MfaServiceError> {
        let active = self.methods.list_by_user(user_id, true).await?;
        let settings = self.settings.find(user_id).await?;

        let has_kind = |kind: MethodKind| active.iter().any(|m| m.kind == kind);
        let methods = MethodAvailability {
            totp: has_kind(MethodKind::Totp),
            sms: has_kind(MethodKind::Sms),
            email: has_kind(MethodKind::Email),
            // A provisioned backup batch counts as a usable method even
            // once every code in it has been spent; regeneration, not
            // exhaustion, is what retires a batch.
            backup: settings.as_ref().is_some_and(|s| !s.backup_codes.is_empty()),
        };

        Ok(AvailableMethodsOutput {
            has_any_method: methods.totp || methods.sms || methods.email || methods.backup,
            active_method_count: active.len(),
            methods,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MfaStatusOutput {
    pub enabled: bool,
    pub totp_enabled: bool,
    pub sms_enabled: bool,
    pub email_enabled: bool,
    pub mfa_enforced: bool,
    pub active_methods: Vec<MethodKind>,
    pub backup_codes_remaining: usize,
    pub backup_codes_used: usize,
    #[serde(serialize_with = "bilten_core::serde::to_rfc3339_ms_opt")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub stats: MfaStats,
}

/// Full per-user MFA picture: settings flags, active kinds, backup-code
/// counts and the per-kind record aggregate.
pub struct MfaStatusUseCase<S, R, C>
where
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub settings: S,
    pub methods: MethodStore<R, C>,
}

impl<S, R, C> MfaStatusUseCase<S, R, C>
where
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub async fn execute(&self, user_id: Uuid) -> Result<MfaStatusOutput, MfaServiceError> {
        let active_methods = self.methods.active_kinds(user_id).await?;
        let stats = self.methods.stats(user_id).await?;
        let settings = self.settings.find(user_id).await?;

        let (totp_enabled, sms_enabled, email_enabled, mfa_enforced) = settings
            .as_ref()
            .map(|s| (s.totp_enabled, s.sms_enabled, s.email_enabled, s.mfa_enforced))
            .unwrap_or((false, false, false, false));

        Ok(MfaStatusOutput {
            enabled: !active_methods.is_empty() || totp_enabled || sms_enabled || email_enabled,
            totp_enabled,
            sms_enabled,
            email_enabled,
            mfa_enforced,
            active_methods,
            backup_codes_remaining: settings
                .as_ref()
                .map(backup_codes_remaining)
                .unwrap_or(0),
            backup_codes_used: settings
                .as_ref()
                .map(|s| s.backup_codes_used.len())
                .unwrap_or(0),
            last_used_at: settings.as_ref().and_then(|s| s.last_used_at),
            stats,
        })
    }
}

/// Login-flow gate: does this user have to pass a second factor?
pub struct IsMfaEnabledUseCase<S, R, C>
where
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub settings: S,
    pub methods: MethodStore<R, C>,
}

impl<S, R, C> IsMfaEnabledUseCase<S, R, C>
where
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    /// Active credential records are authoritative; the settings flags are
    /// the fallback when records and flags have drifted.
    pub async fn execute(&self, user_id: Uuid) -> Result<bool, MfaServiceError> {
        if self.methods.has_active_mfa(user_id).await? {
            return Ok(true);
        }
        Ok(self
            .settings
            .find(user_id)
            .await?
            .is_some_and(|s| s.totp_enabled || s.sms_enabled || s.email_enabled))
    }
}
