use chrono::{Duration, Utc};
use constant_time_eq::constant_time_eq;
use serde_json::json;
use uuid::Uuid;

use crate::domain::methods::{MethodStore, NewMethod};
use crate::domain::otp;
use crate::domain::repository::{
    ChallengeRepository, MethodCache, MethodRepository, SettingsRepository, UserRepository,
};
use crate::domain::types::{
    ChallengePurpose, MethodKind, MethodPatch, MfaChallenge, OutboxEvent, SettingsPatch,
};
use crate::error::MfaServiceError;

fn event_kind(purpose: ChallengePurpose) -> &'static str {
    match purpose {
        ChallengePurpose::SmsMfa => "sms_mfa_code_created",
        ChallengePurpose::EmailMfa => "email_mfa_code_created",
    }
}

/// Issue a fresh code for `(user, purpose)` and hand delivery to the
/// outbox relay, atomically with the challenge row.
async fn issue_code<CH>(
    challenges: &CH,
    user_id: Uuid,
    purpose: ChallengePurpose,
    destination: &str,
) -> Result<(), MfaServiceError>
where
    CH: ChallengeRepository,
{
    let now = Utc::now();
    let challenge = MfaChallenge {
        id: Uuid::new_v4(),
        user_id,
        code: otp::generate_challenge_code(),
        purpose,
        expires_at: now + Duration::seconds(purpose.ttl_secs()),
        used_at: None,
        created_at: now,
    };
    let kind = event_kind(purpose);
    let event = OutboxEvent {
        id: Uuid::new_v4(),
        kind: kind.to_owned(),
        payload: json!({ "to": destination, "code": challenge.code }),
        idempotency_key: format!("{}:{}", kind, challenge.id),
    };
    challenges.create_with_outbox(&challenge, &event).await
}

/// Consume-on-match verification of the latest outstanding code. A match
/// burns the code and touches `last_used_at`; anything else is `false`.
pub(crate) async fn verify_challenge<CH, S>(
    challenges: &CH,
    settings: &S,
    user_id: Uuid,
    purpose: ChallengePurpose,
    code: &str,
) -> Result<bool, MfaServiceError>
where
    CH: ChallengeRepository,
    S: SettingsRepository,
{
    let Some(challenge) = challenges.find_valid(user_id, purpose).await? else {
        return Ok(false);
    };
    if !constant_time_eq(challenge.code.as_bytes(), code.as_bytes()) {
        return Ok(false);
    }
    challenges.mark_used(challenge.id).await?;
    settings.touch_last_used(user_id).await?;
    Ok(true)
}

/// Match a submitted code against the outstanding challenge without
/// consuming it on mismatch; used by the enable flows, where a mismatch is
/// an `InvalidCode` error rather than a boolean.
async fn take_matching_challenge<CH>(
    challenges: &CH,
    user_id: Uuid,
    purpose: ChallengePurpose,
    code: &str,
) -> Result<MfaChallenge, MfaServiceError>
where
    CH: ChallengeRepository,
{
    let challenge = challenges
        .find_valid(user_id, purpose)
        .await?
        .filter(|c| constant_time_eq(c.code.as_bytes(), code.as_bytes()))
        .ok_or(MfaServiceError::InvalidCode)?;
    challenges.mark_used(challenge.id).await?;
    Ok(challenge)
}

// ── Setup ─────────────────────────────────────────────────────────────────────

pub struct SetupSmsUseCase<U, S, CH, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub users: U,
    pub settings: S,
    pub challenges: CH,
    pub methods: MethodStore<R, C>,
}

impl<U, S, CH, R, C> SetupSmsUseCase<U, S, CH, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    /// Stage an SMS factor: an inactive record holding the number, plus a
    /// verification code sent to it. Re-running refreshes the number.
    /// Returns the staged record's id.
    pub async fn execute(
        &self,
        user_id: Uuid,
        phone_number: &str,
    ) -> Result<Uuid, MfaServiceError> {
        if !otp::validate_phone_number(phone_number) {
            return Err(MfaServiceError::InvalidPhoneNumber);
        }
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(MfaServiceError::UserNotFound)?;

        let created = self
            .methods
            .create(NewMethod {
                user_id,
                kind: MethodKind::Sms,
                secret: None,
                phone_number: Some(phone_number.to_owned()),
                is_active: false,
            })
            .await;
        let method_id = match created {
            Ok(method) => method.id,
            Err(MfaServiceError::DuplicateMethod(_)) => {
                let existing = self
                    .methods
                    .find_by_user_and_kind(user_id, MethodKind::Sms, false)
                    .await?
                    .ok_or(MfaServiceError::MethodNotFound)?;
                self.methods
                    .update(
                        existing.id,
                        &MethodPatch {
                            phone_number: Some(Some(phone_number.to_owned())),
                            ..Default::default()
                        },
                    )
                    .await?;
                existing.id
            }
            Err(e) => return Err(e),
        };

        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    sms_phone: Some(Some(phone_number.to_owned())),
                    ..Default::default()
                },
            )
            .await?;

        issue_code(&self.challenges, user_id, ChallengePurpose::SmsMfa, phone_number).await?;
        Ok(method_id)
    }
}

pub struct SetupEmailUseCase<U, CH, R, C>
where
    U: UserRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub users: U,
    pub challenges: CH,
    pub methods: MethodStore<R, C>,
}

impl<U, CH, R, C> SetupEmailUseCase<U, CH, R, C>
where
    U: UserRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    /// Stage an email factor against the account's address and send the
    /// verification code. Re-running just resends. Returns the staged
    /// record's id.
    pub async fn execute(&self, user_id: Uuid) -> Result<Uuid, MfaServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(MfaServiceError::UserNotFound)?;

        let created = self
            .methods
            .create(NewMethod {
                user_id,
                kind: MethodKind::Email,
                secret: None,
                phone_number: None,
                is_active: false,
            })
            .await;
        let method_id = match created {
            Ok(method) => method.id,
            Err(MfaServiceError::DuplicateMethod(_)) => {
                self.methods
                    .find_by_user_and_kind(user_id, MethodKind::Email, false)
                    .await?
                    .ok_or(MfaServiceError::MethodNotFound)?
                    .id
            }
            Err(e) => return Err(e),
        };

        issue_code(&self.challenges, user_id, ChallengePurpose::EmailMfa, &user.email).await?;
        Ok(method_id)
    }
}

// ── Send ──────────────────────────────────────────────────────────────────────

pub struct SendSmsCodeUseCase<CH, R, C>
where
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub challenges: CH,
    pub methods: MethodStore<R, C>,
}

impl<CH, R, C> SendSmsCodeUseCase<CH, R, C>
where
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    /// (Re)send a login code to the enrolled number.
    pub async fn execute(&self, user_id: Uuid) -> Result<(), MfaServiceError> {
        let method = self
            .methods
            .find_by_user_and_kind(user_id, MethodKind::Sms, true)
            .await?
            .filter(|m| m.is_active)
            .ok_or(MfaServiceError::MethodNotFound)?;
        let phone = method
            .phone_number
            .ok_or(MfaServiceError::MissingPhoneNumber)?;
        issue_code(&self.challenges, user_id, ChallengePurpose::SmsMfa, &phone).await
    }
}

pub struct SendEmailCodeUseCase<U, CH, R, C>
where
    U: UserRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub users: U,
    pub challenges: CH,
    pub methods: MethodStore<R, C>,
}

impl<U, CH, R, C> SendEmailCodeUseCase<U, CH, R, C>
where
    U: UserRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub async fn execute(&self, user_id: Uuid) -> Result<(), MfaServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(MfaServiceError::UserNotFound)?;
        self.methods
            .find_by_user_and_kind(user_id, MethodKind::Email, true)
            .await?
            .filter(|m| m.is_active)
            .ok_or(MfaServiceError::MethodNotFound)?;
        issue_code(&self.challenges, user_id, ChallengePurpose::EmailMfa, &user.email).await
    }
}

// ── Verify ────────────────────────────────────────────────────────────────────

pub struct VerifySmsCodeUseCase<CH, S>
where
    CH: ChallengeRepository,
    S: SettingsRepository,
{
    pub challenges: CH,
    pub settings: S,
}

impl<CH, S> VerifySmsCodeUseCase<CH, S>
where
    CH: ChallengeRepository,
    S: SettingsRepository,
{
    pub async fn execute(&self, user_id: Uuid, code: &str) -> Result<bool, MfaServiceError> {
        verify_challenge(
            &self.challenges,
            &self.settings,
            user_id,
            ChallengePurpose::SmsMfa,
            code,
        )
        .await
    }
}

pub struct VerifyEmailCodeUseCase<CH, S>
where
    CH: ChallengeRepository,
    S: SettingsRepository,
{
    pub challenges: CH,
    pub settings: S,
}

impl<CH, S> VerifyEmailCodeUseCase<CH, S>
where
    CH: ChallengeRepository,
    S: SettingsRepository,
{
    pub async fn execute(&self, user_id: Uuid, code: &str) -> Result<bool, MfaServiceError> {
        verify_challenge(
            &self.challenges,
            &self.settings,
            user_id,
            ChallengePurpose::EmailMfa,
            code,
        )
        .await
    }
}

// ── Enable / disable ──────────────────────────────────────────────────────────

pub struct EnableSmsUseCase<U, S, CH, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub users: U,
    pub settings: S,
    pub challenges: CH,
    pub methods: MethodStore<R, C>,
}

impl<U, S, CH, R, C> EnableSmsUseCase<U, S, CH, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    /// Confirm the setup code, activate the staged record, raise the flags.
    pub async fn execute(&self, user_id: Uuid, code: &str) -> Result<(), MfaServiceError> {
        let method = self
            .methods
            .find_by_user_and_kind(user_id, MethodKind::Sms, false)
            .await?
            .ok_or(MfaServiceError::MethodNotFound)?;

        take_matching_challenge(&self.challenges, user_id, ChallengePurpose::SmsMfa, code)
            .await?;

        self.methods.activate(method.id).await?;
        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    sms_enabled: Some(true),
                    sms_phone: Some(method.phone_number.clone()),
                    mfa_enforced: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        self.users
            .set_mfa_enabled(user_id, true, Some(MethodKind::Sms.as_str()))
            .await?;
        self.settings.touch_last_used(user_id).await?;
        Ok(())
    }
}

pub struct EnableEmailUseCase<U, S, CH, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub users: U,
    pub settings: S,
    pub challenges: CH,
    pub methods: MethodStore<R, C>,
}

impl<U, S, CH, R, C> EnableEmailUseCase<U, S, CH, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    CH: ChallengeRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub async fn execute(&self, user_id: Uuid, code: &str) -> Result<(), MfaServiceError> {
        let method = self
            .methods
            .find_by_user_and_kind(user_id, MethodKind::Email, false)
            .await?
            .ok_or(MfaServiceError::MethodNotFound)?;

        take_matching_challenge(&self.challenges, user_id, ChallengePurpose::EmailMfa, code)
            .await?;

        self.methods.activate(method.id).await?;
        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    email_enabled: Some(true),
                    mfa_enforced: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        self.users
            .set_mfa_enabled(user_id, true, Some(MethodKind::Email.as_str()))
            .await?;
        self.settings.touch_last_used(user_id).await?;
        Ok(())
    }
}

pub struct DisableSmsUseCase<U, S, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub users: U,
    pub settings: S,
    pub methods: MethodStore<R, C>,
}

impl<U, S, R, C> DisableSmsUseCase<U, S, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    /// Deactivate the record and drop the flag. The enrolled number stays
    /// on the record so a later re-enable skips re-entry. Account-level
    /// flag drops only when no active factor remains.
    pub async fn execute(&self, user_id: Uuid) -> Result<(), MfaServiceError> {
        if let Some(method) = self
            .methods
            .find_by_user_and_kind(user_id, MethodKind::Sms, false)
            .await?
        {
            if method.is_active {
                self.methods.deactivate(method.id).await?;
            }
        }
        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    sms_enabled: Some(false),
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

pub struct DisableEmailUseCase<U, S, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub users: U,
    pub settings: S,
    pub methods: MethodStore<R, C>,
}

impl<U, S, R, C> DisableEmailUseCase<U, S, R, C>
where
    U: UserRepository,
    S: SettingsRepository,
    R: MethodRepository,
    C: MethodCache,
{
    pub async fn execute(&self, user_id: Uuid) -> Result<(), MfaServiceError> {
        if let Some(method) = self
            .methods
            .find_by_user_and_kind(user_id, MethodKind::Email, false)
            .await?
        {
            if method.is_active {
                self.methods.deactivate(method.id).await?;
            }
        }
        self.settings
            .upsert(
                user_id,
                &SettingsPatch {
                    email_enabled: Some(false),
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
