use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MfaServiceError;

/// Second-factor kind. One live credential record per `(user, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Totp,
    Sms,
    Email,
}

impl MethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Sms => "sms",
            Self::Email => "email",
        }
    }

    /// Human label used in error messages ("TOTP method already exists ...").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Totp => "TOTP",
            Self::Sms => "SMS",
            Self::Email => "Email",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodKind {
    type Err = MfaServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "totp" => Ok(Self::Totp),
            "sms" => Ok(Self::Sms),
            "email" => Ok(Self::Email),
            _ => Err(MfaServiceError::InvalidMethodKind),
        }
    }
}

/// Enrolled second-factor credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: MethodKind,
    pub secret: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field patch for a credential record. `None` leaves a field untouched;
/// the inner `Option` carries explicit nulls.
#[derive(Debug, Clone, Default)]
pub struct MethodPatch {
    pub secret: Option<Option<String>>,
    pub phone_number: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Per-user MFA settings aggregate (secrets, flags, backup codes).
#[derive(Debug, Clone)]
pub struct MfaSettings {
    pub user_id: Uuid,
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub sms_enabled: bool,
    pub sms_phone: Option<String>,
    pub email_enabled: bool,
    pub mfa_enforced: bool,
    pub backup_codes: Vec<String>,
    pub backup_codes_used: Vec<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial settings write. Each flow touches only its own fields; upsert
/// must never clobber the rest. Double-`Option` fields distinguish
/// "leave alone" from "set to null".
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub totp_secret: Option<Option<String>>,
    pub totp_enabled: Option<bool>,
    pub sms_enabled: Option<bool>,
    pub sms_phone: Option<Option<String>>,
    pub email_enabled: Option<bool>,
    pub mfa_enforced: Option<bool>,
    pub backup_codes: Option<Vec<String>>,
    pub backup_codes_used: Option<Vec<String>>,
    pub last_used_at: Option<Option<DateTime<Utc>>>,
}

/// What an ephemeral verification code authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengePurpose {
    SmsMfa,
    EmailMfa,
}

impl ChallengePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmsMfa => "sms_mfa",
            Self::EmailMfa => "email_mfa",
        }
    }

    /// Validity window: 5 minutes for SMS codes, 10 minutes for email codes.
    pub fn ttl_secs(&self) -> i64 {
        match self {
            Self::SmsMfa => SMS_CODE_TTL_SECS,
            Self::EmailMfa => EMAIL_CODE_TTL_SECS,
        }
    }
}

/// Short-lived SMS/email verification code.
#[derive(Debug, Clone)]
pub struct MfaChallenge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub purpose: ChallengePurpose,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MfaChallenge {
    pub fn is_valid(&self) -> bool {
        self.used_at.is_none() && self.expires_at > Utc::now()
    }
}

/// Outbox event for async code delivery (SMS/email relay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
}

/// Account-level view of a user as this service sees it.
#[derive(Debug, Clone)]
pub struct MfaUser {
    pub id: Uuid,
    pub email: String,
    pub mfa_enabled: bool,
    pub mfa_method: Option<String>,
}

/// Per-kind aggregate over a user's credential records (active + inactive).
#[derive(Debug, Clone, Serialize)]
pub struct MethodKindStats {
    pub kind: MethodKind,
    pub total: usize,
    pub active: usize,
    #[serde(serialize_with = "bilten_core::serde::to_rfc3339_ms")]
    pub first_created_at: DateTime<Utc>,
    #[serde(serialize_with = "bilten_core::serde::to_rfc3339_ms")]
    pub last_updated_at: DateTime<Utc>,
}

/// Roll-up of a user's enrollments across all kinds.
#[derive(Debug, Clone, Serialize)]
pub struct MfaStats {
    pub methods: Vec<MethodKindStats>,
    pub total_methods: usize,
    pub active_methods: usize,
    pub has_totp: bool,
    pub has_sms: bool,
    pub has_email: bool,
}

/// TOTP time-step length (RFC 6238).
pub const TOTP_STEP_SECS: u64 = 30;

/// TOTP code length in digits.
pub const TOTP_DIGITS: usize = 6;

/// Accepted clock-skew window, in time steps either side of now (±60s).
pub const TOTP_SKEW_STEPS: u64 = 2;

/// Raw TOTP secret length in bytes (before base32 encoding).
pub const TOTP_SECRET_BYTES: usize = 20;

/// Backup codes issued per batch.
pub const BACKUP_CODE_COUNT: usize = 10;

/// Random bytes per backup code (16 hex chars).
pub const BACKUP_CODE_BYTES: usize = 8;

/// SMS/email verification code length in decimal digits.
pub const CHALLENGE_CODE_LEN: usize = 6;

/// SMS verification code time-to-live in seconds.
pub const SMS_CODE_TTL_SECS: i64 = 300;

/// Email verification code time-to-live in seconds.
pub const EMAIL_CODE_TTL_SECS: i64 = 600;

/// Issuer shown by authenticator apps for provisioned accounts.
pub const OTP_ISSUER: &str = "Bilten";

/// Credential-record cache TTL in seconds.
pub const METHOD_CACHE_TTL_SECS: u64 = 300;
