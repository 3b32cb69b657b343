use sea_orm::entity::prelude::*;

/// Per-user MFA settings aggregate: secrets, enablement flags, and
/// backup-code bookkeeping. At most one row per user, created lazily
/// on first write.
///
/// `backup_codes_used` only ever grows within a batch; codes are never
/// removed from `backup_codes`, only marked consumed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "mfa_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub sms_enabled: bool,
    pub sms_phone: Option<String>,
    pub email_enabled: bool,
    pub mfa_enforced: bool,
    pub backup_codes: Vec<String>,
    pub backup_codes_used: Vec<String>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
