use sea_orm::entity::prelude::*;

/// Minimal user record owned by the MFA service.
/// Stores only the fields needed here: email for code delivery and the
/// account-level MFA flag the login flow reads.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub mfa_enabled: bool,
    pub mfa_method: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::mfa_methods::Entity")]
    MfaMethods,
    #[sea_orm(has_many = "super::mfa_challenges::Entity")]
    MfaChallenges,
}

impl Related<super::mfa_methods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MfaMethods.def()
    }
}

impl Related<super::mfa_challenges::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MfaChallenges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
