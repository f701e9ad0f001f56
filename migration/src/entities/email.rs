//! Instrumented email send entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "emails")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: String,
    /// External message identifier, unique per tenant
    pub message_id: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub subject: Option<String>,
    pub sent_at: DateTimeUtc,
    pub tracking_enabled: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
