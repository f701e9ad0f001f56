//! Per-address recipient entity with denormalized open/click counters

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "recipients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub email_id: i64,
    pub address: String,
    pub display_name: Option<String>,
    /// Destination header the address appeared in: "to", "cc" or "bcc"
    pub kind: String,
    /// Open-pixel lookup key; null when the email was sent with tracking disabled
    pub open_token: Option<String>,
    pub open_count: i64,
    pub first_opened_at: Option<DateTimeUtc>,
    pub last_opened_at: Option<DateTimeUtc>,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
