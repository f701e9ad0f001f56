//! Append-only open/click event log entity
//!
//! The durable record of what actually happened, independent of the
//! denormalized counters on recipients and link_recipients.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tracking_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// "open" or "click"
    pub event_type: String,
    pub email_id: i64,
    pub recipient_id: i64,
    pub link_id: Option<i64>,
    pub link_recipient_id: Option<i64>,
    pub occurred_at: DateTimeUtc,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    pub device_family: Option<String>,
    pub device_type: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
