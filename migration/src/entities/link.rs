//! Tracked hyperlink entity, keyed by extraction position within one email

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub email_id: i64,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    /// 0-based document-order position among trackable anchors.
    /// Two identical URLs at different positions are two distinct rows.
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
