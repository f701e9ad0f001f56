//! Initial engagement tracking schema
//!
//! Creates the five tracking tables:
//! - emails: one row per instrumented send
//! - recipients: per-address rows with open/click counters
//! - links: trackable anchors keyed by document position
//! - link_recipients: link x recipient cross product with click tokens
//! - tracking_events: append-only open/click log

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Emails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Emails::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Emails::TenantId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Emails::MessageId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Emails::Subject).text().null())
                    .col(
                        ColumnDef::new(Emails::SentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Emails::TrackingEnabled).boolean().not_null())
                    .col(
                        ColumnDef::new(Emails::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Accidental double preparation must fail loudly, not mint new tokens
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("idx_emails_tenant_message")
                    .table(Emails::Table)
                    .col(Emails::TenantId)
                    .col(Emails::MessageId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Recipients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Recipients::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Recipients::EmailId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Recipients::Address)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Recipients::DisplayName).string_len(255).null())
                    .col(ColumnDef::new(Recipients::Kind).string_len(8).not_null())
                    .col(
                        ColumnDef::new(Recipients::OpenToken)
                            .string_len(64)
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Recipients::OpenCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Recipients::FirstOpenedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Recipients::LastOpenedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Recipients::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Recipients::LastClickedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recipients_email")
                            .from(Recipients::Table, Recipients::EmailId)
                            .to(Emails::Table, Emails::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_recipients_email_id")
                    .table(Recipients::Table)
                    .col(Recipients::EmailId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Links::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Links::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Links::EmailId).big_integer().not_null())
                    .col(ColumnDef::new(Links::Url).text().not_null())
                    .col(ColumnDef::new(Links::Position).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_links_email")
                            .from(Links::Table, Links::EmailId)
                            .to(Emails::Table, Emails::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("idx_links_email_position")
                    .table(Links::Table)
                    .col(Links::EmailId)
                    .col(Links::Position)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LinkRecipients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LinkRecipients::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(LinkRecipients::LinkId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LinkRecipients::RecipientId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LinkRecipients::Token)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(LinkRecipients::ClickCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LinkRecipients::FirstClickedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LinkRecipients::LastClickedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_link_recipients_link")
                            .from(LinkRecipients::Table, LinkRecipients::LinkId)
                            .to(Links::Table, Links::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_link_recipients_recipient")
                            .from(LinkRecipients::Table, LinkRecipients::RecipientId)
                            .to(Recipients::Table, Recipients::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .unique()
                    .name("idx_link_recipients_pair")
                    .table(LinkRecipients::Table)
                    .col(LinkRecipients::LinkId)
                    .col(LinkRecipients::RecipientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TrackingEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackingEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TrackingEvents::EventType)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackingEvents::EmailId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackingEvents::RecipientId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackingEvents::LinkId).big_integer().null())
                    .col(
                        ColumnDef::new(TrackingEvents::LinkRecipientId)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TrackingEvents::OccurredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackingEvents::UserAgent).text().null())
                    .col(
                        ColumnDef::new(TrackingEvents::DeviceFamily)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TrackingEvents::DeviceType)
                            .string_len(32)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TrackingEvents::IpAddress)
                            .string_len(45)
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracking_events_email")
                            .from(TrackingEvents::Table, TrackingEvents::EmailId)
                            .to(Emails::Table, Emails::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Dedup lookup: most recent open for one recipient
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracking_events_recipient_type_time")
                    .table(TrackingEvents::Table)
                    .col(TrackingEvents::RecipientId)
                    .col(TrackingEvents::EventType)
                    .col(TrackingEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        // Dedup lookup: most recent click for one link_recipient
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracking_events_link_recipient_time")
                    .table(TrackingEvents::Table)
                    .col(TrackingEvents::LinkRecipientId)
                    .col(TrackingEvents::OccurredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tracking_events_email_id")
                    .table(TrackingEvents::Table)
                    .col(TrackingEvents::EmailId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackingEvents::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(LinkRecipients::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Links::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Recipients::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Emails::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Emails {
    #[sea_orm(iden = "emails")]
    Table,
    Id,
    TenantId,
    MessageId,
    Subject,
    SentAt,
    TrackingEnabled,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Recipients {
    #[sea_orm(iden = "recipients")]
    Table,
    Id,
    EmailId,
    Address,
    DisplayName,
    Kind,
    OpenToken,
    OpenCount,
    FirstOpenedAt,
    LastOpenedAt,
    ClickCount,
    LastClickedAt,
}

#[derive(DeriveIden)]
enum Links {
    #[sea_orm(iden = "links")]
    Table,
    Id,
    EmailId,
    Url,
    Position,
}

#[derive(DeriveIden)]
enum LinkRecipients {
    #[sea_orm(iden = "link_recipients")]
    Table,
    Id,
    LinkId,
    RecipientId,
    Token,
    ClickCount,
    FirstClickedAt,
    LastClickedAt,
}

#[derive(DeriveIden)]
enum TrackingEvents {
    #[sea_orm(iden = "tracking_events")]
    Table,
    Id,
    EventType,
    EmailId,
    RecipientId,
    LinkId,
    LinkRecipientId,
    OccurredAt,
    UserAgent,
    DeviceFamily,
    DeviceType,
    IpAddress,
}
