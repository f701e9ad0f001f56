//! Engagement analytics read service
//!
//! Read-only aggregation over the tracking schema for the reporting UI.
//! Summaries are pure reductions over the denormalized recipient counters;
//! the drill-down view additionally walks the event log for device history.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tracing::debug;

use crate::errors::Result;
use crate::storage::SeaOrmStorage;

use migration::entities::{email, link, link_recipient, recipient, tracking_event};

/// Per-recipient engagement counters for the batch summary view
#[derive(Debug, Clone, Serialize)]
pub struct RecipientSummary {
    pub address: String,
    pub kind: String,
    pub open_count: i64,
    pub first_opened_at: Option<DateTime<Utc>>,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

/// Engagement summary for one email
#[derive(Debug, Clone, Serialize)]
pub struct EmailSummary {
    pub tracking_enabled: bool,
    pub sent_at: DateTime<Utc>,
    pub subject: Option<String>,
    pub total_opens: i64,
    pub total_clicks: i64,
    pub recipients: Vec<RecipientSummary>,
}

/// One device observed for a recipient, deduplicated by (family, kind)
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSighting {
    pub family: Option<String>,
    pub kind: Option<String>,
    pub last_seen: DateTime<Utc>,
}

/// Drill-down per-recipient view: counters plus device history
#[derive(Debug, Clone, Serialize)]
pub struct RecipientDetail {
    pub address: String,
    pub kind: String,
    pub open_count: i64,
    pub first_opened_at: Option<DateTime<Utc>>,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
    /// Devices seen for this recipient, most recent first
    pub devices: Vec<DeviceSighting>,
}

/// Per-link per-recipient click breakdown entry
#[derive(Debug, Clone, Serialize)]
pub struct LinkRecipientClicks {
    pub address: String,
    pub click_count: i64,
    pub first_clicked_at: Option<DateTime<Utc>>,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

/// Drill-down per-link view
#[derive(Debug, Clone, Serialize)]
pub struct LinkDetail {
    pub url: String,
    pub position: i32,
    pub total_clicks: i64,
    /// Recipient breakdown ordered by click count descending
    pub recipients: Vec<LinkRecipientClicks>,
}

/// Full drill-down view of one email's engagement
#[derive(Debug, Clone, Serialize)]
pub struct EmailDetail {
    pub message_id: String,
    pub subject: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub tracking_enabled: bool,
    pub total_opens: i64,
    pub total_clicks: i64,
    pub recipients: Vec<RecipientDetail>,
    pub links: Vec<LinkDetail>,
}

/// Read-side analytics over prepared emails.
/// Takes no locks and never blocks the recording path; results are
/// eventually consistent with the latest committed recording transaction.
pub struct EngagementAnalyticsService {
    storage: Arc<SeaOrmStorage>,
}

impl EngagementAnalyticsService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    /// Batch engagement summaries keyed by message id.
    ///
    /// Message ids with no matching email for the tenant are simply absent
    /// from the result map. Totals are sums of the per-recipient counters,
    /// never recomputed from the event log.
    pub async fn summaries(
        &self,
        tenant_id: &str,
        message_ids: &[String],
    ) -> Result<HashMap<String, EmailSummary>> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let db = self.storage.get_db();

        let emails = email::Entity::find()
            .filter(email::Column::TenantId.eq(tenant_id))
            .filter(email::Column::MessageId.is_in(message_ids.iter().cloned()))
            .all(db)
            .await?;

        if emails.is_empty() {
            return Ok(HashMap::new());
        }

        let email_ids: Vec<i64> = emails.iter().map(|e| e.id).collect();
        let mut recipients_by_email: HashMap<i64, Vec<recipient::Model>> = HashMap::new();
        for model in recipient::Entity::find()
            .filter(recipient::Column::EmailId.is_in(email_ids))
            .all(db)
            .await?
        {
            recipients_by_email
                .entry(model.email_id)
                .or_default()
                .push(model);
        }

        let mut result = HashMap::with_capacity(emails.len());
        for email_model in emails {
            let recipients = recipients_by_email
                .remove(&email_model.id)
                .unwrap_or_default();

            let total_opens = recipients.iter().map(|r| r.open_count).sum();
            let total_clicks = recipients.iter().map(|r| r.click_count).sum();

            result.insert(
                email_model.message_id.clone(),
                EmailSummary {
                    tracking_enabled: email_model.tracking_enabled,
                    sent_at: email_model.sent_at,
                    subject: email_model.subject,
                    total_opens,
                    total_clicks,
                    recipients: recipients
                        .into_iter()
                        .map(|r| RecipientSummary {
                            address: r.address,
                            kind: r.kind,
                            open_count: r.open_count,
                            first_opened_at: r.first_opened_at,
                            last_opened_at: r.last_opened_at,
                            click_count: r.click_count,
                            last_clicked_at: r.last_clicked_at,
                        })
                        .collect(),
                },
            );
        }

        debug!(
            "Analytics: summaries for tenant '{}' resolved {}/{} message ids",
            tenant_id,
            result.len(),
            message_ids.len()
        );
        Ok(result)
    }

    /// Full drill-down for one email, None when the tenant has no email
    /// with that message id.
    pub async fn detail(&self, tenant_id: &str, message_id: &str) -> Result<Option<EmailDetail>> {
        let db = self.storage.get_db();

        let Some(email_model) = email::Entity::find()
            .filter(email::Column::TenantId.eq(tenant_id))
            .filter(email::Column::MessageId.eq(message_id))
            .one(db)
            .await?
        else {
            return Ok(None);
        };

        let recipients = recipient::Entity::find()
            .filter(recipient::Column::EmailId.eq(email_model.id))
            .all(db)
            .await?;

        let links = link::Entity::find()
            .filter(link::Column::EmailId.eq(email_model.id))
            .order_by_asc(link::Column::Position)
            .all(db)
            .await?;

        let link_ids: Vec<i64> = links.iter().map(|l| l.id).collect();
        let pairs = if link_ids.is_empty() {
            Vec::new()
        } else {
            link_recipient::Entity::find()
                .filter(link_recipient::Column::LinkId.is_in(link_ids))
                .all(db)
                .await?
        };

        let events = tracking_event::Entity::find()
            .filter(tracking_event::Column::EmailId.eq(email_model.id))
            .all(db)
            .await?;

        let address_by_recipient: HashMap<i64, String> = recipients
            .iter()
            .map(|r| (r.id, r.address.clone()))
            .collect();

        // Device history: dedupe by fingerprint, keep the latest sighting
        let mut devices_by_recipient = Self::collect_device_sightings(&events);

        let total_opens = recipients.iter().map(|r| r.open_count).sum();
        let total_clicks = recipients.iter().map(|r| r.click_count).sum();

        let recipient_details = recipients
            .into_iter()
            .map(|r| RecipientDetail {
                devices: devices_by_recipient.remove(&r.id).unwrap_or_default(),
                address: r.address,
                kind: r.kind,
                open_count: r.open_count,
                first_opened_at: r.first_opened_at,
                last_opened_at: r.last_opened_at,
                click_count: r.click_count,
                last_clicked_at: r.last_clicked_at,
            })
            .collect();

        let mut pairs_by_link: HashMap<i64, Vec<link_recipient::Model>> = HashMap::new();
        for pair in pairs {
            pairs_by_link.entry(pair.link_id).or_default().push(pair);
        }

        let link_details = links
            .into_iter()
            .map(|l| {
                let mut breakdown: Vec<LinkRecipientClicks> = pairs_by_link
                    .remove(&l.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|pair| LinkRecipientClicks {
                        address: address_by_recipient
                            .get(&pair.recipient_id)
                            .cloned()
                            .unwrap_or_default(),
                        click_count: pair.click_count,
                        first_clicked_at: pair.first_clicked_at,
                        last_clicked_at: pair.last_clicked_at,
                    })
                    .collect();
                breakdown.sort_by(|a, b| b.click_count.cmp(&a.click_count));

                LinkDetail {
                    total_clicks: breakdown.iter().map(|p| p.click_count).sum(),
                    url: l.url,
                    position: l.position,
                    recipients: breakdown,
                }
            })
            .collect();

        Ok(Some(EmailDetail {
            message_id: email_model.message_id,
            subject: email_model.subject,
            sent_at: email_model.sent_at,
            tracking_enabled: email_model.tracking_enabled,
            total_opens,
            total_clicks,
            recipients: recipient_details,
            links: link_details,
        }))
    }

    fn collect_device_sightings(
        events: &[tracking_event::Model],
    ) -> HashMap<i64, Vec<DeviceSighting>> {
        let mut latest: HashMap<i64, HashMap<(Option<String>, Option<String>), DateTime<Utc>>> =
            HashMap::new();

        for event in events {
            if event.device_family.is_none() && event.device_type.is_none() {
                continue;
            }
            let fingerprint = (event.device_family.clone(), event.device_type.clone());
            let per_recipient = latest.entry(event.recipient_id).or_default();
            let entry = per_recipient.entry(fingerprint).or_insert(event.occurred_at);
            if event.occurred_at > *entry {
                *entry = event.occurred_at;
            }
        }

        latest
            .into_iter()
            .map(|(recipient_id, fingerprints)| {
                let mut sightings: Vec<DeviceSighting> = fingerprints
                    .into_iter()
                    .map(|((family, kind), last_seen)| DeviceSighting {
                        family,
                        kind,
                        last_seen,
                    })
                    .collect();
                sightings.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
                (recipient_id, sightings)
            })
            .collect()
    }
}
