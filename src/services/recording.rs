//! Event recording service
//!
//! Handles the unauthenticated, concurrent tracking hits coming back from
//! rendered mail clients: pixel fetches (opens) and redirect hits (clicks).
//!
//! Both operations are a read-then-conditional-write: fetch the most recent
//! prior event, decide duplicate-or-not, then apply the counter update and
//! the event append together in one transaction. The dedup decision itself
//! is not serialized against a concurrent hit on the same token; two
//! simultaneous hits can both count. Dedup only ever suppresses, it never
//! double-counts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use tracing::{debug, warn};

use crate::config::get_config;
use crate::errors::{MailbeaconError, Result};
use crate::services::device::{DeviceInfo, classify_user_agent};
use crate::storage::SeaOrmStorage;

use migration::entities::{link, link_recipient, recipient, tracking_event};

pub const EVENT_OPEN: &str = "open";
pub const EVENT_CLICK: &str = "click";

/// Everything the HTTP layer needs to answer a click: where to redirect,
/// plus the touched rows for logging/inspection.
#[derive(Debug, Clone)]
pub struct ClickResolution {
    pub url: String,
    pub link_recipient: link_recipient::Model,
    pub recipient: recipient::Model,
}

/// Service recording open and click telemetry behind token lookups
#[derive(Clone)]
pub struct EventRecordingService {
    storage: Arc<SeaOrmStorage>,
}

impl EventRecordingService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    /// Record an open signal for the recipient behind `token`.
    ///
    /// Returns None for an unknown token: the caller is an unauthenticated
    /// mail client that cannot act on an error, so a stale or foreign token
    /// is a silent no-op. A duplicate within the open dedup window (same raw
    /// user-agent, or same derived device fingerprint) changes nothing but
    /// still returns the recipient so the caller can respond normally.
    pub async fn record_open(
        &self,
        token: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<Option<recipient::Model>> {
        let db = self.storage.get_db();

        let Some(recipient_model) = recipient::Entity::find()
            .filter(recipient::Column::OpenToken.eq(token))
            .one(db)
            .await?
        else {
            debug!("Open token not found, ignoring hit");
            return Ok(None);
        };

        let now = Utc::now();
        let device = classify_user_agent(user_agent);
        let window = Duration::seconds(get_config().tracking.open_dedup_window_secs as i64);

        let prior = tracking_event::Entity::find()
            .filter(tracking_event::Column::RecipientId.eq(recipient_model.id))
            .filter(tracking_event::Column::EventType.eq(EVENT_OPEN))
            .order_by_desc(tracking_event::Column::OccurredAt)
            .one(db)
            .await?;

        if let Some(prior) = prior
            && now.signed_duration_since(prior.occurred_at) < window
            && (prior.user_agent.as_deref() == user_agent
                || Self::same_device(&prior, &device))
        {
            debug!(
                "Duplicate open for recipient {} within window, suppressed",
                recipient_model.id
            );
            return Ok(Some(recipient_model));
        }

        let txn = db.begin().await.map_err(|e| {
            MailbeaconError::database_operation(format!("Failed to begin transaction: {}", e))
        })?;

        let mut active: recipient::ActiveModel = recipient_model.clone().into();
        active.open_count = Set(recipient_model.open_count + 1);
        if recipient_model.first_opened_at.is_none() {
            active.first_opened_at = Set(Some(now));
        }
        active.last_opened_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        tracking_event::ActiveModel {
            event_type: Set(EVENT_OPEN.to_string()),
            email_id: Set(recipient_model.email_id),
            recipient_id: Set(recipient_model.id),
            link_id: Set(None),
            link_recipient_id: Set(None),
            occurred_at: Set(now),
            user_agent: Set(user_agent.map(String::from)),
            device_family: Set(device.family.clone()),
            device_type: Set(device.kind.clone()),
            ip_address: Set(ip_address.map(String::from)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            MailbeaconError::database_operation(format!("Failed to commit transaction: {}", e))
        })?;

        debug!(
            "Recorded open for recipient {} (count {})",
            updated.id, updated.open_count
        );
        Ok(Some(updated))
    }

    /// Record a click signal for the link x recipient pair behind `token`.
    ///
    /// Always resolves and returns the target URL when the token is known,
    /// duplicate or not: the HTTP layer must redirect the browser regardless
    /// of the dedup outcome. A duplicate within the click dedup window with
    /// the same raw user-agent changes no counters and appends no event.
    pub async fn record_click(
        &self,
        token: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<Option<ClickResolution>> {
        let db = self.storage.get_db();

        let Some(pair) = link_recipient::Entity::find()
            .filter(link_recipient::Column::Token.eq(token))
            .one(db)
            .await?
        else {
            debug!("Click token not found, ignoring hit");
            return Ok(None);
        };

        let Some(link_model) = link::Entity::find_by_id(pair.link_id).one(db).await? else {
            warn!("Link {} missing for link_recipient {}", pair.link_id, pair.id);
            return Ok(None);
        };
        let Some(recipient_model) = recipient::Entity::find_by_id(pair.recipient_id)
            .one(db)
            .await?
        else {
            warn!(
                "Recipient {} missing for link_recipient {}",
                pair.recipient_id, pair.id
            );
            return Ok(None);
        };

        let now = Utc::now();
        let window = Duration::seconds(get_config().tracking.click_dedup_window_secs as i64);

        let prior = tracking_event::Entity::find()
            .filter(tracking_event::Column::LinkRecipientId.eq(pair.id))
            .filter(tracking_event::Column::EventType.eq(EVENT_CLICK))
            .order_by_desc(tracking_event::Column::OccurredAt)
            .one(db)
            .await?;

        if let Some(prior) = prior
            && now.signed_duration_since(prior.occurred_at) < window
            && prior.user_agent.as_deref() == user_agent
        {
            debug!(
                "Duplicate click for link_recipient {} within window, suppressed",
                pair.id
            );
            return Ok(Some(ClickResolution {
                url: link_model.url,
                link_recipient: pair,
                recipient: recipient_model,
            }));
        }

        let device = classify_user_agent(user_agent);

        let txn = db.begin().await.map_err(|e| {
            MailbeaconError::database_operation(format!("Failed to begin transaction: {}", e))
        })?;

        let mut pair_active: link_recipient::ActiveModel = pair.clone().into();
        pair_active.click_count = Set(pair.click_count + 1);
        if pair.first_clicked_at.is_none() {
            pair_active.first_clicked_at = Set(Some(now));
        }
        pair_active.last_clicked_at = Set(Some(now));
        let updated_pair = pair_active.update(&txn).await?;

        let mut recipient_active: recipient::ActiveModel = recipient_model.clone().into();
        recipient_active.click_count = Set(recipient_model.click_count + 1);
        recipient_active.last_clicked_at = Set(Some(now));
        let updated_recipient = recipient_active.update(&txn).await?;

        tracking_event::ActiveModel {
            event_type: Set(EVENT_CLICK.to_string()),
            email_id: Set(recipient_model.email_id),
            recipient_id: Set(recipient_model.id),
            link_id: Set(Some(link_model.id)),
            link_recipient_id: Set(Some(pair.id)),
            occurred_at: Set(now),
            user_agent: Set(user_agent.map(String::from)),
            device_family: Set(device.family.clone()),
            device_type: Set(device.kind.clone()),
            ip_address: Set(ip_address.map(String::from)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            MailbeaconError::database_operation(format!("Failed to commit transaction: {}", e))
        })?;

        debug!(
            "Recorded click for link_recipient {} (count {})",
            updated_pair.id, updated_pair.click_count
        );
        Ok(Some(ClickResolution {
            url: link_model.url,
            link_recipient: updated_pair,
            recipient: updated_recipient,
        }))
    }

    /// Device fingerprints only match when they carry some signal; two
    /// unparseable user agents are not the same device.
    fn same_device(prior: &tracking_event::Model, device: &DeviceInfo) -> bool {
        device.is_identifiable()
            && prior.device_family == device.family
            && prior.device_type == device.kind
    }
}
