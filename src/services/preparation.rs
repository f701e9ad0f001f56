//! Tracking preparation service
//!
//! The domain boundary for "instrument this outgoing email": extracts
//! trackable links, mints per-recipient tokens, persists the whole fan-out
//! (email, recipients, links, link x recipient pairs) in one transaction and
//! produces the personalized HTML payload for every recipient.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, TransactionTrait};
use tracing::info;

use crate::config::get_config;
use crate::errors::{MailbeaconError, Result};
use crate::html::{TrackedLink, extract_links, inject_tracking};
use crate::storage::SeaOrmStorage;
use crate::utils::generate_token;

use migration::entities::{email, link, link_recipient, recipient};

/// Destination header an address appeared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecipientKind {
    #[default]
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::To => "to",
            RecipientKind::Cc => "cc",
            RecipientKind::Bcc => "bcc",
        }
    }
}

impl std::fmt::Display for RecipientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One destination address of an outgoing email
#[derive(Debug, Clone)]
pub struct RecipientInput {
    pub address: String,
    pub display_name: Option<String>,
    pub kind: RecipientKind,
}

/// Request to instrument one outgoing email
#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub tenant_id: String,
    /// External message identifier, unique per tenant
    pub message_id: String,
    pub subject: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub html: String,
    pub recipients: Vec<RecipientInput>,
    pub tracking_enabled: bool,
}

/// One recipient's personalized payload
#[derive(Debug, Clone)]
pub struct RecipientPayload {
    pub recipient: recipient::Model,
    /// The HTML to hand to the mail transport for this recipient
    pub html: String,
}

/// Result of preparing one email
#[derive(Debug, Clone)]
pub struct PreparedEmail {
    pub email: email::Model,
    pub recipients: Vec<RecipientPayload>,
    pub links: Vec<link::Model>,
}

/// Service orchestrating link extraction, token minting and HTML injection
pub struct TrackingPreparationService {
    storage: Arc<SeaOrmStorage>,
}

impl TrackingPreparationService {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    /// Instrument an outgoing email.
    ///
    /// All entity creation happens in one transaction; a failure leaves no
    /// rows behind. Preparing the same (tenant_id, message_id) twice fails
    /// loudly on the unique index instead of silently minting new tokens.
    ///
    /// This is the only place tokens are minted; tokens are never reused
    /// across emails.
    pub async fn prepare(&self, req: PrepareRequest) -> Result<PreparedEmail> {
        if req.recipients.is_empty() {
            return Err(MailbeaconError::validation(
                "Cannot prepare an email without recipients",
            ));
        }

        let config = get_config();
        let base_url = config.tracking.public_base_url.trim_end_matches('/');
        if req.tracking_enabled && base_url.is_empty() {
            return Err(MailbeaconError::validation(
                "tracking.public_base_url must be set when tracking is enabled",
            ));
        }
        let token_length = config.tracking.token_length;

        // One extraction pass; injection below re-applies the same traversal
        let extracted: Vec<TrackedLink> = if req.tracking_enabled {
            extract_links(&req.html)
        } else {
            Vec::new()
        };

        let db = self.storage.get_db();
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            MailbeaconError::database_operation(format!("Failed to begin transaction: {}", e))
        })?;

        let email_model = email::ActiveModel {
            tenant_id: Set(req.tenant_id.clone()),
            message_id: Set(req.message_id.clone()),
            subject: Set(req.subject.clone()),
            sent_at: Set(req.sent_at),
            tracking_enabled: Set(req.tracking_enabled),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            MailbeaconError::database_operation(format!(
                "Failed to create email '{}': {}",
                req.message_id, e
            ))
        })?;

        let mut recipient_models = Vec::with_capacity(req.recipients.len());
        for input in &req.recipients {
            let open_token = req
                .tracking_enabled
                .then(|| generate_token(token_length));

            let model = recipient::ActiveModel {
                email_id: Set(email_model.id),
                address: Set(input.address.clone()),
                display_name: Set(input.display_name.clone()),
                kind: Set(input.kind.as_str().to_string()),
                open_token: Set(open_token),
                open_count: Set(0),
                first_opened_at: Set(None),
                last_opened_at: Set(None),
                click_count: Set(0),
                last_clicked_at: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                MailbeaconError::database_operation(format!(
                    "Failed to create recipient '{}': {}",
                    input.address, e
                ))
            })?;

            recipient_models.push(model);
        }

        let mut link_models = Vec::with_capacity(extracted.len());
        for tracked in &extracted {
            let model = link::ActiveModel {
                email_id: Set(email_model.id),
                url: Set(tracked.url.clone()),
                position: Set(tracked.position as i32),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                MailbeaconError::database_operation(format!(
                    "Failed to create link at position {}: {}",
                    tracked.position, e
                ))
            })?;

            link_models.push(model);
        }

        // Full cross product: every recipient can click every link
        // independently, so the junction rows exist up front.
        let mut click_tokens: HashMap<(i64, usize), String> = HashMap::new();
        let mut pair_models = Vec::with_capacity(link_models.len() * recipient_models.len());
        for link_model in &link_models {
            for recipient_model in &recipient_models {
                let token = generate_token(token_length);
                click_tokens.insert(
                    (recipient_model.id, link_model.position as usize),
                    token.clone(),
                );
                pair_models.push(link_recipient::ActiveModel {
                    link_id: Set(link_model.id),
                    recipient_id: Set(recipient_model.id),
                    token: Set(token),
                    click_count: Set(0),
                    first_clicked_at: Set(None),
                    last_clicked_at: Set(None),
                    ..Default::default()
                });
            }
        }

        if !pair_models.is_empty() {
            link_recipient::Entity::insert_many(pair_models)
                .exec(&txn)
                .await
                .map_err(|e| {
                    MailbeaconError::database_operation(format!(
                        "Failed to create link recipients: {}",
                        e
                    ))
                })?;
        }

        txn.commit().await.map_err(|e| {
            MailbeaconError::database_operation(format!("Failed to commit transaction: {}", e))
        })?;

        let recipients = recipient_models
            .into_iter()
            .map(|model| {
                let html = if req.tracking_enabled {
                    let pixel_url = model
                        .open_token
                        .as_ref()
                        .map(|token| format!("{}/track-open/{}.png", base_url, token));
                    let redirects: HashMap<usize, String> = extracted
                        .iter()
                        .filter_map(|tracked| {
                            click_tokens
                                .get(&(model.id, tracked.position))
                                .map(|token| {
                                    (
                                        tracked.position,
                                        format!("{}/track-click/{}", base_url, token),
                                    )
                                })
                        })
                        .collect();
                    inject_tracking(&req.html, pixel_url.as_deref(), &redirects)
                } else {
                    req.html.clone()
                };

                RecipientPayload {
                    recipient: model,
                    html,
                }
            })
            .collect::<Vec<_>>();

        info!(
            "Prepared email '{}' for tenant '{}': {} recipients, {} links, tracking {}",
            email_model.message_id,
            email_model.tenant_id,
            recipients.len(),
            link_models.len(),
            if req.tracking_enabled { "on" } else { "off" }
        );

        Ok(PreparedEmail {
            email: email_model,
            recipients,
            links: link_models,
        })
    }
}
