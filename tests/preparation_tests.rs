//! Tracking preparation tests
//!
//! Covers the instrument-this-email boundary: atomic fan-out creation,
//! per-recipient HTML personalization and the tracking-disabled path.

use std::collections::HashSet;
use std::sync::{Arc, Once};

use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tempfile::TempDir;

use mailbeacon::config::init_config;
use mailbeacon::errors::MailbeaconError;
use mailbeacon::services::{
    PrepareRequest, RecipientInput, RecipientKind, TrackingPreparationService,
};
use mailbeacon::storage::SeaOrmStorage;

use migration::entities::{email, link, link_recipient, recipient};

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    init_test_config();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::new(&db_url, "sqlite")
        .await
        .expect("Failed to create storage");

    (Arc::new(storage), temp_dir)
}

const SAMPLE_HTML: &str = concat!(
    "<html><body>",
    r#"<p>Your invoice is ready: <a href="https://portal.example.com/invoice/42">view it</a></p>"#,
    r#"<p><a href="mailto:billing@example.com">questions?</a></p>"#,
    r#"<p><a href="https://example.com/unsubscribe">unsubscribe</a></p>"#,
    "</body></html>",
);

fn sample_request(message_id: &str, tracking_enabled: bool) -> PrepareRequest {
    PrepareRequest {
        tenant_id: "tenant-1".to_string(),
        message_id: message_id.to_string(),
        subject: Some("Invoice #42".to_string()),
        sent_at: Utc::now(),
        html: SAMPLE_HTML.to_string(),
        recipients: vec![
            RecipientInput {
                address: "a@x.com".to_string(),
                display_name: Some("Alice".to_string()),
                kind: RecipientKind::To,
            },
            RecipientInput {
                address: "b@x.com".to_string(),
                display_name: None,
                kind: RecipientKind::Cc,
            },
        ],
        tracking_enabled,
    }
}

#[tokio::test]
async fn test_prepare_creates_full_fan_out() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage.clone());

    let prepared = service
        .prepare(sample_request("msg-1", true))
        .await
        .expect("prepare failed");

    // 1 email, 2 recipients, 2 links (mailto skipped), 4 link_recipients
    assert_eq!(prepared.recipients.len(), 2);
    assert_eq!(prepared.links.len(), 2);
    assert_eq!(prepared.links[0].position, 0);
    assert_eq!(prepared.links[0].url, "https://portal.example.com/invoice/42");
    assert_eq!(prepared.links[1].position, 1);
    assert_eq!(prepared.links[1].url, "https://example.com/unsubscribe");

    let db = storage.get_db();
    assert_eq!(email::Entity::find().count(db).await.unwrap(), 1);
    assert_eq!(recipient::Entity::find().count(db).await.unwrap(), 2);
    assert_eq!(link::Entity::find().count(db).await.unwrap(), 2);
    assert_eq!(link_recipient::Entity::find().count(db).await.unwrap(), 4);
}

#[tokio::test]
async fn test_prepare_personalizes_html_per_recipient() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage);

    let prepared = service
        .prepare(sample_request("msg-1", true))
        .await
        .expect("prepare failed");

    for payload in &prepared.recipients {
        let token = payload
            .recipient
            .open_token
            .as_ref()
            .expect("open token minted");

        // Pixel keyed by this recipient's own token
        assert!(payload
            .html
            .contains(&format!("/track-open/{}.png", token)));

        // Both trackable anchors rewritten, originals gone
        assert_eq!(payload.html.matches("/track-click/").count(), 2);
        assert!(!payload.html.contains("https://portal.example.com/invoice/42"));
        assert!(!payload.html.contains("https://example.com/unsubscribe"));

        // The mailto anchor is untouched
        assert!(payload.html.contains("mailto:billing@example.com"));
    }

    // Payloads are personalized, not shared
    assert_ne!(prepared.recipients[0].html, prepared.recipients[1].html);
}

#[tokio::test]
async fn test_prepare_rejects_empty_recipients() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage.clone());

    let mut req = sample_request("msg-1", true);
    req.recipients.clear();

    let err = service.prepare(req).await.unwrap_err();
    assert!(matches!(err, MailbeaconError::Validation(_)));

    // Nothing was written
    let db = storage.get_db();
    assert_eq!(email::Entity::find().count(db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_prepare_with_tracking_disabled() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage.clone());

    let prepared = service
        .prepare(sample_request("msg-1", false))
        .await
        .expect("prepare failed");

    assert!(!prepared.email.tracking_enabled);
    assert!(prepared.links.is_empty());

    for payload in &prepared.recipients {
        // No tokens minted, HTML passed through byte for byte
        assert!(payload.recipient.open_token.is_none());
        assert_eq!(payload.html, SAMPLE_HTML);
    }

    let db = storage.get_db();
    assert_eq!(recipient::Entity::find().count(db).await.unwrap(), 2);
    assert_eq!(link::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(link_recipient::Entity::find().count(db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_prepare_duplicate_message_id_fails_loudly() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage.clone());

    service
        .prepare(sample_request("msg-1", true))
        .await
        .expect("first prepare failed");

    let err = service.prepare(sample_request("msg-1", true)).await;
    assert!(err.is_err());

    // The failed attempt left no extra rows behind
    let db = storage.get_db();
    assert_eq!(email::Entity::find().count(db).await.unwrap(), 1);
    assert_eq!(recipient::Entity::find().count(db).await.unwrap(), 2);
}

#[tokio::test]
async fn test_prepare_same_message_id_different_tenant_is_fine() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage);

    service
        .prepare(sample_request("msg-1", true))
        .await
        .expect("first prepare failed");

    let mut req = sample_request("msg-1", true);
    req.tenant_id = "tenant-2".to_string();
    service.prepare(req).await.expect("second prepare failed");
}

#[tokio::test]
async fn test_tokens_unique_across_emails() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage.clone());

    let first = service
        .prepare(sample_request("msg-1", true))
        .await
        .expect("prepare failed");
    let second = service
        .prepare(sample_request("msg-2", true))
        .await
        .expect("prepare failed");

    let mut seen = HashSet::new();
    for payload in first.recipients.iter().chain(second.recipients.iter()) {
        let token = payload.recipient.open_token.clone().unwrap();
        assert!(seen.insert(token), "open token reused");
    }

    let db = storage.get_db();
    for pair in link_recipient::Entity::find().all(db).await.unwrap() {
        assert!(seen.insert(pair.token), "click token reused");
    }
    // 4 open tokens + 8 click tokens across the two emails
    assert_eq!(seen.len(), 12);
}

#[tokio::test]
async fn test_duplicate_urls_get_distinct_positions() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage);

    let mut req = sample_request("msg-1", true);
    req.html = concat!(
        "<html><body>",
        r#"<a href="https://example.com/offer">here</a>"#,
        r#"<a href="https://example.com/offer">or here</a>"#,
        "</body></html>",
    )
    .to_string();

    let prepared = service.prepare(req).await.expect("prepare failed");

    // Same URL at two positions stays two distinct links
    assert_eq!(prepared.links.len(), 2);
    assert_eq!(prepared.links[0].url, prepared.links[1].url);
    assert_ne!(prepared.links[0].position, prepared.links[1].position);
}

#[tokio::test]
async fn test_prepare_with_no_trackable_links_still_injects_pixel() {
    let (storage, _dir) = create_temp_storage().await;
    let service = TrackingPreparationService::new(storage.clone());

    let mut req = sample_request("msg-1", true);
    req.html = "<html><body><p>No links here.</p></body></html>".to_string();

    let prepared = service.prepare(req).await.expect("prepare failed");

    assert!(prepared.links.is_empty());
    let db = storage.get_db();
    assert_eq!(link_recipient::Entity::find().count(db).await.unwrap(), 0);

    for payload in &prepared.recipients {
        assert!(payload.html.contains("/track-open/"));
    }

    // Recipients keep their tokens so opens still record
    let with_tokens = recipient::Entity::find()
        .filter(recipient::Column::OpenToken.is_not_null())
        .count(db)
        .await
        .unwrap();
    assert_eq!(with_tokens, 2);
}
