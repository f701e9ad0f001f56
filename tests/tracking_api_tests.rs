//! Tracking endpoint tests
//!
//! The pixel must come back for every request, the redirect must fire for
//! every known token. The mail client on the other end can't handle errors.

use std::sync::{Arc, Once};

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tempfile::TempDir;

use mailbeacon::api::services::tracking_routes;
use mailbeacon::config::init_config;
use mailbeacon::services::{
    EventRecordingService, PrepareRequest, PreparedEmail, RecipientInput, RecipientKind,
    TrackingPreparationService,
};
use mailbeacon::storage::SeaOrmStorage;

use migration::entities::{link_recipient, tracking_event};

static INIT: Once = Once::new();

fn init_test_config() {
    INIT.call_once(|| {
        init_config();
    });
}

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

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

async fn prepare_sample(storage: &Arc<SeaOrmStorage>) -> PreparedEmail {
    let service = TrackingPreparationService::new(storage.clone());
    service
        .prepare(PrepareRequest {
            tenant_id: "tenant-1".to_string(),
            message_id: "msg-1".to_string(),
            subject: None,
            sent_at: Utc::now(),
            html: r#"<html><body><a href="https://example.com/target">go</a></body></html>"#
                .to_string(),
            recipients: vec![RecipientInput {
                address: "a@x.com".to_string(),
                display_name: None,
                kind: RecipientKind::To,
            }],
            tracking_enabled: true,
        })
        .await
        .expect("prepare failed")
}

#[actix_web::test]
async fn test_open_pixel_returns_png_for_known_token() {
    let (storage, _dir) = create_temp_storage().await;
    let prepared = prepare_sample(&storage).await;
    let recording = EventRecordingService::new(storage.clone());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(recording))
            .service(tracking_routes()),
    )
    .await;

    let token = prepared.recipients[0]
        .recipient
        .open_token
        .clone()
        .unwrap();
    let req = TestRequest::get()
        .uri(&format!("/track-open/{}.png", token))
        .insert_header(("user-agent", CHROME_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/png"
    );
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );

    let body = test::read_body(resp).await;
    // PNG signature
    assert_eq!(&body[..4], &[0x89, b'P', b'N', b'G']);

    let event_count = tracking_event::Entity::find()
        .count(storage.get_db())
        .await
        .unwrap();
    assert_eq!(event_count, 1);
}

#[actix_web::test]
async fn test_open_pixel_returns_png_for_unknown_token() {
    let (storage, _dir) = create_temp_storage().await;
    prepare_sample(&storage).await;
    let recording = EventRecordingService::new(storage.clone());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(recording))
            .service(tracking_routes()),
    )
    .await;

    let req = TestRequest::get()
        .uri("/track-open/neverissued.png")
        .to_request();
    let resp = test::call_service(&app, req).await;

    // Never an error towards the mail client
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..4], &[0x89, b'P', b'N', b'G']);

    let event_count = tracking_event::Entity::find()
        .count(storage.get_db())
        .await
        .unwrap();
    assert_eq!(event_count, 0);
}

#[actix_web::test]
async fn test_click_redirects_to_target() {
    let (storage, _dir) = create_temp_storage().await;
    let prepared = prepare_sample(&storage).await;
    let recording = EventRecordingService::new(storage.clone());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(recording))
            .service(tracking_routes()),
    )
    .await;

    let pair = link_recipient::Entity::find()
        .filter(link_recipient::Column::LinkId.eq(prepared.links[0].id))
        .one(storage.get_db())
        .await
        .unwrap()
        .unwrap();

    let req = TestRequest::get()
        .uri(&format!("/track-click/{}", pair.token))
        .insert_header(("user-agent", CHROME_UA))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        resp.headers().get("location").unwrap(),
        "https://example.com/target"
    );
}

#[actix_web::test]
async fn test_click_redirects_even_when_deduplicated() {
    let (storage, _dir) = create_temp_storage().await;
    let prepared = prepare_sample(&storage).await;
    let recording = EventRecordingService::new(storage.clone());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(recording))
            .service(tracking_routes()),
    )
    .await;

    let pair = link_recipient::Entity::find()
        .filter(link_recipient::Column::LinkId.eq(prepared.links[0].id))
        .one(storage.get_db())
        .await
        .unwrap()
        .unwrap();

    for _ in 0..2 {
        let req = TestRequest::get()
            .uri(&format!("/track-click/{}", pair.token))
            .insert_header(("user-agent", CHROME_UA))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            resp.headers().get("location").unwrap(),
            "https://example.com/target"
        );
    }

    // Second hit was suppressed but still redirected
    let event_count = tracking_event::Entity::find()
        .count(storage.get_db())
        .await
        .unwrap();
    assert_eq!(event_count, 1);
}

#[actix_web::test]
async fn test_click_unknown_token_is_not_found() {
    let (storage, _dir) = create_temp_storage().await;
    prepare_sample(&storage).await;
    let recording = EventRecordingService::new(storage.clone());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(recording))
            .service(tracking_routes()),
    )
    .await;

    let req = TestRequest::get()
        .uri("/track-click/neverissued")
        .to_request();
    let resp = test::call_service(&app, req).await;

    // Default config has no fallback redirect configured
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
