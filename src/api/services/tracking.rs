//! Public tracking endpoints
//!
//! The two unauthenticated HTTP surfaces consumed by rendered mail clients:
//! the open pixel and the click redirect. Both must degrade gracefully:
//! the pixel always returns a valid image and the redirect always sends the
//! browser somewhere, whatever the recording outcome was.

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use tracing::{debug, error};

use crate::config::get_config;
use crate::services::EventRecordingService;
use crate::utils::ip::extract_client_ip;

/// 1x1 fully transparent PNG, served for every pixel hit
const TRANSPARENT_PIXEL: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x60,
    0x00, 0x02, 0x00, 0x00, 0x05, 0x00, 0x01, 0xe9, 0xfa, 0xdc, 0xd8, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

pub struct TrackingService {}

impl TrackingService {
    /// GET /track-open/{token}.png
    ///
    /// Never errors towards the mail client: the pixel comes back whether or
    /// not the token resolved, and whether or not the hit was deduplicated.
    pub async fn handle_open_pixel(
        req: HttpRequest,
        path: web::Path<String>,
        recording: web::Data<EventRecordingService>,
    ) -> impl Responder {
        let token = path.into_inner();
        let user_agent = Self::user_agent(&req);
        let ip = extract_client_ip(&req);

        match recording
            .record_open(&token, user_agent.as_deref(), ip.as_deref())
            .await
        {
            Ok(Some(recipient)) => {
                debug!("Open hit for recipient {}", recipient.id);
            }
            Ok(None) => {
                debug!("Open hit with unknown token");
            }
            Err(e) => {
                error!("Failed to record open: {}", e);
            }
        }

        Self::pixel_response()
    }

    /// GET /track-click/{token}
    ///
    /// Redirects to the resolved destination when the token is known, even
    /// when the click itself was suppressed as a duplicate. Unknown tokens
    /// go to the configured fallback destination, or 404 without one.
    pub async fn handle_click_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        recording: web::Data<EventRecordingService>,
    ) -> impl Responder {
        let token = path.into_inner();
        let user_agent = Self::user_agent(&req);
        let ip = extract_client_ip(&req);

        match recording
            .record_click(&token, user_agent.as_deref(), ip.as_deref())
            .await
        {
            Ok(Some(resolution)) => {
                debug!(
                    "Click hit for link_recipient {} -> {}",
                    resolution.link_recipient.id, resolution.url
                );
                HttpResponse::build(StatusCode::TEMPORARY_REDIRECT)
                    .insert_header(("Location", resolution.url))
                    .finish()
            }
            Ok(None) => {
                debug!("Click hit with unknown token");
                Self::fallback_response()
            }
            Err(e) => {
                error!("Failed to record click: {}", e);
                Self::fallback_response()
            }
        }
    }

    fn user_agent(req: &HttpRequest) -> Option<String> {
        req.headers()
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .map(String::from)
    }

    #[inline]
    fn pixel_response() -> HttpResponse {
        HttpResponse::Ok()
            .content_type("image/png")
            .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
            .insert_header(("Pragma", "no-cache"))
            .insert_header(("Expires", "0"))
            .body(TRANSPARENT_PIXEL)
    }

    #[inline]
    fn fallback_response() -> HttpResponse {
        let fallback = &get_config().tracking.fallback_redirect_url;
        if fallback.is_empty() {
            HttpResponse::build(StatusCode::NOT_FOUND)
                .insert_header(("Content-Type", "text/html; charset=utf-8"))
                .insert_header(("Cache-Control", "public, max-age=60"))
                .body("Not Found")
        } else {
            HttpResponse::build(StatusCode::TEMPORARY_REDIRECT)
                .insert_header(("Location", fallback.as_str()))
                .finish()
        }
    }
}

/// Tracking route configuration
pub fn tracking_routes() -> actix_web::Scope {
    web::scope("")
        .route(
            "/track-open/{token}.png",
            web::get().to(TrackingService::handle_open_pixel),
        )
        .route(
            "/track-click/{token}",
            web::get().to(TrackingService::handle_click_redirect),
        )
}
