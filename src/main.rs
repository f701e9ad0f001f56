use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::info;

use mailbeacon::api::services::{health_routes, tracking_routes};
use mailbeacon::config::{get_config, init_config};
use mailbeacon::services::EventRecordingService;
use mailbeacon::storage::{SeaOrmStorage, infer_backend_from_url, normalize_backend_name};
use mailbeacon::system::logging::init_logging;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    init_config();
    let config = get_config();
    let _log_guard = init_logging(config);

    let backend = infer_backend_from_url(&config.database.database_url)
        .map(|b| normalize_backend_name(&b))
        .expect("Unsupported database URL");

    let storage = Arc::new(
        SeaOrmStorage::new(&config.database.database_url, &backend)
            .await
            .expect("Failed to create storage"),
    );

    let recording = EventRecordingService::new(storage.clone());

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting tracking server at http://{}", bind_address);
    info!(
        "Tracking endpoints served under {}",
        config.tracking.public_base_url
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(recording.clone()))
            .service(health_routes())
            .service(tracking_routes())
    })
    .bind(bind_address)?
    .run()
    .await
}
