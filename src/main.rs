use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod config;
mod db;
mod device;
mod docs;
mod model;
mod routes;
mod store;
mod sync;
mod utils;

use config::Config;
use db::init_db;

use crate::device::client::TerminalConnector;
use crate::device::tcp::TcpTerminalConnector;
use crate::docs::ApiDoc;
use crate::utils::attendance_cache::{self, AttendanceCache};
use std::sync::Arc;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "attendsync is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let cache = AttendanceCache::new();
    let connector: Arc<dyn TerminalConnector> = Arc::new(TcpTerminalConnector::new(
        config.device_host.clone(),
        config.device_port,
    ));
    info!(endpoint = %connector.endpoint(), "terminal connector configured");

    // Clone values for the warmup task and server closure
    let pool_for_cache_warmup = pool.clone();
    let cache_for_warmup = cache.clone();
    let warmup_policy = config.dedup_policy;
    let warmup_days = config.sync_window_days as u32;
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();
    let connector_data: Data<dyn TerminalConnector> = Data::from(connector);

    actix_web::rt::spawn(async move {
        // Warm up the sync window's worth of recent days
        if let Err(e) = attendance_cache::warmup_attendance_cache(
            &pool_for_cache_warmup,
            &cache_for_warmup,
            warmup_policy,
            warmup_days,
        )
        .await
        {
            eprintln!("Failed to warmup attendance cache: {:?}", e);
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(cache.clone()))
            .app_data(connector_data.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
