use crate::{
    api::{attendance, sync},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter config
    fn build_limiter(requests_per_min: u32) -> GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap()
    }

    // Sync and device routes hit the terminal, so they get the tight limit.
    let sync_conf = build_limiter(config.rate_sync_per_min);
    let query_conf = build_limiter(config.rate_query_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/attendance")
                    // /attendance?date=YYYY-MM-DD&policy=...
                    .service(
                        web::resource("")
                            .wrap(Governor::new(&query_conf))
                            .route(web::get().to(attendance::list_attendance)),
                    ),
            )
            .service(
                web::scope("/sync")
                    // /sync/run
                    .service(
                        web::resource("/run")
                            .wrap(Governor::new(&sync_conf))
                            .route(web::post().to(sync::run_sync)),
                    )
                    // /sync/status
                    .service(
                        web::resource("/status")
                            .wrap(Governor::new(&query_conf))
                            .route(web::get().to(sync::sync_status)),
                    )
                    // /sync/history
                    .service(
                        web::resource("/history")
                            .wrap(Governor::new(&query_conf))
                            .route(web::get().to(sync::sync_history)),
                    ),
            )
            .service(
                web::scope("/device")
                    // /device/users
                    .service(
                        web::resource("/users")
                            .wrap(Governor::new(&sync_conf))
                            .route(web::get().to(sync::device_users)),
                    )
                    // /device/time
                    .service(
                        web::resource("/time")
                            .wrap(Governor::new(&sync_conf))
                            .route(web::get().to(sync::device_time)),
                    ),
            ),
    );
}

// SYNC PASS
//  ├─ POST /sync/run      (blocks until Done, 409 while another runs)
//  └─ GET  /sync/status   (poll from the dashboard, e.g. every 60s)

// READ PATH
//  └─ GET /attendance?date=...
//       └─ cache hit → served as-is; miss → DB + late resolution
