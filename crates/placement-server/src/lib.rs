//! Server assembly: configuration, telemetry, storage lifecycle and the route table.

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use placement_actix::handlers;
use placement_actix::middleware::{
    error_fallback, json_config, not_found, path_config, query_config, Authenticate, RequireRole,
};
use placement_actix::AppSettings;
use placement_config::Config;
use placement_core::Role;
use placement_observability::{actix::MetricsMiddleware, Metrics};
use placement_openapi::ApiDoc;
use placement_ports::{DynStorage, Storage};

/// Everything a worker needs to serve requests. Cheap to clone per worker.
#[derive(Clone)]
pub struct AppContext {
    pub storage: DynStorage,
    pub metrics: Metrics,
    pub settings: AppSettings,
    pub jwt_secret: Arc<str>,
}

impl AppContext {
    pub fn new(config: &Config, storage: DynStorage, metrics: Metrics) -> Self {
        Self {
            storage,
            metrics,
            settings: AppSettings {
                avatar_max_bytes: config.avatar.max_bytes,
                default_page_size: config.listing.default_page_size,
                empty_page_is_not_found: config.listing.empty_page_is_not_found,
            },
            jwt_secret: Arc::from(config.jwt.secret.as_str()),
        }
    }

    /// Register shared state, extractor configs and every route.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.storage.clone()))
            .app_data(web::Data::new(self.metrics.clone()))
            .app_data(web::Data::new(self.settings.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .route("/health", web::get().to(handlers::health))
            .route("/ready", web::get().to(handlers::readiness))
            .route("/metrics", web::get().to(handlers::system_metrics))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            .service(
                web::scope("/user")
                    .wrap(Authenticate::new(self.jwt_secret.clone()))
                    .route("", web::patch().to(handlers::update_profile))
                    .service(
                        web::resource("/avatar")
                            .route(web::post().to(handlers::upload_avatar))
                            .route(web::get().to(handlers::get_own_avatar))
                            .route(web::delete().to(handlers::remove_avatar)),
                    )
                    .route("/{id}", web::get().to(handlers::get_user)),
            )
            .service(
                web::scope("/admin")
                    .wrap(RequireRole::any_of([Role::Admin]))
                    .wrap(Authenticate::new(self.jwt_secret.clone()))
                    .route("/avatar/{id}", web::get().to(handlers::get_user_avatar))
                    .route("/students", web::get().to(handlers::list_students))
                    .route("/counsellors", web::get().to(handlers::list_counsellors)),
            )
            .service(
                web::scope("/counsellor")
                    .wrap(RequireRole::any_of([Role::Counsellor]))
                    .wrap(Authenticate::new(self.jwt_secret.clone()))
                    .route("/students", web::get().to(handlers::list_my_students)),
            );
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {err}"))
}

/// Load configuration, wire storage and telemetry, and serve until shutdown.
pub async fn run() -> std::io::Result<()> {
    let telemetry = placement_observability::init_telemetry("placement_server")
        .map_err(|e| io_error("failed to initialize telemetry", e))?;

    let config = Config::default();
    if config.runtime.is_production() {
        config
            .validate_for_production()
            .map_err(|e| io_error("invalid production configuration", e))?;
    }
    tracing::info!(config = ?config.sanitized(), "starting placement server");

    let storage = placement_storage_factory::create_storage(
        &config.database.url,
        &config.database.blob_bucket,
    )
    .await
    .map_err(|e| io_error("failed to create storage", e))?;
    storage
        .init()
        .await
        .map_err(|e| io_error("failed to initialize storage", e))?;

    let metrics = Metrics::new().map_err(|e| io_error("failed to register metrics", e))?;

    let ctx = AppContext::new(&config, storage.clone(), metrics);
    let expose_trace = !config.runtime.is_production();
    let bind_addr = (config.server.host.clone(), config.server.port);

    tracing::info!(host = %bind_addr.0, port = bind_addr.1, "listening");

    let result = HttpServer::new(move || {
        let ctx = ctx.clone();
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(error_fallback(expose_trace))
            .wrap(MetricsMiddleware::new(ctx.metrics.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(|cfg| ctx.configure(cfg))
            .default_service(web::route().to(not_found))
    })
    .bind(bind_addr)?
    .run()
    .await;

    if let Err(e) = storage.shutdown().await {
        tracing::warn!(error = %e, "storage shutdown failed");
    }
    telemetry.shutdown();

    result
}
