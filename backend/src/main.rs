mod classifier;
mod config;
mod db;
mod pipeline;
mod routes;
mod storage;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use classifier::ClassifierGateway;
use config::{AppConfig, StorageBackend};
use db::report_repository::SqliteReportRepository;
use pipeline::hotspot_service::HotspotService;
use pipeline::verification_service::VerificationService;
use routes::configure_routes;
use std::sync::Arc;
use storage::local_store::LocalImageStore;
use storage::s3_service::S3ImageStore;
use storage::ImageStore;

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, e);
    std::io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;
    let public_base = config
        .server
        .public_base()
        .map_err(|e| startup_error("Invalid public base URL", e))?;

    let classifier = ClassifierGateway::from_config(&config.classifier)
        .map_err(|e| startup_error("Classifier setup failed", e))?;
    log::info!("Analyzing images with demo mode: {}", classifier.is_demo());

    let (images, static_dir) = match config.storage.backend {
        StorageBackend::Local => {
            let store = LocalImageStore::new(&config.storage.upload_dir)
                .map_err(|e| startup_error("Cannot create upload directory", e))?;
            log::info!("Storing uploads in {}", config.storage.upload_dir.display());
            (
                Arc::new(store) as Arc<dyn ImageStore>,
                Some(config.storage.upload_dir.clone()),
            )
        }
        StorageBackend::S3 => {
            let bucket = config
                .storage
                .s3_bucket
                .clone()
                .ok_or_else(|| startup_error("Storage setup failed", "no S3 bucket configured"))?;
            let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
            log::info!("Storing uploads in S3 bucket {}", bucket);
            (
                Arc::new(S3ImageStore::new(S3Client::new(&aws_config), bucket)) as Arc<dyn ImageStore>,
                None,
            )
        }
    };

    let reports = Arc::new(
        SqliteReportRepository::connect(&config.database.path)
            .await
            .map_err(|e| startup_error("Database setup failed", e))?,
    );

    let verification_service = VerificationService::new(
        images,
        Arc::new(classifier),
        reports.clone(),
        config.storage.max_upload_bytes,
    );
    let hotspot_service = HotspotService::new(reports, public_base);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(verification_service.clone()))
            .app_data(web::Data::new(hotspot_service.clone()))
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
