pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod sample;
pub mod upload;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use log::{error, info};

use config::ServerConfig;
use inference::ArtifactModel;
use routes::SharedModels;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("🚀 Démarrage de la démo de reconnaissance de chiffres");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration invalide: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };

    let artifact = ArtifactModel::new(&config.model_path, config.cache_policy);
    info!("📦 Modèle: {} (cache: {})", artifact.path().display(), config.cache_policy);
    artifact.warm_up();
    let models: SharedModels = Arc::new(artifact);
    let model_data = web::Data::new(models);
    let config_data = web::Data::new(config.clone());

    let bind_address = config.bind_address();
    info!("🌐 Serveur démarré sur: http://{}", bind_address);
    info!("👷 Workers: {}", config.workers);
    info!("🔧 Endpoints API:");
    info!("   GET  /api/health         - Vérification santé");
    info!("   GET  /api/model-info     - Information modèle");
    info!("   GET  /api/initial        - État initial de la page");
    info!("   POST /api/upload         - Upload et prédiction");

    let upload_limit = config.upload_limit;
    let cors_origins = config.cors_origins.clone();
    let static_dir = config.static_dir.clone();

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors)
            .app_data(model_data.clone())
            .app_data(config_data.clone())
            .app_data(web::JsonConfig::default().limit(upload_limit))
            .configure(routes::configure)
            // Interface web
            .route("/", web::get().to(routes::index))
            .service(Files::new("/static", &static_dir).prefer_utf8(true))
            .default_service(web::route().to(routes::not_found))
    })
    .workers(config.workers)
    .bind(&bind_address)?
    .run()
    .await
}
