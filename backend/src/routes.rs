use std::sync::Arc;
use std::time::Instant;

use actix_files::NamedFile;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::{error, info};

use crate::config::ServerConfig;
use crate::inference::ModelProvider;
use crate::models::{ApiResponse, DigitView, UploadRequest};
use crate::pipeline;

pub type SharedModels = Arc<dyn ModelProvider>;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(model_info)
        .service(initial_view)
        .service(upload);
}

#[get("/api/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success("✅ Démo de reconnaissance de chiffres"))
}

#[get("/api/model-info")]
pub async fn model_info(models: web::Data<SharedModels>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(models.info()))
}

#[get("/api/initial")]
pub async fn initial_view() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(pipeline::initial_view()))
}

/// Un upload produit toujours une vue complète: les erreurs du pipeline sont
/// rendues comme une vue d'erreur, pas comme une erreur HTTP.
#[post("/api/upload")]
pub async fn upload(
    models: web::Data<SharedModels>,
    req: web::Json<UploadRequest>,
) -> impl Responder {
    let start_time = Instant::now();
    let request = req.into_inner();
    info!(
        "Nouvel upload reçu: {}",
        request.filename.as_deref().unwrap_or("<aucun fichier>")
    );

    let models = models.get_ref().clone();
    match web::block(move || pipeline::handle_upload(request, models.as_ref())).await {
        Ok(view) => HttpResponse::Ok().json(ApiResponse::success(view).timed(start_time)),
        Err(e) => {
            error!("Erreur d'exécution bloquante: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<DigitView>::error("Erreur d'exécution").timed(start_time),
            )
        }
    }
}

pub async fn index(config: web::Data<ServerConfig>, req: HttpRequest) -> impl Responder {
    match NamedFile::open_async(config.static_dir.join("index.html")).await {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            error!("Page d'accueil introuvable: {}", e);
            HttpResponse::InternalServerError().body("Erreur chargement interface")
        }
    }
}

pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(ApiResponse::<String>::error("Endpoint non trouvé"))
}
