use actix_files::Files;
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{ErrorResponse, SubmitResponse};
use std::path::PathBuf;

use crate::pipeline::hotspot_service::HotspotService;
use crate::pipeline::verification_service::{PipelineError, Submission, VerificationService};

const DEFAULT_FILENAME: &str = "upload";

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: Option<PathBuf>) {
    cfg.service(web::resource("/report").route(web::post().to(submit_report)))
        .service(web::resource("/get-hotspots").route(web::get().to(get_hotspots)));

    if let Some(dir) = static_dir {
        cfg.service(Files::new("/static", dir));
    }
}

fn bad_request(message: String) -> HttpResponse {
    warn!("Rejected malformed report submission: {}", message);
    HttpResponse::BadRequest().json(ErrorResponse { error: message })
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, String> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| format!("Failed to read upload: {}", e))?
    {
        if data.len() + chunk.len() > limit {
            return Err(format!("Upload exceeds limit of {} bytes", limit));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn parse_coordinate(name: &str, raw: Option<Vec<u8>>) -> Result<f64, String> {
    let raw = raw.ok_or_else(|| format!("Missing form field '{}'", name))?;
    let text = String::from_utf8(raw).map_err(|_| format!("Field '{}' is not valid UTF-8", name))?;
    text.trim()
        .parse::<f64>()
        .map_err(|_| format!("Field '{}' is not a number: {}", name, text.trim()))
}

/// Pulls `lat`, `lon` and `file` out of the multipart body; unknown fields are skipped.
async fn read_submission(mut payload: Multipart, max_upload_bytes: usize) -> Result<Submission, String> {
    let mut lat = None;
    let mut lon = None;
    let mut image = None;
    let mut filename = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| format!("Malformed multipart body: {}", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "lat" => lat = Some(read_field(&mut field, 64).await?),
            "lon" => lon = Some(read_field(&mut field, 64).await?),
            "file" => {
                filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_owned);
                image = Some(read_field(&mut field, max_upload_bytes).await?);
            }
            other => {
                warn!("Ignoring unexpected form field '{}'", other);
                read_field(&mut field, max_upload_bytes).await?;
            }
        }
    }

    Ok(Submission {
        latitude: parse_coordinate("lat", lat)?,
        longitude: parse_coordinate("lon", lon)?,
        image: image.ok_or_else(|| "Missing form field 'file'".to_string())?,
        filename: filename
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
    })
}

async fn submit_report(service: web::Data<VerificationService>, payload: Multipart) -> HttpResponse {
    let submission = match read_submission(payload, service.max_upload_bytes()).await {
        Ok(submission) => submission,
        Err(message) => return bad_request(message),
    };

    match service.submit(submission).await {
        Ok(outcome) => HttpResponse::Ok().json(SubmitResponse::from(outcome)),
        Err(PipelineError::InvalidInput(message)) => bad_request(message),
        Err(e) => {
            error!("Report submission failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

async fn get_hotspots(service: web::Data<HotspotService>) -> HttpResponse {
    match service.list_hotspots().await {
        Ok(hotspots) => {
            info!("Serving {} hotspots", hotspots.len());
            HttpResponse::Ok().json(hotspots)
        }
        Err(e) => {
            error!("Error listing hotspots: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: format!("Error listing hotspots: {}", e),
            })
        }
    }
}
