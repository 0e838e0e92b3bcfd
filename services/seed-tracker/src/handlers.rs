use crate::errors::{Result, SeedTrackerError};
use crate::metrics;
use crate::models::{BatchOutgoingRequest, BatchUpdate, ListQuery, NewBatch, OutgoingRequest};
use crate::photos::UploadedFile;
use crate::recommendation;
use crate::reporting;
use crate::security_middleware::{Claims, JwtAuth, Role};
use crate::services::InventoryService;
use actix_multipart::Multipart;
use actix_web::http::header::ContentDisposition;
use actix_web::{web, HttpResponse};
use futures_util::TryStreamExt;
use serde_json::json;
use std::sync::Arc;

const STAFF: &[Role] = &[Role::Staff];
const AUDITOR: &[Role] = &[Role::Auditor];
const STAFF_OR_AUDITOR: &[Role] = &[Role::Staff, Role::Auditor];

/// Multipart field carrying photo files
const IMAGES_FIELD: &str = "images";

type ServiceData = web::Data<Arc<InventoryService>>;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "seed-tracker",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Batch listing with `q`, `recommended=yes|no` and `sort=recommended`
pub async fn list_batches(
    service: ServiceData,
    _caller: Claims,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let response = service
        .registry
        .list_batches(&query, recommendation::today())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn create_batch(
    service: ServiceData,
    caller: Claims,
    request: web::Json<NewBatch>,
) -> Result<HttpResponse> {
    caller.require(STAFF)?;
    let batch = service.registry.create_batch(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(service.registry.view(batch, recommendation::today())))
}

pub async fn get_batch(
    service: ServiceData,
    caller: Claims,
    batch_id: web::Path<i64>,
) -> Result<HttpResponse> {
    caller.require(STAFF_OR_AUDITOR)?;
    let detail = service
        .registry
        .batch_detail(*batch_id, recommendation::today(), caller.is_staff())
        .await?;
    Ok(HttpResponse::Ok().json(detail))
}

pub async fn update_batch(
    service: ServiceData,
    caller: Claims,
    batch_id: web::Path<i64>,
    request: web::Json<BatchUpdate>,
) -> Result<HttpResponse> {
    caller.require(STAFF)?;
    let batch = service
        .registry
        .update_batch(*batch_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(service.registry.view(batch, recommendation::today())))
}

pub async fn delete_batch(
    service: ServiceData,
    caller: Claims,
    batch_id: web::Path<i64>,
) -> Result<HttpResponse> {
    caller.require(STAFF)?;
    let batch = service.registry.delete_batch(*batch_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "deleted": batch.id,
        "batch_number": batch.batch_number
    })))
}

/// Outgoing transaction with the batch id in the body
pub async fn create_outgoing(
    service: ServiceData,
    caller: Claims,
    request: web::Json<OutgoingRequest>,
) -> Result<HttpResponse> {
    caller.require(STAFF)?;
    let response = service
        .ledger
        .apply_outgoing(request.into_inner(), recommendation::today())
        .await?;
    Ok(HttpResponse::Created().json(response))
}

/// Outgoing transaction for the batch in the path
pub async fn create_outgoing_for_batch(
    service: ServiceData,
    caller: Claims,
    batch_id: web::Path<i64>,
    request: web::Json<BatchOutgoingRequest>,
) -> Result<HttpResponse> {
    caller.require(STAFF)?;
    let response = service
        .ledger
        .apply_outgoing(request.into_inner().for_batch(*batch_id), recommendation::today())
        .await?;
    Ok(HttpResponse::Created().json(response))
}

/// Multipart upload of one or more images in the `images` field
pub async fn upload_photos(
    service: ServiceData,
    caller: Claims,
    batch_id: web::Path<i64>,
    payload: Multipart,
) -> Result<HttpResponse> {
    caller.require(STAFF)?;
    let files = read_images(payload, service.photos.max_upload_bytes()).await?;
    let response = service.photos.upload(*batch_id, files).await?;
    Ok(HttpResponse::Created().json(response))
}

async fn read_images(mut payload: Multipart, max_bytes: usize) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::new();

    while let Some(mut field) = payload.try_next().await.map_err(upload_error)? {
        if field.name() != IMAGES_FIELD {
            while field.try_next().await.map_err(upload_error)?.is_some() {}
            continue;
        }

        let file_name = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(upload_error)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(SeedTrackerError::Upload(format!(
                    "{}: File too large (max {} bytes).",
                    file_name, max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        files.push(UploadedFile { file_name, bytes });
    }

    Ok(files)
}

fn upload_error(err: actix_multipart::MultipartError) -> SeedTrackerError {
    SeedTrackerError::Upload(err.to_string())
}

/// Printable seed tag
pub async fn print_seed_tag(
    service: ServiceData,
    caller: Claims,
    batch_id: web::Path<i64>,
) -> Result<HttpResponse> {
    caller.require(STAFF_OR_AUDITOR)?;
    let batch = service.registry.get_batch(*batch_id).await?;
    let filename = reporting::seed_tag_filename(&batch.batch_number);
    let view = service.registry.view(batch, recommendation::today());
    let pdf = reporting::seed_tag_pdf(&view)?;

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition::attachment(filename))
        .body(pdf))
}

/// Auditor export of all batches
pub async fn export_batches_csv(service: ServiceData, caller: Claims) -> Result<HttpResponse> {
    caller.require(AUDITOR)?;
    let listing = service
        .registry
        .list_batches(&ListQuery::default(), recommendation::today())
        .await?;
    let csv = reporting::batches_csv(&listing.batches)?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header(ContentDisposition::attachment(reporting::BATCHES_CSV_FILENAME))
        .body(csv))
}

/// Auditor export of the outgoing ledger
pub async fn export_outgoing_csv(service: ServiceData, caller: Claims) -> Result<HttpResponse> {
    caller.require(AUDITOR)?;
    let transactions = service.ledger.list_transactions().await?;
    let csv = reporting::outgoing_csv(&transactions)?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header(ContentDisposition::attachment(reporting::OUTGOING_CSV_FILENAME))
        .body(csv))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError()
            .json(json!({
                "error": "Failed to gather metrics",
                "details": e.to_string()
            }))
    }
}

/// Configure routes. Everything under `/api/v1` requires a bearer token.
pub fn configure_routes(cfg: &mut web::ServiceConfig, jwt_secret: &str) {
    cfg.service(
        web::scope("/api/v1")
            .wrap(JwtAuth::new(jwt_secret.to_string()))
            .route("/batches", web::get().to(list_batches))
            .route("/batches", web::post().to(create_batch))
            .route("/batches/{batch_id}", web::get().to(get_batch))
            .route("/batches/{batch_id}", web::put().to(update_batch))
            .route("/batches/{batch_id}", web::delete().to(delete_batch))
            .route("/batches/{batch_id}/photos", web::post().to(upload_photos))
            .route("/batches/{batch_id}/outgoing", web::post().to(create_outgoing_for_batch))
            .route("/batches/{batch_id}/print-tag.pdf", web::get().to(print_seed_tag))
            .route("/outgoing", web::post().to(create_outgoing))
            .route("/auditor/export/batches.csv", web::get().to(export_batches_csv))
            .route("/auditor/export/outgoing.csv", web::get().to(export_outgoing_csv)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
