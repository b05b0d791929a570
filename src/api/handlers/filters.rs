use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;

use crate::engine::reconciler::{EditRequest, Reconciler};
use crate::engine::region::RegionToken;
use crate::iplist;
use crate::models::config::AppConfig;
use crate::models::filter::FilterSettings;
use crate::config::global::GlobalSettings;
use crate::utils::error::AppError;

/// Request body for recording a region
#[derive(Deserialize)]
pub struct AddRegionRequest {
    pub region: RegionToken,

    /// Whether the map surface drew this shape fresh
    #[serde(default = "default_is_new")]
    pub is_new: bool,
}

fn default_is_new() -> bool {
    true
}

/// Request body for editing a region
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRegionRequest {
    #[serde(default)]
    pub old_region: Option<RegionToken>,

    pub region: RegionToken,
}

/// Request body for deleting a region
#[derive(Deserialize)]
pub struct DeleteRegionRequest {
    pub region: RegionToken,
}

/// Request body for reordering a region
#[derive(Deserialize)]
pub struct MoveRegionRequest {
    pub region: RegionToken,

    /// Target display index, clamped to the list bounds
    pub index: usize,
}

/// Request body for uploading an IP list
#[derive(Deserialize)]
pub struct UploadListRequest {
    #[serde(default)]
    pub content: String,
}

fn engine_error(e: AppError) -> HttpResponse {
    error!("Reconciliation failed: {}", e);
    HttpResponse::InternalServerError().json(serde_json::json!({
        "status": "error",
        "message": format!("{}", e)
    }))
}

fn ok_status() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "success" }))
}

/// List geo-filters, refreshed from the store
pub async fn list_filters(reconciler: web::Data<Arc<Reconciler>>) -> impl Responder {
    match reconciler.load_all().await {
        Ok(_) => HttpResponse::Ok().json(reconciler.filters()),
        Err(e) => engine_error(e),
    }
}

/// Get a single geo-filter
pub async fn get_filter(
    reconciler: web::Data<Arc<Reconciler>>,
    path: web::Path<String>,
) -> impl Responder {
    let name = path.into_inner();
    if let Err(e) = reconciler.load_all().await {
        return engine_error(e);
    }
    match reconciler.filter(&name) {
        Some(filter) => HttpResponse::Ok().json(filter),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": format!("Geo-filter '{}' not found", name)
        })),
    }
}

/// Record a drawn region for a filter, creating the filter on first use
pub async fn add_region(
    reconciler: web::Data<Arc<Reconciler>>,
    path: web::Path<String>,
    req: web::Json<AddRegionRequest>,
) -> impl Responder {
    let name = path.into_inner();
    let req = req.into_inner();
    info!("Recording region for geo-filter '{}'", name);
    match reconciler.add_region(&name, req.region, req.is_new).await {
        Ok(()) => ok_status(),
        Err(e) => engine_error(e),
    }
}

/// Replace a region's geometry
pub async fn edit_region(
    reconciler: web::Data<Arc<Reconciler>>,
    path: web::Path<String>,
    req: web::Json<EditRegionRequest>,
) -> impl Responder {
    let name = path.into_inner();
    let req = req.into_inner();
    let request = match req.old_region {
        Some(old) => EditRequest::ByExactToken {
            old,
            new: req.region,
        },
        None => EditRequest::ByPrefix { new: req.region },
    };
    match reconciler.edit_region(&name, request).await {
        Ok(()) => ok_status(),
        Err(e) => engine_error(e),
    }
}

/// Remove a region; removing the last one disables the filter
pub async fn delete_region(
    reconciler: web::Data<Arc<Reconciler>>,
    path: web::Path<String>,
    req: web::Json<DeleteRegionRequest>,
) -> impl Responder {
    let name = path.into_inner();
    match reconciler.delete_region(&name, &req.region).await {
        Ok(()) => ok_status(),
        Err(e) => engine_error(e),
    }
}

/// Relocate a region in the display order
pub async fn move_region(
    reconciler: web::Data<Arc<Reconciler>>,
    path: web::Path<String>,
    req: web::Json<MoveRegionRequest>,
) -> impl Responder {
    let name = path.into_inner();
    match reconciler.move_region(&name, &req.region, req.index).await {
        Ok(()) => ok_status(),
        Err(e) => engine_error(e),
    }
}

/// Merge per-filter settings; omitted fields stay unchanged
pub async fn save_settings(
    reconciler: web::Data<Arc<Reconciler>>,
    path: web::Path<String>,
    req: web::Json<FilterSettings>,
) -> impl Responder {
    let name = path.into_inner();
    match reconciler.save_settings(&name, &req).await {
        Ok(()) => ok_status(),
        Err(e) => engine_error(e),
    }
}

/// Read the global settings section
pub async fn get_global(reconciler: web::Data<Arc<Reconciler>>) -> impl Responder {
    match reconciler.global_settings().await {
        Ok(settings) => HttpResponse::Ok().json(settings),
        Err(e) => engine_error(e),
    }
}

/// Replace the global settings section
pub async fn put_global(
    reconciler: web::Data<Arc<Reconciler>>,
    req: web::Json<GlobalSettings>,
) -> impl Responder {
    match reconciler.save_global_settings(&req).await {
        Ok(()) => ok_status(),
        Err(e) => engine_error(e),
    }
}

/// Create an empty IP list file for a filter
pub async fn create_ip_list(
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> impl Responder {
    write_ip_list(&config, &path.into_inner(), "")
}

/// Upload an IP list file for a filter
pub async fn upload_ip_list(
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    req: web::Json<UploadListRequest>,
) -> impl Responder {
    write_ip_list(&config, &path.into_inner(), &req.content)
}

fn write_ip_list(config: &AppConfig, name: &str, content: &str) -> HttpResponse {
    match iplist::write_list(&config.data_dir, name, content) {
        Ok(path) => {
            info!("Wrote IP list for '{}' to {}", name, path.display());
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "path": path
            }))
        }
        Err(e @ AppError::InvalidInput(_)) => HttpResponse::BadRequest().json(serde_json::json!({
            "status": "error",
            "message": format!("{}", e)
        })),
        Err(e) => engine_error(e),
    }
}
