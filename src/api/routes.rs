use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::api::handlers::{
    feed::{get_allowed_ips, get_connections, get_status, get_unlocated_ips},
    filters::{
        add_region, create_ip_list, delete_region, edit_region, get_filter, get_global,
        list_filters, move_region, put_global, save_settings, upload_ip_list,
    },
};
use crate::api::websocket::ws_index;

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "Geomate Panel API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Geo-filter reconciliation panel backend with REST API and live map sync",
        "endpoints": [
            {
                "path": "/api/filters",
                "method": "GET",
                "description": "List geo-filters"
            },
            {
                "path": "/api/filters/{name}",
                "method": "GET",
                "description": "Get one geo-filter"
            },
            {
                "path": "/api/filters/{name}/regions",
                "method": "POST",
                "description": "Record a drawn region"
            },
            {
                "path": "/api/filters/{name}/regions",
                "method": "PUT",
                "description": "Replace a region's geometry"
            },
            {
                "path": "/api/filters/{name}/regions",
                "method": "DELETE",
                "description": "Remove a region"
            },
            {
                "path": "/api/filters/{name}/regions/move",
                "method": "POST",
                "description": "Reorder a region"
            },
            {
                "path": "/api/filters/{name}/settings",
                "method": "PUT",
                "description": "Merge per-filter settings"
            },
            {
                "path": "/api/filters/{name}/iplist/create",
                "method": "POST",
                "description": "Create an empty IP list file"
            },
            {
                "path": "/api/filters/{name}/iplist/upload",
                "method": "POST",
                "description": "Upload an IP list file"
            },
            {
                "path": "/api/global",
                "method": "GET",
                "description": "Get global settings"
            },
            {
                "path": "/api/global",
                "method": "PUT",
                "description": "Replace global settings"
            },
            {
                "path": "/api/connections",
                "method": "GET",
                "description": "Active connections with derived status"
            },
            {
                "path": "/api/allowed-ips",
                "method": "GET",
                "description": "Currently allowed IPs"
            },
            {
                "path": "/api/unlocated-ips",
                "method": "GET",
                "description": "IPs the map could not place yet"
            },
            {
                "path": "/api/status",
                "method": "GET",
                "description": "Service and geolocation status"
            },
            {
                "path": "/api/ws",
                "method": "GET",
                "description": "WebSocket endpoint for the map surface"
            }
        ]
    }))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint
        .route("/", web::get().to(index))
        .service(
            web::scope("/api")
                // WebSocket route for the map surface
                .route("/ws", web::get().to(ws_index))
                // Geo-filter reconciliation
                .service(
                    web::scope("/filters")
                        .route("", web::get().to(list_filters))
                        .route("/{name}", web::get().to(get_filter))
                        .route("/{name}/regions", web::post().to(add_region))
                        .route("/{name}/regions", web::put().to(edit_region))
                        .route("/{name}/regions", web::delete().to(delete_region))
                        .route("/{name}/regions/move", web::post().to(move_region))
                        .route("/{name}/settings", web::put().to(save_settings))
                        .route("/{name}/iplist/create", web::post().to(create_ip_list))
                        .route("/{name}/iplist/upload", web::post().to(upload_ip_list)),
                )
                // Global settings
                .service(
                    web::scope("/global")
                        .route("", web::get().to(get_global))
                        .route("", web::put().to(put_global)),
                )
                // Live feed
                .route("/connections", web::get().to(get_connections))
                .route("/allowed-ips", web::get().to(get_allowed_ips))
                .route("/unlocated-ips", web::get().to(get_unlocated_ips))
                .route("/status", web::get().to(get_status)),
        );
}
