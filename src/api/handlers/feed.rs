use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;

use crate::feed::manager::FeedManager;
use crate::models::connection::ConnectionRow;
use crate::models::status::{GeolocationStatus, ServiceStatus};

/// Response for the connections table
#[derive(Serialize)]
struct ConnectionsResponse {
    connections: Vec<ConnectionRow>,
    total: usize,
}

/// Response for the combined service status
#[derive(Serialize)]
struct StatusResponse {
    service: &'static str,
    running: bool,
    geolocation: Option<GeolocationStatus>,
}

/// Get the active connections with their derived display status
pub async fn get_connections(feed: web::Data<Arc<FeedManager>>) -> impl Responder {
    let rows: Vec<ConnectionRow> = feed
        .connections()
        .iter()
        .map(ConnectionRow::from_connection)
        .collect();
    let total = rows.len();
    HttpResponse::Ok().json(ConnectionsResponse {
        connections: rows,
        total,
    })
}

/// Get the currently allowed IPs
pub async fn get_allowed_ips(feed: web::Data<Arc<FeedManager>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "allowed_ips": feed.allowed_ips()
    }))
}

/// Get the IPs the map surface could not place yet
pub async fn get_unlocated_ips(feed: web::Data<Arc<FeedManager>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "unlocated_ips": feed.unlocated_ips()
    }))
}

/// Get the service and geolocation status
pub async fn get_status(feed: web::Data<Arc<FeedManager>>) -> impl Responder {
    let service = feed.service();
    HttpResponse::Ok().json(StatusResponse {
        service: service.label(),
        running: service == ServiceStatus::Running,
        geolocation: feed.geolocation(),
    })
}
