//! handlers/broadcast_handler.rs
//! Endpoints de broadcasts para el tenant autenticado.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::auth::AuthenticatedTenant;
use crate::errors::AppError;
use crate::models::broadcast_model::{
    BroadcastDetailResponse, BroadcastResponse, CreateBroadcastRequest, ListBroadcastsResponse,
};
use crate::services::broadcast_service::BroadcastService;

/// POST /api/broadcasts/create
pub async fn create_broadcast_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    body: web::Json<CreateBroadcastRequest>,
) -> Result<HttpResponse, AppError> {
    let broadcast = broadcast_service.create(&tenant, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(BroadcastResponse {
        success: true,
        broadcast,
    }))
}

/// GET /api/broadcasts/list
pub async fn list_broadcasts_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<HttpResponse, AppError> {
    let broadcasts = broadcast_service.list_broadcasts(&tenant.id).await?;
    Ok(HttpResponse::Ok().json(ListBroadcastsResponse {
        success: true,
        broadcasts,
    }))
}

/// GET /api/broadcasts/{id}
pub async fn get_broadcast_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let broadcast_id = path.into_inner();
    let broadcast = broadcast_service
        .get_broadcast(&tenant.id, &broadcast_id)
        .await?;
    Ok(HttpResponse::Ok().json(BroadcastDetailResponse {
        success: true,
        broadcast,
    }))
}

/// POST /api/broadcasts/{id}/start
/// Responde enseguida; el envío WAHA sigue en segundo plano.
pub async fn start_broadcast_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let broadcast_id = path.into_inner();
    let broadcast = broadcast_service.start(&tenant.id, &broadcast_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Broadcast started",
        "broadcast_id": broadcast.id,
        "delivery_method": broadcast.delivery_method
    })))
}
