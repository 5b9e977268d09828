//! handlers/whatsapp_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::auth::AuthenticatedTenant;
use crate::errors::AppError;
use crate::models::session_model::SessionStartResponse;
use crate::services::session_service::SessionService;

/// POST /api/whatsapp/start-session
pub async fn start_session_endpoint(
    session_service: web::Data<SessionService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<HttpResponse, AppError> {
    let session = session_service.start_session(&tenant).await?;
    Ok(HttpResponse::Ok().json(SessionStartResponse {
        success: true,
        session,
        status: "connecting".to_string(),
    }))
}

/// GET /api/whatsapp/qr
pub async fn qr_endpoint(
    session_service: web::Data<SessionService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<HttpResponse, AppError> {
    let qr = session_service.get_qr(&tenant).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "qr": qr })))
}

/// GET /api/whatsapp/status
pub async fn status_endpoint(
    session_service: web::Data<SessionService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<HttpResponse, AppError> {
    let status = session_service.session_status(&tenant).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// POST /api/whatsapp/stop-session
pub async fn stop_session_endpoint(
    session_service: web::Data<SessionService>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<HttpResponse, AppError> {
    session_service.stop_session(&tenant).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Session stopped"
    })))
}
