use actix_web::HttpResponse;
use chrono::Utc;
use serde_json::json;

/// GET /health
pub async fn health_endpoint() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "WhatsApp Broadcast Service"
    }))
}
