//! handlers/desktop_handler.rs
//! Endpoints que consume el agente de escritorio.

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::auth::DesktopAgentAuth;
use crate::errors::AppError;
use crate::models::queue_model::{QueueQuery, QueueResponse, UpdateStatusRequest};
use crate::models::recipient_model::OutcomeTransition;
use crate::services::queue_service::QueueService;

/// GET /api/desktop/queue/{tenant_id}
pub async fn queue_endpoint(
    req: HttpRequest,
    agent_auth: web::Data<DesktopAgentAuth>,
    queue_service: web::Data<QueueService>,
    path: web::Path<String>,
    query: web::Query<QueueQuery>,
) -> Result<HttpResponse, AppError> {
    agent_auth.verify(&req)?;

    let tenant_id = path.into_inner();
    let messages = queue_service.poll_queue(&tenant_id, query.limit).await?;
    Ok(HttpResponse::Ok().json(QueueResponse {
        success: true,
        count: messages.len(),
        messages,
    }))
}

/// POST /api/desktop/update-status
pub async fn update_status_endpoint(
    req: HttpRequest,
    agent_auth: web::Data<DesktopAgentAuth>,
    queue_service: web::Data<QueueService>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    agent_auth.verify(&req)?;

    let body = body.into_inner();
    let (recipient_id, status) = match (body.recipient_id, body.status) {
        (Some(id), Some(status)) => (id, status),
        _ => return Err(AppError::Validation("Missing required fields".to_string())),
    };

    let transition = queue_service
        .report_status(&recipient_id, &status, body.error_message.as_deref())
        .await?;

    let (applied, completed) = match transition {
        OutcomeTransition::Applied {
            broadcast_completed,
        } => (true, broadcast_completed),
        OutcomeTransition::AlreadyTerminal => (false, false),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "applied": applied,
        "broadcast_completed": completed
    })))
}
