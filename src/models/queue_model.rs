//! models/queue_model.rs
//! Contrato con el agente de escritorio: cola de mensajes y reporte de estado.

use serde::{Deserialize, Serialize};

/// Un mensaje pendiente listo para que el agente lo envíe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    /// id del destinatario (se usa después en update-status)
    pub id: String,
    pub broadcast_id: String,
    pub phone: String,
    pub name: Option<String>,
    pub message: String,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub success: bool,
    pub count: usize,
    pub messages: Vec<QueueMessage>,
}

/// El agente puede mandar cualquier cosa en `status`; se valida en el servicio.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub recipient_id: Option<String>,
    pub status: Option<String>,
    pub error_message: Option<String>,
}
