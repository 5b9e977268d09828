//! models/broadcast_model.rs
//! Estructuras del broadcast: registro en DB, requests y responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::recipient_model::RecipientRecord;

/// Método de entrega congelado al crear el broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Sesión cloud de WhatsApp (push)
    Waha,
    /// Agente de escritorio que consulta la cola (pull)
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum BroadcastStatus {
    Created,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BroadcastRecord {
    pub id: String,
    pub tenant_id: String,
    pub title: Option<String>,
    pub message: String,
    pub media_url: Option<String>,
    pub delivery_method: DeliveryMethod,
    pub status: BroadcastStatus,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Destinatario tal como llega en el request de creación
#[derive(Debug, Clone, Deserialize)]
pub struct RecipientInput {
    pub phone: String,
    pub name: Option<String>,
}

/// Request para crear un broadcast
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBroadcastRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    pub media_url: Option<String>,
    #[serde(default)]
    pub recipients: Vec<RecipientInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastResponse {
    pub success: bool,
    pub broadcast: BroadcastRecord,
}

/// Broadcast con sus destinatarios (GET /api/broadcasts/{id})
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastDetail {
    #[serde(flatten)]
    pub broadcast: BroadcastRecord,
    pub recipients: Vec<RecipientRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastDetailResponse {
    pub success: bool,
    pub broadcast: BroadcastDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListBroadcastsResponse {
    pub success: bool,
    pub broadcasts: Vec<BroadcastRecord>,
}

impl BroadcastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastStatus::Created => "created",
            BroadcastStatus::InProgress => "in_progress",
            BroadcastStatus::Completed => "completed",
        }
    }
}
