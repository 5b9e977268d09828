use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecipientRecord {
    pub id: String,
    pub broadcast_id: String,
    pub phone: String,
    pub name: Option<String>,
    pub status: RecipientStatus, // "pending", "sent", "failed"
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Resultado terminal de un envío a un destinatario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

impl DeliveryOutcome {
    /// Solo "sent" y "failed" son estados que un reporte puede pedir.
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "sent" => Some(DeliveryOutcome::Sent),
            "failed" => Some(DeliveryOutcome::Failed),
            _ => None,
        }
    }

    pub fn status(self) -> RecipientStatus {
        match self {
            DeliveryOutcome::Sent => RecipientStatus::Sent,
            DeliveryOutcome::Failed => RecipientStatus::Failed,
        }
    }

    /// Columna del broadcast que se incrementa con este resultado
    pub fn counter_column(self) -> &'static str {
        match self {
            DeliveryOutcome::Sent => "sent_count",
            DeliveryOutcome::Failed => "failed_count",
        }
    }
}

/// Qué pasó al registrar un resultado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeTransition {
    /// El destinatario pasó de pending a terminal y se contó
    Applied { broadcast_completed: bool },
    /// Ya estaba en estado terminal; no se tocó nada
    AlreadyTerminal,
}
