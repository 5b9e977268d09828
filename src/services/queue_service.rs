//! services/queue_service.rs
//! Cola pull para el agente de escritorio (plan basic).
//!
//! Leer la cola no cambia nada: el agente puede volver a ver el mismo mensaje
//! hasta que reporte su estado. Los reportes pueden llegar repetidos o en
//! cualquier orden; la idempotencia la garantiza `record_outcome`.

use sqlx::{Pool, Sqlite};

use crate::errors::{AppError, AppResult};
use crate::models::queue_model::QueueMessage;
use crate::models::recipient_model::{DeliveryOutcome, OutcomeTransition};
use crate::services::broadcast_service::BroadcastService;
use crate::services::tenant_service::TenantService;

#[derive(Clone)]
pub struct QueueService {
    db_pool: Pool<Sqlite>,
    broadcast_service: BroadcastService,
    tenant_service: TenantService,
    batch_size: u32,
}

impl QueueService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        broadcast_service: BroadcastService,
        tenant_service: TenantService,
        batch_size: u32,
    ) -> Self {
        Self {
            db_pool,
            broadcast_service,
            tenant_service,
            batch_size,
        }
    }

    /// Hasta `batch_size` mensajes pendientes de los broadcasts "desktop" en
    /// curso del tenant. Un `limit` de 0 o mayor al lote se ajusta al lote.
    pub async fn poll_queue(
        &self,
        tenant_id: &str,
        limit: Option<u32>,
    ) -> AppResult<Vec<QueueMessage>> {
        // Valida que el tenant exista
        self.tenant_service.get_tenant(tenant_id).await?;

        let limit = match limit {
            Some(l) if l > 0 && l <= self.batch_size => l,
            _ => self.batch_size,
        };

        let messages = sqlx::query_as::<_, QueueMessage>(
            r#"
            SELECT r.id, r.broadcast_id, r.phone, r.name, b.message, b.media_url
            FROM broadcast_recipients r
            JOIN broadcasts b ON b.id = r.broadcast_id
            WHERE b.tenant_id = ?1
              AND b.delivery_method = 'desktop'
              AND b.status = 'in_progress'
              AND r.status = 'pending'
            ORDER BY b.started_at, b.rowid, r.rowid
            LIMIT ?2
            "#,
        )
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.db_pool)
        .await?;

        log::info!(
            "(poll_queue) Tenant {}: {} mensajes pendientes entregados",
            tenant_id,
            messages.len()
        );
        Ok(messages)
    }

    /// Reporte del agente. `status` tiene que ser "sent" o "failed".
    pub async fn report_status(
        &self,
        recipient_id: &str,
        status: &str,
        error_detail: Option<&str>,
    ) -> AppResult<OutcomeTransition> {
        let outcome = DeliveryOutcome::parse(status).ok_or_else(|| {
            AppError::Validation(format!(
                "Invalid status '{}': expected 'sent' or 'failed'",
                status
            ))
        })?;

        self.broadcast_service
            .record_outcome(recipient_id, outcome, error_detail)
            .await
    }
}
