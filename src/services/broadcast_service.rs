//! services/broadcast_service.rs
//! Ciclo de vida del broadcast: created -> in_progress -> completed.
//!
//! Todo resultado de envío (push o pull) entra por `record_outcome`, que marca
//! al destinatario, incrementa el contador en DB y evalúa si el broadcast
//! terminó, todo dentro de una sola transacción.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::broadcast_model::{
    BroadcastDetail, BroadcastRecord, BroadcastStatus, CreateBroadcastRequest, DeliveryMethod,
};
use crate::models::recipient_model::{
    DeliveryOutcome, OutcomeTransition, RecipientRecord, RecipientStatus,
};
use crate::models::tenant_model::TenantRecord;
use crate::services::delivery_strategy::{select_strategy, DeliveryStrategy};
use crate::services::push_sender::PushDispatcher;

const BROADCAST_COLUMNS: &str = r#"
    id, tenant_id, title, message, media_url, delivery_method, status,
    total_recipients, sent_count, failed_count, created_at, started_at, completed_at
"#;

const RECIPIENT_COLUMNS: &str = r#"
    id, broadcast_id, phone, name, status, error_message, sent_at, created_at
"#;

const STORE_RETRY_ATTEMPTS: u32 = 3;
const STORE_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct BroadcastService {
    db_pool: Pool<Sqlite>,
    dispatcher: PushDispatcher,
}

impl BroadcastService {
    pub fn new(db_pool: Pool<Sqlite>, dispatcher: PushDispatcher) -> Self {
        BroadcastService {
            db_pool,
            dispatcher,
        }
    }

    /// Crea el broadcast en "created" con un destinatario "pending" por entrada.
    pub async fn create(
        &self,
        tenant: &TenantRecord,
        req: CreateBroadcastRequest,
    ) -> AppResult<BroadcastRecord> {
        let message = req
            .message
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Message and recipients required".to_string()))?;
        if req.recipients.is_empty() {
            return Err(AppError::Validation(
                "Message and recipients required".to_string(),
            ));
        }
        if let Some(pos) = req.recipients.iter().position(|r| r.phone.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "Recipient #{} has no phone",
                pos + 1
            )));
        }

        let delivery_method: DeliveryMethod = select_strategy(tenant.plan).into();
        let now = Utc::now();
        let broadcast = BroadcastRecord {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.id.clone(),
            title: req.title,
            message,
            media_url: req.media_url,
            delivery_method,
            status: BroadcastStatus::Created,
            total_recipients: req.recipients.len() as i64,
            sent_count: 0,
            failed_count: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
        };

        // Broadcast y destinatarios en la misma transacción
        let mut tx = self.db_pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO broadcasts (
                id, tenant_id, title, message, media_url, delivery_method,
                status, total_recipients, sent_count, failed_count, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, 0, ?9)
            "#,
        )
        .bind(&broadcast.id)
        .bind(&broadcast.tenant_id)
        .bind(&broadcast.title)
        .bind(&broadcast.message)
        .bind(&broadcast.media_url)
        .bind(broadcast.delivery_method)
        .bind(broadcast.status)
        .bind(broadcast.total_recipients)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for recipient in &req.recipients {
            sqlx::query(
                r#"
                INSERT INTO broadcast_recipients (
                    id, broadcast_id, phone, name, status, created_at
                )
                VALUES (?1, ?2, ?3, ?4, 'pending', ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&broadcast.id)
            .bind(recipient.phone.trim())
            .bind(&recipient.name)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        log::info!(
            "(create) Broadcast {} creado para tenant {} con {} destinatarios via {:?}",
            broadcast.id,
            broadcast.tenant_id,
            broadcast.total_recipients,
            broadcast.delivery_method
        );
        Ok(broadcast)
    }

    /// Pasa el broadcast a "in_progress" y lo despacha según su método.
    ///
    /// La transición es un UPDATE condicional sobre `status = 'created'`, así
    /// que dos llamadas concurrentes no pueden arrancarlo dos veces.
    pub async fn start(&self, tenant_id: &str, broadcast_id: &str) -> AppResult<BroadcastRecord> {
        let started = sqlx::query(
            r#"
            UPDATE broadcasts
            SET status = 'in_progress',
                started_at = ?3
            WHERE id = ?1 AND tenant_id = ?2 AND status = 'created'
            "#,
        )
        .bind(broadcast_id)
        .bind(tenant_id)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        let broadcast = self.find_owned(tenant_id, broadcast_id).await?;
        if started == 0 {
            return Err(AppError::InvalidState(format!(
                "Broadcast {} cannot be started: status is {}",
                broadcast_id,
                broadcast.status.as_str()
            )));
        }

        match broadcast.delivery_method.strategy() {
            DeliveryStrategy::Push => {
                if let Err(e) = self.dispatcher.enqueue(broadcast_id) {
                    log::error!(
                        "(start) No se pudo encolar broadcast {}: {}. Vuelve a 'created'",
                        broadcast_id,
                        e
                    );
                    self.revert_start(broadcast_id).await?;
                    return Err(e);
                }
                log::info!("(start) Broadcast {} encolado para envío WAHA", broadcast_id);
            }
            DeliveryStrategy::Pull => {
                // El agente de escritorio lo descubre consultando la cola
                log::info!(
                    "(start) Broadcast {} disponible en la cola del agente de escritorio",
                    broadcast_id
                );
            }
        }

        Ok(broadcast)
    }

    /// Deshace un `start` que no llegó a despachar nada.
    async fn revert_start(&self, broadcast_id: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE broadcasts
            SET status = 'created',
                started_at = NULL
            WHERE id = ?1
              AND status = 'in_progress'
              AND sent_count = 0
              AND failed_count = 0
            "#,
        )
        .bind(broadcast_id)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    pub async fn get_broadcast(
        &self,
        tenant_id: &str,
        broadcast_id: &str,
    ) -> AppResult<BroadcastDetail> {
        let broadcast = self.find_owned(tenant_id, broadcast_id).await?;

        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM broadcast_recipients WHERE broadcast_id = ?1 ORDER BY rowid"
        );
        let recipients = sqlx::query_as::<_, RecipientRecord>(&sql)
            .bind(broadcast_id)
            .fetch_all(&self.db_pool)
            .await?;

        Ok(BroadcastDetail {
            broadcast,
            recipients,
        })
    }

    /// Broadcasts del tenant, el más nuevo primero
    pub async fn list_broadcasts(&self, tenant_id: &str) -> AppResult<Vec<BroadcastRecord>> {
        let sql = format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE tenant_id = ?1 ORDER BY created_at DESC, rowid DESC"
        );
        let rows = sqlx::query_as::<_, BroadcastRecord>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    /// Registra el resultado de un destinatario. Es idempotente: si ya estaba
    /// en "sent" o "failed" no cambia nada y devuelve `AlreadyTerminal`.
    pub async fn record_outcome(
        &self,
        recipient_id: &str,
        outcome: DeliveryOutcome,
        error_detail: Option<&str>,
    ) -> AppResult<OutcomeTransition> {
        let result = with_store_retry("record_outcome", move || {
            self.try_record_outcome(recipient_id, outcome, error_detail)
        })
        .await;

        if let Err(e) = &result {
            if e.is_retryable() {
                log::error!(
                    "(record_outcome) No se pudo registrar {:?} para destinatario {}; queda pending: {}",
                    outcome,
                    recipient_id,
                    e
                );
            }
        }
        result
    }

    async fn try_record_outcome(
        &self,
        recipient_id: &str,
        outcome: DeliveryOutcome,
        error_detail: Option<&str>,
    ) -> AppResult<OutcomeTransition> {
        let row: Option<(String, RecipientStatus, BroadcastStatus)> = sqlx::query_as(
            r#"
            SELECT r.broadcast_id, r.status, b.status
            FROM broadcast_recipients r
            JOIN broadcasts b ON b.id = r.broadcast_id
            WHERE r.id = ?1
            "#,
        )
        .bind(recipient_id)
        .fetch_optional(&self.db_pool)
        .await?;

        let (broadcast_id, recipient_status, broadcast_status) =
            row.ok_or_else(|| AppError::NotFound(format!("Recipient {}", recipient_id)))?;

        if recipient_status != RecipientStatus::Pending {
            log::info!(
                "(record_outcome) Destinatario {} ya estaba en {:?}; se ignora el reporte",
                recipient_id,
                recipient_status
            );
            return Ok(OutcomeTransition::AlreadyTerminal);
        }
        if broadcast_status == BroadcastStatus::Created {
            return Err(AppError::InvalidState(format!(
                "Broadcast {} has not been started",
                broadcast_id
            )));
        }

        let now = Utc::now();
        let (sent_at, error_message) = match outcome {
            DeliveryOutcome::Sent => (Some(now), None),
            DeliveryOutcome::Failed => (None, error_detail),
        };

        let mut tx = self.db_pool.begin().await?;

        // Compare-and-swap: solo gana quien lo encuentre todavía en pending
        let claimed = sqlx::query(
            r#"
            UPDATE broadcast_recipients
            SET status = ?2,
                error_message = ?3,
                sent_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(recipient_id)
        .bind(outcome.status())
        .bind(error_message)
        .bind(sent_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Ok(OutcomeTransition::AlreadyTerminal);
        }

        let counter_sql = format!(
            "UPDATE broadcasts SET {col} = {col} + 1 WHERE id = ?1",
            col = outcome.counter_column()
        );
        sqlx::query(&counter_sql)
            .bind(&broadcast_id)
            .execute(&mut *tx)
            .await?;

        let completed = sqlx::query(
            r#"
            UPDATE broadcasts
            SET status = 'completed',
                completed_at = ?2
            WHERE id = ?1
              AND status = 'in_progress'
              AND started_at IS NOT NULL
              AND sent_count + failed_count = total_recipients
            "#,
        )
        .bind(&broadcast_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        tx.commit().await?;

        if completed {
            log::info!("(record_outcome) Broadcast {} completado", broadcast_id);
        }
        Ok(OutcomeTransition::Applied {
            broadcast_completed: completed,
        })
    }

    /// Lectura interna, sin filtro de tenant (la usa el envío en segundo plano).
    pub async fn load_broadcast(&self, broadcast_id: &str) -> AppResult<BroadcastRecord> {
        let sql = format!("SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE id = ?1");
        sqlx::query_as::<_, BroadcastRecord>(&sql)
            .bind(broadcast_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Broadcast {}", broadcast_id)))
    }

    /// Destinatarios pendientes en orden de creación
    pub async fn pending_recipients(&self, broadcast_id: &str) -> AppResult<Vec<RecipientRecord>> {
        let sql = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM broadcast_recipients WHERE broadcast_id = ?1 AND status = 'pending' ORDER BY rowid"
        );
        let rows = sqlx::query_as::<_, RecipientRecord>(&sql)
            .bind(broadcast_id)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows)
    }

    /// Vuelve a encolar los broadcasts WAHA que quedaron a medias (p.e. tras
    /// un reinicio). Devuelve cuántos se encolaron.
    pub async fn resume_push_broadcasts(&self) -> AppResult<usize> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT b.id
            FROM broadcasts b
            WHERE b.status = 'in_progress'
              AND b.delivery_method = 'waha'
              AND EXISTS (
                  SELECT 1 FROM broadcast_recipients r
                  WHERE r.broadcast_id = b.id AND r.status = 'pending'
              )
            ORDER BY b.started_at
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        for (id,) in &ids {
            log::info!("(resume_push_broadcasts) Reanudando broadcast {}", id);
            self.dispatcher.enqueue(id)?;
        }
        Ok(ids.len())
    }

    async fn find_owned(&self, tenant_id: &str, broadcast_id: &str) -> AppResult<BroadcastRecord> {
        let sql =
            format!("SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE id = ?1 AND tenant_id = ?2");
        sqlx::query_as::<_, BroadcastRecord>(&sql)
            .bind(broadcast_id)
            .bind(tenant_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Broadcast {}", broadcast_id)))
    }
}

/// Reintenta con backoff exponencial solo los fallos de DB.
async fn with_store_retry<T, F, Fut>(op_name: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut delay = STORE_RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < STORE_RETRY_ATTEMPTS => {
                log::warn!(
                    "({}) Fallo de DB (intento {}/{}): {}. Reintentando en {:?}...",
                    op_name,
                    attempt,
                    STORE_RETRY_ATTEMPTS,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}
