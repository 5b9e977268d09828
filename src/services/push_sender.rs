//! services/push_sender.rs
//! Envío push (plan premium): recorre los destinatarios pendientes de un
//! broadcast y los manda por la sesión WAHA del tenant, uno por uno.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::errors::{AppError, AppResult};
use crate::models::broadcast_model::{BroadcastStatus, DeliveryMethod};
use crate::models::recipient_model::{DeliveryOutcome, OutcomeTransition, RecipientRecord};
use crate::models::tenant_model::TenantRecord;
use crate::services::broadcast_service::BroadcastService;
use crate::services::tenant_service::TenantService;
use crate::services::whatsapp_channel::{format_chat_id, MessagingChannel};

/// Trabajo de envío para un broadcast
#[derive(Debug, Clone)]
pub struct PushJob {
    pub broadcast_id: String,
}

/// Lado HTTP del worker: solo encola.
#[derive(Clone, Debug)]
pub struct PushDispatcher {
    jobs_tx: mpsc::UnboundedSender<PushJob>,
}

impl PushDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PushJob>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        (PushDispatcher { jobs_tx }, jobs_rx)
    }

    pub fn enqueue(&self, broadcast_id: &str) -> AppResult<()> {
        self.jobs_tx
            .send(PushJob {
                broadcast_id: broadcast_id.to_string(),
            })
            .map_err(|_| AppError::Internal("Push worker is not running".to_string()))
    }
}

/// Resumen de una corrida del envío
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    pub sent: usize,
    pub failed: usize,
    /// Ya terminales o con fallo de DB al registrar
    pub skipped: usize,
}

#[derive(Clone)]
pub struct PushSender {
    broadcast_service: BroadcastService,
    tenant_service: TenantService,
    channel: Arc<dyn MessagingChannel>,
    send_delay: Duration,
}

impl PushSender {
    pub fn new(
        broadcast_service: BroadcastService,
        tenant_service: TenantService,
        channel: Arc<dyn MessagingChannel>,
        send_delay: Duration,
    ) -> Self {
        Self {
            broadcast_service,
            tenant_service,
            channel,
            send_delay,
        }
    }

    /// Arranca el worker: una tarea por broadcast, sin duplicar uno que ya
    /// se esté enviando. Vive mientras exista algún `PushDispatcher`.
    pub fn start_worker(self, mut jobs_rx: mpsc::UnboundedReceiver<PushJob>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let active: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

            while let Some(job) = jobs_rx.recv().await {
                if !active.lock().await.insert(job.broadcast_id.clone()) {
                    log::info!(
                        "(push_worker) Broadcast {} ya se está enviando; se ignora",
                        job.broadcast_id
                    );
                    continue;
                }

                let sender = self.clone();
                let active = Arc::clone(&active);
                tokio::spawn(async move {
                    let broadcast_id = job.broadcast_id.clone();
                    // Corre aparte para que un panic no deje el id en `active`
                    let run = tokio::spawn(async move { sender.run(&job.broadcast_id).await });

                    match run.await {
                        Ok(Ok(summary)) => log::info!(
                            "(push_worker) Broadcast {} terminado: sent={}, failed={}, skipped={}",
                            broadcast_id,
                            summary.sent,
                            summary.failed,
                            summary.skipped
                        ),
                        Ok(Err(e)) => log::error!(
                            "(push_worker) Error enviando broadcast {}: {}",
                            broadcast_id,
                            e
                        ),
                        Err(e) => log::error!(
                            "(push_worker) La tarea del broadcast {} terminó de forma anormal: {}",
                            broadcast_id,
                            e
                        ),
                    }
                    active.lock().await.remove(&broadcast_id);
                });
            }

            log::info!("(push_worker) Cola de envíos cerrada");
        })
    }

    /// Envía todos los destinatarios pendientes del broadcast, en orden.
    pub async fn run(&self, broadcast_id: &str) -> AppResult<PushSummary> {
        let broadcast = self.broadcast_service.load_broadcast(broadcast_id).await?;
        if broadcast.delivery_method != DeliveryMethod::Waha {
            return Err(AppError::InvalidState(format!(
                "Broadcast {} is not a push broadcast",
                broadcast_id
            )));
        }
        if broadcast.status != BroadcastStatus::InProgress {
            log::info!(
                "(run) Broadcast {} está en {}; nada que enviar",
                broadcast_id,
                broadcast.status.as_str()
            );
            return Ok(PushSummary::default());
        }

        let tenant = self.tenant_service.get_tenant(&broadcast.tenant_id).await?;
        let recipients = self.broadcast_service.pending_recipients(broadcast_id).await?;
        log::info!(
            "(run) Enviando broadcast {} a {} destinatarios pendientes",
            broadcast_id,
            recipients.len()
        );

        let mut summary = PushSummary::default();

        // Sin sesión usable no se intenta ningún envío
        let session = match self.usable_session(&tenant).await {
            Ok(session) => session,
            Err(reason) => {
                log::error!("(run) Broadcast {}: {}", broadcast_id, reason);
                for recipient in &recipients {
                    self.report(recipient, DeliveryOutcome::Failed, Some(&reason), &mut summary)
                        .await;
                }
                return Ok(summary);
            }
        };

        for (idx, recipient) in recipients.iter().enumerate() {
            // Límite de WhatsApp: espera fija entre mensajes
            if idx > 0 && !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }

            let chat_id = format_chat_id(&recipient.phone);
            match self
                .channel
                .send_text(&session, &chat_id, &broadcast.message)
                .await
            {
                Ok(()) => {
                    self.report(recipient, DeliveryOutcome::Sent, None, &mut summary)
                        .await;
                }
                Err(e) => {
                    log::error!("(run) Fallo al enviar a {}: {}", recipient.phone, e);
                    let detail = e.to_string();
                    self.report(recipient, DeliveryOutcome::Failed, Some(&detail), &mut summary)
                        .await;
                }
            }
        }

        Ok(summary)
    }

    /// Nombre de la sesión si está conectada; si no, el motivo.
    async fn usable_session(&self, tenant: &TenantRecord) -> Result<String, String> {
        let session = tenant
            .waha_session_name
            .clone()
            .ok_or_else(|| "WhatsApp session not started".to_string())?;

        match self.channel.session_status(&session).await {
            Ok(state) if state.is_connected() => Ok(session),
            Ok(state) => Err(format!(
                "WhatsApp session is not connected (status {})",
                state.status
            )),
            Err(e) => Err(format!("WhatsApp session unavailable: {}", e)),
        }
    }

    /// Un fallo al registrar no corta el lote: el destinatario queda pending.
    async fn report(
        &self,
        recipient: &RecipientRecord,
        outcome: DeliveryOutcome,
        error_detail: Option<&str>,
        summary: &mut PushSummary,
    ) {
        match self
            .broadcast_service
            .record_outcome(&recipient.id, outcome, error_detail)
            .await
        {
            Ok(OutcomeTransition::Applied { .. }) => match outcome {
                DeliveryOutcome::Sent => summary.sent += 1,
                DeliveryOutcome::Failed => summary.failed += 1,
            },
            Ok(OutcomeTransition::AlreadyTerminal) => summary.skipped += 1,
            Err(e) => {
                log::error!(
                    "(report) No se registró el resultado de {}: {}",
                    recipient.id,
                    e
                );
                summary.skipped += 1;
            }
        }
    }
}
