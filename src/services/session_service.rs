//! services/session_service.rs
//! Sesión cloud de WhatsApp del tenant (solo plan premium).

use std::sync::Arc;

use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::models::session_model::SessionStatusResponse;
use crate::models::tenant_model::{Plan, TenantRecord};
use crate::services::tenant_service::TenantService;
use crate::services::whatsapp_channel::MessagingChannel;

#[derive(Clone)]
pub struct SessionService {
    tenant_service: TenantService,
    channel: Arc<dyn MessagingChannel>,
}

impl SessionService {
    pub fn new(tenant_service: TenantService, channel: Arc<dyn MessagingChannel>) -> Self {
        Self {
            tenant_service,
            channel,
        }
    }

    /// Nombre de sesión que le corresponde a un tenant
    pub fn session_name_for(tenant_id: &str) -> String {
        format!("tenant_{}", tenant_id)
    }

    pub async fn start_session(&self, tenant: &TenantRecord) -> AppResult<String> {
        require_premium(tenant, "Premium plan required for cloud WhatsApp")?;

        let session = Self::session_name_for(&tenant.id);
        self.channel.start_session(&session).await.map_err(|e| {
            log::error!("(start_session) Fallo al iniciar sesión {}: {}", session, e);
            AppError::Upstream(e.to_string())
        })?;

        self.tenant_service
            .update_session(&tenant.id, Some(&session), "connecting")
            .await?;

        log::info!("(start_session) Sesión {} iniciada, conectando...", session);
        Ok(session)
    }

    pub async fn get_qr(&self, tenant: &TenantRecord) -> AppResult<Value> {
        require_premium(tenant, "Premium plan required")?;
        let session = started_session(tenant)?;

        match self.channel.get_qr(session).await {
            Ok(Some(qr)) => Ok(qr),
            Ok(None) => Err(AppError::NotFound("QR code".to_string())),
            Err(e) => {
                log::error!("(get_qr) Fallo al obtener QR de {}: {}", session, e);
                Err(AppError::Upstream(e.to_string()))
            }
        }
    }

    /// Consulta el estado real y lo guarda en el tenant. Si el proveedor no
    /// responde se informa "disconnected" en vez de error.
    pub async fn session_status(&self, tenant: &TenantRecord) -> AppResult<SessionStatusResponse> {
        if tenant.plan != Plan::Premium {
            return Ok(SessionStatusResponse {
                success: true,
                status: "not_available".to_string(),
                plan: Some("basic".to_string()),
                data: None,
            });
        }

        let session = match &tenant.waha_session_name {
            Some(s) => s,
            None => return Ok(disconnected()),
        };

        match self.channel.session_status(session).await {
            Ok(state) => {
                self.tenant_service
                    .update_session(&tenant.id, None, &state.status)
                    .await?;
                Ok(SessionStatusResponse {
                    success: true,
                    status: state.status,
                    plan: None,
                    data: Some(state.raw),
                })
            }
            Err(e) => {
                log::error!("(session_status) Error consultando {}: {}", session, e);
                Ok(disconnected())
            }
        }
    }

    pub async fn stop_session(&self, tenant: &TenantRecord) -> AppResult<()> {
        let session = started_session(tenant)?;

        self.channel.stop_session(session).await.map_err(|e| {
            log::error!("(stop_session) Fallo al detener {}: {}", session, e);
            AppError::Upstream(e.to_string())
        })?;

        self.tenant_service
            .update_session(&tenant.id, None, "disconnected")
            .await?;
        Ok(())
    }
}

fn require_premium(tenant: &TenantRecord, message: &str) -> AppResult<()> {
    if tenant.plan == Plan::Premium {
        Ok(())
    } else {
        Err(AppError::Forbidden(message.to_string()))
    }
}

fn started_session(tenant: &TenantRecord) -> AppResult<&str> {
    tenant
        .waha_session_name
        .as_deref()
        .ok_or_else(|| AppError::Validation("No session started".to_string()))
}

fn disconnected() -> SessionStatusResponse {
    SessionStatusResponse {
        success: true,
        status: "disconnected".to_string(),
        plan: None,
        data: None,
    }
}
