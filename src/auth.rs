//! auth.rs
//! Resuelve el tenant autenticado de cada request.

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;

use crate::errors::AppError;
use crate::models::tenant_model::TenantRecord;
use crate::services::tenant_service::TenantService;

/// Tenant dueño del token `Authorization: Bearer <token>`.
pub struct AuthenticatedTenant(pub TenantRecord);

impl FromRequest for AuthenticatedTenant {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let tenant_service = req.app_data::<web::Data<TenantService>>().cloned();

        Box::pin(async move {
            let tenant_service = tenant_service
                .ok_or_else(|| AppError::Internal("TenantService not configured".to_string()))?;
            let token = token.ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;

            tenant_service
                .find_by_token(&token)
                .await?
                .map(AuthenticatedTenant)
                .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))
        })
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Clave compartida con el agente de escritorio. Sin clave configurada los
/// endpoints del agente quedan abiertos.
#[derive(Debug, Clone, Default)]
pub struct DesktopAgentAuth {
    pub api_key: Option<String>,
}

impl DesktopAgentAuth {
    pub fn verify(&self, req: &HttpRequest) -> Result<(), AppError> {
        let expected = match &self.api_key {
            Some(key) => key,
            None => return Ok(()),
        };

        let provided = req
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());

        match provided {
            Some(key) if key == expected => Ok(()),
            _ => Err(AppError::Unauthorized("Invalid API key".to_string())),
        }
    }
}
