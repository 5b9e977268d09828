//! models/tenant_model.rs
//! Tenant dueño de los broadcasts y de la sesión de WhatsApp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Plan {
    Basic,
    Premium,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TenantRecord {
    pub id: String,
    pub business_name: String,
    pub plan: Plan,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub waha_session_name: Option<String>,
    pub waha_status: Option<String>,
    pub created_at: DateTime<Utc>,
}
