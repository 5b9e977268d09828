//! models/session_model.rs
//! Respuestas de los endpoints de sesión de WhatsApp.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SessionStartResponse {
    pub success: bool,
    pub session: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatusResponse {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
