//! services/whatsapp_channel.rs
//! Canal saliente de WhatsApp. En producción es WAHA vía HTTP.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

/// Sufijo que WhatsApp usa para chats individuales
const CHAT_ID_SUFFIX: &str = "@c.us";

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("request to WhatsApp API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("WhatsApp API responded {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    NotAvailable(String),
}

/// Estado de una sesión, tal como lo reporta el proveedor.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: String,
    pub raw: Value,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self.status.as_str(), "WORKING" | "CONNECTED")
    }
}

#[async_trait]
pub trait MessagingChannel: Send + Sync {
    async fn send_text(&self, session: &str, chat_id: &str, text: &str)
        -> Result<(), ChannelError>;

    async fn session_status(&self, session: &str) -> Result<SessionState, ChannelError>;

    async fn start_session(&self, session: &str) -> Result<(), ChannelError>;

    /// `Ok(None)` si todavía no hay QR disponible.
    async fn get_qr(&self, session: &str) -> Result<Option<Value>, ChannelError>;

    async fn stop_session(&self, session: &str) -> Result<(), ChannelError>;
}

/// Agrega el sufijo de chat si el teléfono no trae uno propio.
pub fn format_chat_id(phone: &str) -> String {
    if phone.contains('@') {
        phone.to_string()
    } else {
        format!("{}{}", phone, CHAT_ID_SUFFIX)
    }
}

#[derive(Clone)]
pub struct WahaClient {
    base_url: String,
    api_key: Option<String>,
    http_client: Client,
}

impl WahaClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http_client: Client::new(),
        }
    }

    fn with_key(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("X-Api-Key", key),
            None => req,
        }
    }

    /// Sin conexión con WAHA no es lo mismo que una respuesta de error.
    fn unreachable_or_transport(e: reqwest::Error) -> ChannelError {
        if e.is_connect() || e.is_timeout() {
            ChannelError::NotAvailable(format!("WhatsApp API unreachable: {}", e))
        } else {
            ChannelError::Transport(e)
        }
    }

    async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ChannelError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ChannelError::Rejected { status, body })
    }
}

#[async_trait]
impl MessagingChannel for WahaClient {
    async fn send_text(
        &self,
        session: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        let send_url = format!("{}/api/sendText", self.base_url);
        let payload = json!({
            "session": session,
            "chatId": chat_id,
            "text": text
        });

        let resp = self
            .with_key(self.http_client.post(&send_url))
            .json(&payload)
            .send()
            .await
            .map_err(Self::unreachable_or_transport)?;

        log::debug!(
            "(send_text) -> Envío a '{}' por sesión '{}': status={}",
            chat_id,
            session,
            resp.status()
        );
        Self::ensure_success(resp).await?;
        Ok(())
    }

    async fn session_status(&self, session: &str) -> Result<SessionState, ChannelError> {
        let status_url = format!("{}/api/sessions/{}", self.base_url, session);
        let resp = self
            .with_key(self.http_client.get(&status_url))
            .send()
            .await
            .map_err(Self::unreachable_or_transport)?;
        let raw = Self::ensure_success(resp).await?.json::<Value>().await?;

        let status = raw
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("UNKNOWN")
            .to_string();

        Ok(SessionState { status, raw })
    }

    async fn start_session(&self, session: &str) -> Result<(), ChannelError> {
        let url = format!("{}/api/sessions/start", self.base_url);
        let resp = self
            .with_key(self.http_client.post(&url))
            .json(&json!({ "name": session }))
            .send()
            .await
            .map_err(Self::unreachable_or_transport)?;
        Self::ensure_success(resp).await?;
        Ok(())
    }

    async fn get_qr(&self, session: &str) -> Result<Option<Value>, ChannelError> {
        let url = format!("{}/api/sessions/{}/qr", self.base_url, session);
        let resp = self
            .with_key(self.http_client.get(&url))
            .send()
            .await
            .map_err(Self::unreachable_or_transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::ensure_success(resp).await?;

        // WAHA puede responder JSON o la imagen en base64 como texto
        let body = resp.text().await?;
        let qr = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        Ok(Some(qr))
    }

    async fn stop_session(&self, session: &str) -> Result<(), ChannelError> {
        let url = format!("{}/api/sessions/{}/stop", self.base_url, session);
        let resp = self
            .with_key(self.http_client.post(&url))
            .json(&json!({}))
            .send()
            .await
            .map_err(Self::unreachable_or_transport)?;
        Self::ensure_success(resp).await?;
        Ok(())
    }
}
