//! tests/support.rs
//! Helpers comunes: DB en memoria, canal falso y armado de servicios.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app::AppServices;
use crate::config::app_config::{AppConfig, DeliveryPolicy, DEFAULT_QUEUE_BATCH_SIZE};
use crate::db::{run_migrations, setup_database};
use crate::models::broadcast_model::{
    BroadcastDetail, BroadcastStatus, CreateBroadcastRequest, RecipientInput,
};
use crate::models::tenant_model::{Plan, TenantRecord};
use crate::services::broadcast_service::BroadcastService;
use crate::services::whatsapp_channel::{ChannelError, MessagingChannel, SessionState};

/// Un envío que pasó por el canal falso
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub session: String,
    pub chat_id: String,
    pub text: String,
    pub at: Instant,
}

/// Canal de WhatsApp guionado para tests.
pub struct FakeChannel {
    pub session_status: String,
    pub unreachable: bool,
    pub failing_chat_ids: HashSet<String>,
    pub panicking_chat_ids: HashSet<String>,
    pub attempts: Mutex<Vec<SentMessage>>,
    pub started_sessions: Mutex<Vec<String>>,
    pub stopped_sessions: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn working() -> Self {
        FakeChannel {
            session_status: "WORKING".to_string(),
            unreachable: false,
            failing_chat_ids: HashSet::new(),
            panicking_chat_ids: HashSet::new(),
            attempts: Mutex::new(Vec::new()),
            started_sessions: Mutex::new(Vec::new()),
            stopped_sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_for(mut self, chat_id: &str) -> Self {
        self.failing_chat_ids.insert(chat_id.to_string());
        self
    }

    /// Simula un bug del cliente: el envío a ese chat entra en panic
    pub fn panicking_for(mut self, chat_id: &str) -> Self {
        self.panicking_chat_ids.insert(chat_id.to_string());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.session_status = status.to_string();
        self
    }

    pub fn unreachable() -> Self {
        FakeChannel {
            unreachable: true,
            ..FakeChannel::working()
        }
    }

    /// Intentos de envío (exitosos o no) en orden
    pub fn attempts(&self) -> Vec<SentMessage> {
        self.attempts.lock().unwrap().clone()
    }

    fn connection_refused() -> ChannelError {
        ChannelError::NotAvailable("connection refused".to_string())
    }
}

#[async_trait]
impl MessagingChannel for FakeChannel {
    async fn send_text(
        &self,
        session: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        self.attempts.lock().unwrap().push(SentMessage {
            session: session.to_string(),
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            at: Instant::now(),
        });

        if self.panicking_chat_ids.contains(chat_id) {
            panic!("cliente de WhatsApp roto para {}", chat_id);
        }
        if self.unreachable {
            return Err(Self::connection_refused());
        }
        if self.failing_chat_ids.contains(chat_id) {
            return Err(ChannelError::Rejected {
                status: 500,
                body: "number not on WhatsApp".to_string(),
            });
        }
        Ok(())
    }

    async fn session_status(&self, _session: &str) -> Result<SessionState, ChannelError> {
        if self.unreachable {
            return Err(Self::connection_refused());
        }
        Ok(SessionState {
            status: self.session_status.clone(),
            raw: json!({ "status": self.session_status }),
        })
    }

    async fn start_session(&self, session: &str) -> Result<(), ChannelError> {
        if self.unreachable {
            return Err(Self::connection_refused());
        }
        self.started_sessions.lock().unwrap().push(session.to_string());
        Ok(())
    }

    async fn get_qr(&self, _session: &str) -> Result<Option<Value>, ChannelError> {
        if self.session_status == "WORKING" {
            return Ok(None);
        }
        Ok(Some(json!({ "value": "2@qr-payload" })))
    }

    async fn stop_session(&self, session: &str) -> Result<(), ChannelError> {
        self.stopped_sessions.lock().unwrap().push(session.to_string());
        Ok(())
    }
}

/// SQLite en memoria con una sola conexión (cada conexión sería otra DB).
pub async fn test_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("No se pudo abrir SQLite en memoria");
    run_migrations(&pool).await.expect("Fallo en migraciones");
    pool
}

/// SQLite en archivo temporal con el pool de producción (WAL, varias conexiones).
pub struct FileDb {
    pub path: PathBuf,
    pub pool: Pool<Sqlite>,
}

impl FileDb {
    pub async fn open() -> Self {
        let path = std::env::temp_dir().join(format!("broadcasts-{}.db", Uuid::new_v4()));
        let url = format!("sqlite:{}", path.display());
        let pool = setup_database(&url)
            .await
            .expect("No se pudo abrir SQLite en archivo");
        FileDb { path, pool }
    }

    pub async fn cleanup(self) {
        self.pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub fn test_config(send_delay: Duration) -> AppConfig {
    AppConfig {
        delivery: DeliveryPolicy {
            send_delay,
            queue_batch_size: DEFAULT_QUEUE_BATCH_SIZE,
        },
        ..AppConfig::default()
    }
}

pub struct Harness {
    pub pool: Pool<Sqlite>,
    pub services: AppServices,
    pub channel: Arc<FakeChannel>,
    pub _worker: JoinHandle<()>,
}

impl Harness {
    pub async fn new(channel: FakeChannel) -> Self {
        Self::with_config(channel, test_config(Duration::ZERO)).await
    }

    pub async fn with_config(channel: FakeChannel, config: AppConfig) -> Self {
        Self::with_pool(test_pool().await, channel, config)
    }

    pub fn with_pool(pool: Pool<Sqlite>, channel: FakeChannel, config: AppConfig) -> Self {
        let channel = Arc::new(channel);
        let (services, worker) = AppServices::start(pool.clone(), channel.clone(), &config);
        Harness {
            pool,
            services,
            channel,
            _worker: worker,
        }
    }

    pub fn broadcasts(&self) -> &BroadcastService {
        &self.services.broadcast_service
    }

    pub async fn tenant(&self, plan: Plan) -> TenantRecord {
        let session = match plan {
            Plan::Premium => Some("tenant_session"),
            Plan::Basic => None,
        };
        self.services
            .tenant_service
            .insert_tenant("Tienda Demo", plan, session)
            .await
            .expect("No se pudo crear tenant")
    }

    pub async fn tenant_without_session(&self, plan: Plan) -> TenantRecord {
        self.services
            .tenant_service
            .insert_tenant("Sin Sesion", plan, None)
            .await
            .expect("No se pudo crear tenant")
    }
}

pub fn create_request(message: &str, phones: &[&str]) -> CreateBroadcastRequest {
    CreateBroadcastRequest {
        title: Some("Promo".to_string()),
        message: Some(message.to_string()),
        media_url: None,
        recipients: phones
            .iter()
            .enumerate()
            .map(|(i, p)| RecipientInput {
                phone: p.to_string(),
                name: Some(format!("Cliente {}", i + 1)),
            })
            .collect(),
    }
}

/// Espera a que el broadcast termine (lo envía el worker en segundo plano).
pub async fn wait_for_completion(
    broadcasts: &BroadcastService,
    tenant_id: &str,
    broadcast_id: &str,
    timeout: Duration,
) -> BroadcastDetail {
    let deadline = Instant::now() + timeout;
    loop {
        let detail = broadcasts
            .get_broadcast(tenant_id, broadcast_id)
            .await
            .expect("broadcast debería existir");
        if detail.broadcast.status == BroadcastStatus::Completed {
            return detail;
        }
        assert!(
            Instant::now() < deadline,
            "El broadcast {} no se completó a tiempo (sent={}, failed={})",
            broadcast_id,
            detail.broadcast.sent_count,
            detail.broadcast.failed_count
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// sent + failed nunca supera el total y `completed` coincide con la suma.
pub fn assert_count_invariants(detail: &BroadcastDetail) {
    let b = &detail.broadcast;
    assert!(b.sent_count + b.failed_count <= b.total_recipients);
    let full = b.sent_count + b.failed_count == b.total_recipients;
    assert_eq!(
        b.status == BroadcastStatus::Completed,
        full && b.started_at.is_some()
    );
    assert_eq!(b.status == BroadcastStatus::Completed, b.completed_at.is_some());
}
