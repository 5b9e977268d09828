//! app.rs
//! Armado de servicios y rutas.

use std::sync::Arc;

use actix_web::web;
use sqlx::{Pool, Sqlite};
use tokio::task::JoinHandle;

use crate::auth::DesktopAgentAuth;
use crate::config::app_config::AppConfig;
use crate::handlers::{broadcast_handler, desktop_handler, health_handler, whatsapp_handler};
use crate::services::broadcast_service::BroadcastService;
use crate::services::push_sender::{PushDispatcher, PushSender};
use crate::services::queue_service::QueueService;
use crate::services::session_service::SessionService;
use crate::services::tenant_service::TenantService;
use crate::services::whatsapp_channel::MessagingChannel;

/// Servicios compartidos por todos los workers de actix.
#[derive(Clone)]
pub struct AppServices {
    pub tenant_service: TenantService,
    pub broadcast_service: BroadcastService,
    pub queue_service: QueueService,
    pub session_service: SessionService,
    pub agent_auth: DesktopAgentAuth,
}

impl AppServices {
    /// Crea los servicios y arranca el worker de envíos push.
    pub fn start(
        db_pool: Pool<Sqlite>,
        channel: Arc<dyn MessagingChannel>,
        config: &AppConfig,
    ) -> (Self, JoinHandle<()>) {
        let (dispatcher, jobs_rx) = PushDispatcher::channel();

        let tenant_service = TenantService::new(db_pool.clone());
        let broadcast_service = BroadcastService::new(db_pool.clone(), dispatcher);
        let queue_service = QueueService::new(
            db_pool,
            broadcast_service.clone(),
            tenant_service.clone(),
            config.delivery.queue_batch_size,
        );
        let session_service = SessionService::new(tenant_service.clone(), Arc::clone(&channel));

        let push_sender = PushSender::new(
            broadcast_service.clone(),
            tenant_service.clone(),
            channel,
            config.delivery.send_delay,
        );
        let worker = push_sender.start_worker(jobs_rx);

        let services = AppServices {
            tenant_service,
            broadcast_service,
            queue_service,
            session_service,
            agent_auth: DesktopAgentAuth {
                api_key: config.desktop_agent_api_key.clone(),
            },
        };
        (services, worker)
    }

    /// Registra los servicios como `web::Data` y monta las rutas.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.tenant_service.clone()))
            .app_data(web::Data::new(self.broadcast_service.clone()))
            .app_data(web::Data::new(self.queue_service.clone()))
            .app_data(web::Data::new(self.session_service.clone()))
            .app_data(web::Data::new(self.agent_auth.clone()));
        init_app(cfg);
    }
}

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_handler::health_endpoint))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/broadcasts")
                        .route(
                            "/create",
                            web::post().to(broadcast_handler::create_broadcast_endpoint),
                        )
                        .route(
                            "/list",
                            web::get().to(broadcast_handler::list_broadcasts_endpoint),
                        )
                        .route(
                            "/{id}",
                            web::get().to(broadcast_handler::get_broadcast_endpoint),
                        )
                        .route(
                            "/{id}/start",
                            web::post().to(broadcast_handler::start_broadcast_endpoint),
                        ),
                )
                .service(
                    web::scope("/desktop")
                        .route(
                            "/queue/{tenant_id}",
                            web::get().to(desktop_handler::queue_endpoint),
                        )
                        .route(
                            "/update-status",
                            web::post().to(desktop_handler::update_status_endpoint),
                        ),
                )
                .service(
                    web::scope("/whatsapp")
                        .route(
                            "/start-session",
                            web::post().to(whatsapp_handler::start_session_endpoint),
                        )
                        .route("/qr", web::get().to(whatsapp_handler::qr_endpoint))
                        .route("/status", web::get().to(whatsapp_handler::status_endpoint))
                        .route(
                            "/stop-session",
                            web::post().to(whatsapp_handler::stop_session_endpoint),
                        ),
                ),
        );
}
