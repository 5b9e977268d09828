//! config/app_config.rs
//! Configuración del servicio, leída de variables de entorno (.env incluido).

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Espera fija entre mensajes de un mismo broadcast (límite de WhatsApp)
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_secs(2);
/// Cantidad máxima de mensajes que se entregan por consulta a la cola
pub const DEFAULT_QUEUE_BATCH_SIZE: u32 = 50;

/// Política de entrega común a todos los broadcasts del servicio.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    pub send_delay: Duration,
    pub queue_batch_size: u32,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy {
            send_delay: DEFAULT_SEND_DELAY,
            queue_batch_size: DEFAULT_QUEUE_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub waha_url: String,
    pub waha_api_key: Option<String>,
    /// Si está definida, el agente de escritorio debe mandar `x-api-key`
    pub desktop_agent_api_key: Option<String>,
    pub delivery: DeliveryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_url: "sqlite:data/broadcasts.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            waha_url: "http://localhost:3000".to_string(),
            waha_api_key: None,
            desktop_agent_api_key: None,
            delivery: DeliveryPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno; lo que no esté definido queda por defecto.
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();

        let port = match env::var("PORT") {
            Ok(v) => v.parse::<u16>().with_context(|| format!("PORT inválido: {}", v))?,
            Err(_) => defaults.port,
        };

        let send_delay = match env::var("BROADCAST_SEND_DELAY_MS") {
            Ok(v) => Duration::from_millis(
                v.parse::<u64>()
                    .with_context(|| format!("BROADCAST_SEND_DELAY_MS inválido: {}", v))?,
            ),
            Err(_) => defaults.delivery.send_delay,
        };

        let queue_batch_size = match env::var("DESKTOP_QUEUE_BATCH_SIZE") {
            Ok(v) => v
                .parse::<u32>()
                .with_context(|| format!("DESKTOP_QUEUE_BATCH_SIZE inválido: {}", v))?,
            Err(_) => defaults.delivery.queue_batch_size,
        };
        if queue_batch_size == 0 {
            anyhow::bail!("DESKTOP_QUEUE_BATCH_SIZE debe ser mayor a 0");
        }

        Ok(AppConfig {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            host: env::var("HOST").unwrap_or(defaults.host),
            port,
            waha_url: env::var("WAHA_URL").unwrap_or(defaults.waha_url),
            waha_api_key: non_empty_var("WAHA_API_KEY"),
            desktop_agent_api_key: non_empty_var("DESKTOP_AGENT_API_KEY"),
            delivery: DeliveryPolicy {
                send_delay,
                queue_batch_size,
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
