use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;

use crate::app::AppServices;
use crate::config::app_config::AppConfig;
use crate::db::setup_database;
use crate::logger::init_logger;
use crate::services::whatsapp_channel::WahaClient;

mod app;
mod auth;
mod config;
mod db;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env().context("Configuración inválida")?;
    log::info!(
        "Política de entrega: delay={:?}, lote de cola={}",
        config.delivery.send_delay,
        config.delivery.queue_batch_size
    );

    // Conectarnos a la DB (corre migraciones)
    let db_pool = setup_database(&config.database_url).await?;

    let waha = Arc::new(WahaClient::new(&config.waha_url, config.waha_api_key.clone()));
    let (services, _push_worker) = AppServices::start(db_pool, waha, &config);

    // Broadcasts WAHA que quedaron a medias en la corrida anterior
    match services.broadcast_service.resume_push_broadcasts().await {
        Ok(0) => {}
        Ok(n) => log::info!("Se reanudaron {} broadcasts en curso", n),
        Err(e) => log::error!("No se pudieron reanudar broadcasts: {}", e),
    }

    // Levantar servidor
    let bind_addr = (config.host.clone(), config.port);
    log::info!("Levantando servidor en {}:{}", bind_addr.0, bind_addr.1);
    HttpServer::new(move || {
        let services = services.clone();
        App::new().configure(move |cfg| services.configure(cfg))
    })
    .bind(bind_addr)?
    .run()
    .await?;

    Ok(())
}
