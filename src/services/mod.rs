//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod broadcast_service;
pub mod delivery_strategy;
pub mod push_sender;
pub mod queue_service;
pub mod session_service;
pub mod tenant_service;
pub mod whatsapp_channel;
