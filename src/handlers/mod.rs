//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers (broadcasts, agente, WhatsApp).
pub mod broadcast_handler;
pub mod desktop_handler;
pub mod health_handler;
pub mod whatsapp_handler;
