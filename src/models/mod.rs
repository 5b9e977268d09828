//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod broadcast_model;
pub mod queue_model;
pub mod recipient_model;
pub mod session_model;
pub mod tenant_model;
