//! services/delivery_strategy.rs
//! Decide cómo se entrega un broadcast según el plan del tenant.

use crate::models::broadcast_model::DeliveryMethod;
use crate::models::tenant_model::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStrategy {
    /// Envío inmediato desde el servidor por la sesión cloud
    Push,
    /// El agente de escritorio consulta la cola y reporta
    Pull,
}

pub fn select_strategy(plan: Plan) -> DeliveryStrategy {
    match plan {
        Plan::Premium => DeliveryStrategy::Push,
        Plan::Basic => DeliveryStrategy::Pull,
    }
}

impl From<DeliveryStrategy> for DeliveryMethod {
    fn from(strategy: DeliveryStrategy) -> Self {
        match strategy {
            DeliveryStrategy::Push => DeliveryMethod::Waha,
            DeliveryStrategy::Pull => DeliveryMethod::Desktop,
        }
    }
}

impl DeliveryMethod {
    pub fn strategy(self) -> DeliveryStrategy {
        match self {
            DeliveryMethod::Waha => DeliveryStrategy::Push,
            DeliveryMethod::Desktop => DeliveryStrategy::Pull,
        }
    }
}
