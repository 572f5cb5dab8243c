use crate::{
    AgentId, DeliveryId, PickupId, Vec2,
    layout::Layout,
    ledger::{PickupState, RequestLedger},
};

/// Per-entity tables of the warehouse, indexed by stable ids.
///
/// Renderers and tests get a shared reference to this; only the simulation
/// mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldState {
    pub layout: Layout,
    pub agent_radius: f32,
    pub agent_positions: Vec<Vec2>,
    pub agent_delivery_targets: Vec<Option<DeliveryId>>,
    pub ledger: RequestLedger,
}

impl WorldState {
    pub fn new(layout: Layout, agent_radius: f32, ledger: RequestLedger) -> Self {
        let num_agents = layout.agent_initial_positions.len();
        WorldState {
            agent_positions: layout.agent_initial_positions.clone(),
            agent_delivery_targets: vec![None; num_agents],
            layout,
            agent_radius,
            ledger,
        }
    }

    /// Puts agents back on their starting spots with empty hands.
    /// The ledger is left alone.
    pub fn reset_agents(&mut self) {
        self.agent_positions
            .clone_from(&self.layout.agent_initial_positions);
        self.agent_delivery_targets.fill(None);
    }

    pub fn num_agents(&self) -> usize {
        self.agent_positions.len()
    }

    pub fn pickup_positions(&self) -> &[Vec2] {
        &self.layout.pickup_positions
    }

    pub fn delivery_positions(&self) -> &[Vec2] {
        &self.layout.delivery_positions
    }

    pub fn is_available(&self, agent: AgentId) -> bool {
        matches!(self.agent_delivery_targets.get(agent), Some(None))
    }

    /// Position of the delivery point the agent is carrying to, if any.
    pub fn delivery_target_position(&self, agent: AgentId) -> Option<Vec2> {
        let target = (*self.agent_delivery_targets.get(agent)?)?;
        self.layout.delivery_positions.get(target).copied()
    }

    pub fn pickup_state(&self, pickup: PickupId) -> Option<PickupState> {
        self.ledger.state(pickup)
    }

    /// Whether any agent is currently carrying to this delivery point.
    pub fn is_delivery_targeted(&self, delivery: DeliveryId) -> bool {
        self.agent_delivery_targets.contains(&Some(delivery))
    }
}
