#![allow(dead_code)]

use warehouse_core::{
    PickupId, Vec2,
    config::{Preset, WarehouseConfig},
    environment::Warehouse,
    ledger::WaitingRequest,
    physics::{BodyHandle, Boundary, PhysicsAdapter},
};

/// Physics double that moves bodies by `velocity * dt` and lets tests put a body
/// exactly where they want it on the next integration.
#[derive(Debug, Default)]
pub struct TeleportPhysics {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    pending: Vec<(BodyHandle, Vec2)>,
}

impl TeleportPhysics {
    pub fn teleport(&mut self, body: BodyHandle, position: Vec2) {
        self.pending.push((body, position));
    }
}

impl PhysicsAdapter for TeleportPhysics {
    fn reset(&mut self) {
        self.positions.clear();
        self.velocities.clear();
        self.pending.clear();
    }

    fn create_body(&mut self, position: Vec2, _radius: f32) -> BodyHandle {
        self.positions.push(position);
        self.velocities.push(Vec2::ZERO);
        self.positions.len() - 1
    }

    fn create_static_boundary(&mut self, _boundary: Boundary) {}

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        self.velocities[body] = velocity;
    }

    fn integrate(&mut self, dt: f32) -> Vec<Vec2> {
        for (position, velocity) in self.positions.iter_mut().zip(&self.velocities) {
            *position += *velocity * dt;
        }
        for (body, position) in self.pending.drain(..) {
            self.positions[body] = position;
        }
        self.positions.clone()
    }
}

pub fn teleport_warehouse(config: WarehouseConfig, seed: u64) -> Warehouse<TeleportPhysics> {
    let mut env = Warehouse::new(config, TeleportPhysics::default()).unwrap();
    env.reset(seed).unwrap();
    env
}

pub fn small_config() -> WarehouseConfig {
    WarehouseConfig::preset(Preset::Small)
}

pub fn waiting(env: &Warehouse<TeleportPhysics>) -> Vec<WaitingRequest> {
    env.world().ledger.waiting().collect()
}

pub fn pickup_position(env: &Warehouse<TeleportPhysics>, pickup: PickupId) -> Vec2 {
    env.world().pickup_positions()[pickup]
}

/// Checks the per-tick invariants of the request table and the carriers.
pub fn assert_invariants<P: PhysicsAdapter>(env: &Warehouse<P>) {
    let world = env.world();
    let config = env.config();
    assert_eq!(world.ledger.waiting_count(), config.num_requests);
    for request in world.ledger.waiting() {
        assert!(request.target < world.delivery_positions().len());
        assert!(request.remaining_ticks > 0);
    }
    for target in world.agent_delivery_targets.iter().flatten() {
        assert!(*target < world.delivery_positions().len());
    }
}
