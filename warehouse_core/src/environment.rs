use std::collections::BTreeMap;

use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};

use crate::{
    AgentId, PickupId,
    action::Action,
    clock::SimulationClock,
    config::{ConfigError, WarehouseConfig},
    detector,
    layout::Layout,
    ledger::{LedgerError, RequestLedger},
    observation::{Observation, ObservationBuilder},
    physics::{BodyHandle, EulerPhysics, PhysicsAdapter},
    reward::{AgentEvents, RewardAssembler},
    world::WorldState,
};

/// Errors surfaced by the simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request ledger could not keep the waiting count. The episode cannot
    /// continue.
    #[error("request ledger invariant violated: {0}")]
    Ledger(#[from] LedgerError),

    #[error("step called before reset")]
    NotReset,
}

/// Per-agent diagnostics of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentInfo {
    pub collisions: u32,
    pub claimed: Option<PickupId>,
    pub delivered: bool,
}

/// What changed in the request table during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Tick number after the step (1 for the first step of an episode).
    pub tick: u64,
    pub expired: Vec<PickupId>,
    pub claimed: Vec<PickupId>,
    pub delivered: Vec<AgentId>,
    pub regenerated: Vec<PickupId>,
}

/// Episode termination flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dones {
    pub agents: Vec<bool>,
    pub all: bool,
}

/// Everything returned by [`Warehouse::step`]. Vectors are indexed by agent id.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observations: Vec<Observation>,
    pub rewards: Vec<f32>,
    pub dones: Dones,
    pub infos: Vec<AgentInfo>,
    pub summary: TickSummary,
}

/// The continuous multi-agent warehouse.
///
/// Built from a validated [`WarehouseConfig`] and an injected physics stepper.
/// Call [`reset`](Self::reset) before the first [`step`](Self::step); every
/// random draw comes from the generator seeded there.
pub struct Warehouse<P: PhysicsAdapter = EulerPhysics> {
    config: WarehouseConfig,
    physics: P,
    bodies: Vec<BodyHandle>,
    world: WorldState,
    rewards: RewardAssembler,
    observer: ObservationBuilder,
    clock: SimulationClock,
    rng: StdRng,
    seed: Option<u64>,
}

impl Warehouse<EulerPhysics> {
    /// Warehouse backed by the built-in Euler stepper.
    pub fn with_default_physics(config: WarehouseConfig) -> Result<Self, ConfigError> {
        Warehouse::new(config, EulerPhysics::default())
    }
}

impl<P: PhysicsAdapter> Warehouse<P> {
    pub fn new(config: WarehouseConfig, physics: P) -> Result<Self, ConfigError> {
        config.validate()?;

        let layout = Layout::from_config(&config);
        let ledger = RequestLedger::new(
            layout.pickup_positions.len(),
            layout.delivery_positions.len(),
            config.num_requests,
            config.pickup_wait_ticks,
        );
        let world = WorldState::new(layout, config.agent_radius, ledger);

        Ok(Warehouse {
            rewards: RewardAssembler::new(config.rewards.clone()),
            observer: ObservationBuilder::new(config.num_agents, config.num_requests),
            clock: SimulationClock::new(config.episode_duration_ticks),
            rng: StdRng::seed_from_u64(0),
            seed: None,
            bodies: Vec::new(),
            physics,
            world,
            config,
        })
    }

    /// Starts a new episode and returns the initial observations.
    pub fn reset(&mut self, seed: u64) -> Result<Vec<Observation>, SimulationError> {
        self.rng = StdRng::seed_from_u64(seed);

        self.physics.reset();
        for boundary in &self.world.layout.boundaries {
            self.physics.create_static_boundary(*boundary);
        }

        self.world.reset_agents();
        let radius = self.config.agent_radius;
        self.bodies = self
            .world
            .agent_positions
            .iter()
            .map(|&position| self.physics.create_body(position, radius))
            .collect();

        self.world.ledger.seed_initial(&mut self.rng)?;
        self.clock.reset();
        self.seed = Some(seed);

        info!(
            seed,
            agents = self.config.num_agents,
            requests = self.config.num_requests,
            pickup_points = self.world.ledger.num_pickup_points(),
            "warehouse reset"
        );
        Ok(self.observe())
    }

    /// Advances the simulation by one tick.
    ///
    /// Agents missing from `actions` stand still; ids that do not belong to an
    /// agent are ignored.
    pub fn step(
        &mut self,
        actions: &BTreeMap<AgentId, Action>,
    ) -> Result<StepResult, SimulationError> {
        if self.seed.is_none() {
            return Err(SimulationError::NotReset);
        }
        if self.clock.is_done() {
            warn!(
                tick = self.clock.elapsed(),
                "stepping past the end of the episode"
            );
        }

        let num_agents = self.world.num_agents();
        for unknown in actions.keys().filter(|&&agent| agent >= num_agents) {
            warn!(agent = unknown, "ignoring action for unknown agent");
        }

        // Integrate every agent as one batch.
        for (agent, &body) in self.bodies.iter().enumerate() {
            let action = actions.get(&agent).copied().unwrap_or(Action::STOP);
            self.physics
                .set_velocity(body, action.velocity(self.config.max_speed));
        }
        let positions = self.physics.integrate(self.config.tick_duration());
        for (agent, &body) in self.bodies.iter().enumerate() {
            if let Some(&position) = positions.get(body) {
                self.world.agent_positions[agent] = position;
            }
        }

        let mut events = vec![AgentEvents::default(); num_agents];

        self.world.ledger.decrement_timers();
        let expired = self.world.ledger.expire();

        let collisions = detector::agent_collisions(
            &self.world.agent_positions,
            self.config.agent_radius,
            self.config.collision_epsilon,
        );
        for (event, count) in events.iter_mut().zip(collisions) {
            event.collisions = count;
        }

        // Resolved against one snapshot, applied afterwards.
        let claims = detector::claim_events(
            &self.world.agent_positions,
            &self.world.agent_delivery_targets,
            &self.world.layout.pickup_positions,
            &self.world.ledger,
            self.config.pickup_tolerance,
        );
        let mut claimed = Vec::with_capacity(claims.len());
        for event in claims {
            let carrier = &mut self.world.agent_delivery_targets[event.agent];
            if let Some(claim) = self.world.ledger.claim(event.pickup, carrier) {
                debug!(
                    agent = event.agent,
                    pickup = claim.pickup,
                    target = claim.target,
                    remaining_ticks = claim.remaining_ticks,
                    "request claimed"
                );
                events[event.agent].claim = Some(claim);
                claimed.push(claim.pickup);
            }
        }

        let regenerated = self
            .world
            .ledger
            .regenerate(expired.len() + claimed.len(), &mut self.rng)?;

        let delivered = detector::delivery_events(
            &self.world.agent_positions,
            &self.world.agent_delivery_targets,
            &self.world.layout.delivery_positions,
            self.config.delivery_tolerance,
        );
        for &agent in &delivered {
            debug!(
                agent,
                target = ?self.world.agent_delivery_targets[agent],
                "request delivered"
            );
            self.world.agent_delivery_targets[agent] = None;
            events[agent].delivered = true;
        }

        let rewards = self.rewards.rewards(&events);
        let observations = self.observe();

        let done = self.clock.advance();
        let infos = events
            .iter()
            .map(|e| AgentInfo {
                collisions: e.collisions,
                claimed: e.claim.map(|c| c.pickup),
                delivered: e.delivered,
            })
            .collect();

        Ok(StepResult {
            observations,
            rewards,
            dones: Dones {
                agents: vec![done; num_agents],
                all: done,
            },
            infos,
            summary: TickSummary {
                tick: self.clock.elapsed(),
                expired,
                claimed,
                delivered,
                regenerated,
            },
        })
    }

    /// Observations of the current state without advancing.
    pub fn observe(&self) -> Vec<Observation> {
        self.observer.build(&self.world)
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn observation_builder(&self) -> &ObservationBuilder {
        &self.observer
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.clock.elapsed()
    }

    pub fn is_done(&self) -> bool {
        self.clock.is_done()
    }

    /// Seed of the current episode, `None` before the first reset.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}
