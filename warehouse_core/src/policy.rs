use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{AgentId, Vec2, action::Action, observation::Observation};

/// Trait defining a decision maker for every agent of the warehouse.
/// Policies only see observations, never the simulation internals.
pub trait Policy {
    /// Short name for logs and CLI selection.
    fn name(&self) -> &'static str;

    /// Returns one action per agent, keyed by agent id. `observations` is
    /// indexed by agent id.
    /// `&mut self` allows the policy to keep state between ticks.
    fn compute_actions(&mut self, observations: &[Observation]) -> BTreeMap<AgentId, Action>;
}

/// Uniformly random velocities.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn compute_actions(&mut self, observations: &[Observation]) -> BTreeMap<AgentId, Action> {
        (0..observations.len())
            .map(|agent| {
                let vx = self.rng.random_range(-1.0..=1.0);
                let vy = self.rng.random_range(-1.0..=1.0);
                (agent, Action::new(vx, vy))
            })
            .collect()
    }
}

/// Heads straight for the nearest unclaimed request, then for its delivery point.
///
/// There is no path planning: agents steer directly at their target and, with a
/// small probability per axis, take a random component instead to shake loose
/// from deadlocks against other agents.
#[derive(Debug)]
pub struct GreedyPolicy {
    rng: StdRng,
    /// Pickup position each available agent is heading to.
    assignments: Vec<Option<Vec2>>,
    perturb_probability: f64,
}

impl GreedyPolicy {
    pub const DEFAULT_PERTURB_PROBABILITY: f64 = 0.1;

    pub fn new(seed: u64) -> Self {
        Self::with_perturbation(seed, Self::DEFAULT_PERTURB_PROBABILITY)
    }

    pub fn with_perturbation(seed: u64, perturb_probability: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            assignments: Vec::new(),
            perturb_probability: perturb_probability.clamp(0.0, 1.0),
        }
    }

    /// Current pickup assignment of an agent, if it is heading to one.
    pub fn assignment(&self, agent: AgentId) -> Option<Vec2> {
        self.assignments.get(agent).copied().flatten()
    }

    /// Picks the nearest request pickup that no other agent is heading to.
    fn choose_request(&self, agent: AgentId, observation: &Observation) -> Option<Vec2> {
        observation
            .requests
            .iter()
            .map(|request| request.pickup)
            .filter(|pickup| {
                !self
                    .assignments
                    .iter()
                    .enumerate()
                    .any(|(other, assigned)| other != agent && *assigned == Some(*pickup))
            })
            .min_by(|a, b| {
                a.distance(observation.self_position)
                    .total_cmp(&b.distance(observation.self_position))
            })
    }

    fn steer(&mut self, from: Vec2, to: Vec2) -> Action {
        let direction = (to - from).clamp(-1.0, 1.0);
        let mut vx = direction.x;
        let mut vy = direction.y;
        if self.rng.random_bool(self.perturb_probability) {
            vx = self.rng.random_range(-1.0..=1.0);
        }
        if self.rng.random_bool(self.perturb_probability) {
            vy = self.rng.random_range(-1.0..=1.0);
        }
        Action::new(vx, vy)
    }
}

impl Policy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn compute_actions(&mut self, observations: &[Observation]) -> BTreeMap<AgentId, Action> {
        self.assignments.resize(observations.len(), None);
        let mut actions = BTreeMap::new();

        for (agent, observation) in observations.iter().enumerate() {
            let target = if observation.is_available() {
                // Drop assignments whose request was claimed or expired.
                let still_waiting = self.assignments[agent].filter(|pickup| {
                    observation.requests.iter().any(|r| r.pickup == *pickup)
                });
                let assignment =
                    still_waiting.or_else(|| self.choose_request(agent, observation));
                self.assignments[agent] = assignment;
                assignment
            } else {
                self.assignments[agent] = None;
                Some(observation.self_delivery_target)
            };

            let action = match target {
                Some(target) => self.steer(observation.self_position, target),
                None => Action::STOP,
            };
            actions.insert(agent, action);
        }
        actions
    }
}
