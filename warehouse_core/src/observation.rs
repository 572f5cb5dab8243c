use serde::{Deserialize, Serialize};

use crate::{AgentId, Vec2, world::WorldState};

/// One waiting request as an agent sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestView {
    pub pickup: Vec2,
    pub delivery: Vec2,
}

/// Fixed-shape observation of a single agent.
///
/// `other_*` fields list every other agent in ascending id order. `requests`
/// always holds exactly `num_requests` entries, in ascending pickup id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub self_position: Vec2,
    /// 1 when the agent carries nothing, 0 otherwise.
    pub self_availability: u8,
    /// Zero vector when not carrying.
    pub self_delivery_target: Vec2,
    pub other_positions: Vec<Vec2>,
    pub other_availabilities: Vec<u8>,
    pub other_delivery_targets: Vec<Vec2>,
    pub requests: Vec<RequestView>,
}

impl Observation {
    pub fn is_available(&self) -> bool {
        self.self_availability == 1
    }

    /// Flattens into a vector for learners, in this order:
    ///
    /// | slice | length |
    /// |---|---|
    /// | self position | 2 |
    /// | self availability | 1 |
    /// | self delivery target | 2 |
    /// | other positions | 2 × (n − 1) |
    /// | other availabilities | n − 1 |
    /// | other delivery targets | 2 × (n − 1) |
    /// | requests (pickup x, y, delivery x, y) | 4 × r |
    pub fn to_vec(&self) -> Vec<f32> {
        let others = self.other_positions.len();
        let mut out = Vec::with_capacity(5 + 5 * others + 4 * self.requests.len());
        out.extend([self.self_position.x, self.self_position.y]);
        out.push(f32::from(self.self_availability));
        out.extend([self.self_delivery_target.x, self.self_delivery_target.y]);
        for p in &self.other_positions {
            out.extend([p.x, p.y]);
        }
        out.extend(self.other_availabilities.iter().map(|&a| f32::from(a)));
        for t in &self.other_delivery_targets {
            out.extend([t.x, t.y]);
        }
        for r in &self.requests {
            out.extend([r.pickup.x, r.pickup.y, r.delivery.x, r.delivery.y]);
        }
        out
    }
}

/// Assembles observations from the world tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationBuilder {
    num_agents: usize,
    num_requests: usize,
}

impl ObservationBuilder {
    pub fn new(num_agents: usize, num_requests: usize) -> Self {
        ObservationBuilder {
            num_agents,
            num_requests,
        }
    }

    /// Length of [`Observation::to_vec`].
    pub fn flat_len(&self) -> usize {
        5 + 5 * self.num_agents.saturating_sub(1) + 4 * self.num_requests
    }

    /// Observations of every agent, indexed by agent id.
    pub fn build(&self, world: &WorldState) -> Vec<Observation> {
        let availabilities: Vec<u8> = (0..world.num_agents())
            .map(|agent| u8::from(world.is_available(agent)))
            .collect();
        let targets: Vec<Vec2> = (0..world.num_agents())
            .map(|agent| world.delivery_target_position(agent).unwrap_or(Vec2::ZERO))
            .collect();
        let requests: Vec<RequestView> = world
            .ledger
            .waiting()
            .filter_map(|request| {
                Some(RequestView {
                    pickup: *world.pickup_positions().get(request.pickup)?,
                    delivery: *world.delivery_positions().get(request.target)?,
                })
            })
            .collect();

        (0..world.num_agents())
            .map(|agent| Observation {
                self_position: world.agent_positions[agent],
                self_availability: availabilities[agent],
                self_delivery_target: targets[agent],
                other_positions: without(&world.agent_positions, agent),
                other_availabilities: without(&availabilities, agent),
                other_delivery_targets: without(&targets, agent),
                requests: requests.clone(),
            })
            .collect()
    }
}

fn without<T: Copy>(values: &[T], skip: AgentId) -> Vec<T> {
    values
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != skip)
        .map(|(_, v)| *v)
        .collect()
}
