use crate::{config::RewardConfig, ledger::Claim};

/// Everything that happened to one agent during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AgentEvents {
    pub collisions: u32,
    pub claim: Option<Claim>,
    pub delivered: bool,
}

/// Turns per-agent events into scalar rewards.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardAssembler {
    config: RewardConfig,
}

impl RewardAssembler {
    pub fn new(config: RewardConfig) -> Self {
        RewardAssembler { config }
    }

    pub fn reward(&self, events: &AgentEvents) -> f32 {
        let mut reward = events.collisions as f32 * self.config.collision_penalty;
        if let Some(claim) = events.claim {
            reward += self.config.pickup_base
                + claim.remaining_ticks as f32 * self.config.pickup_time_multiplier;
        }
        if events.delivered {
            reward += self.config.delivery;
        }
        reward
    }

    pub fn rewards(&self, events: &[AgentEvents]) -> Vec<f32> {
        events.iter().map(|e| self.reward(e)).collect()
    }
}
