use crate::{AgentId, DeliveryId, PickupId, Vec2, ledger::RequestLedger};

/// A claim that survived tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaimEvent {
    pub agent: AgentId,
    pub pickup: PickupId,
    pub distance: f32,
}

/// Number of other agents each agent touches, using `2 * radius + epsilon` as
/// the contact distance.
pub fn agent_collisions(positions: &[Vec2], radius: f32, epsilon: f32) -> Vec<u32> {
    let threshold = 2.0 * radius + epsilon;
    let mut counts = vec![0; positions.len()];
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i].distance(positions[j]) < threshold {
                counts[i] += 1;
                counts[j] += 1;
            }
        }
    }
    counts
}

/// Resolves which available agents claim which waiting pickup points this tick.
///
/// An agent in range of several points takes the nearest one (lowest pickup id on
/// a tie). Agents contending for the same point are settled by lowest agent id;
/// losers get nothing this tick. The result is sorted by agent id.
pub fn claim_events(
    agent_positions: &[Vec2],
    delivery_targets: &[Option<DeliveryId>],
    pickup_positions: &[Vec2],
    ledger: &RequestLedger,
    tolerance: f32,
) -> Vec<ClaimEvent> {
    let mut winners: Vec<Option<ClaimEvent>> = vec![None; pickup_positions.len()];

    // Agents in ascending id order, so the first to pick a point keeps it.
    for (agent, position) in agent_positions.iter().enumerate() {
        if delivery_targets.get(agent).copied().flatten().is_some() {
            continue;
        }

        let preferred = ledger
            .waiting()
            .filter_map(|request| {
                let distance = pickup_positions.get(request.pickup)?.distance(*position);
                (distance < tolerance).then_some((request.pickup, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        if let Some((pickup, distance)) = preferred {
            winners[pickup].get_or_insert(ClaimEvent {
                agent,
                pickup,
                distance,
            });
        }
    }

    let mut events: Vec<ClaimEvent> = winners.into_iter().flatten().collect();
    events.sort_by_key(|event| event.agent);
    events
}

/// Agents standing on their own delivery target.
pub fn delivery_events(
    agent_positions: &[Vec2],
    delivery_targets: &[Option<DeliveryId>],
    delivery_positions: &[Vec2],
    tolerance: f32,
) -> Vec<AgentId> {
    agent_positions
        .iter()
        .zip(delivery_targets)
        .enumerate()
        .filter_map(|(agent, (position, target))| {
            let target_position = delivery_positions.get((*target)?)?;
            (target_position.distance(*position) < tolerance).then_some(agent)
        })
        .collect()
}
