mod common;

use std::collections::BTreeMap;

use common::{
    TeleportPhysics, assert_invariants, pickup_position, small_config, teleport_warehouse,
    waiting,
};
use warehouse_core::{
    Vec2,
    action::Action,
    config::{Preset, WarehouseConfig},
    environment::Warehouse,
    ledger::PickupState,
    policy::{GreedyPolicy, Policy, RandomPolicy},
};

fn no_actions() -> BTreeMap<usize, Action> {
    BTreeMap::new()
}

#[test]
fn agent_on_pickup_claims_request() {
    let mut env = teleport_warehouse(small_config(), 21);
    let request = waiting(&env)[0];
    let pickup = pickup_position(&env, request.pickup);
    let delivery = env.world().delivery_positions()[request.target];

    env.physics_mut().teleport(0, pickup);
    let result = env.step(&no_actions()).unwrap();

    let obs = &result.observations[0];
    assert_eq!(obs.self_availability, 0);
    assert_eq!(obs.self_delivery_target, delivery);
    assert!(result.rewards[0] >= env.config().rewards.pickup_base);
    assert_eq!(result.infos[0].claimed, Some(request.pickup));
    assert_eq!(result.summary.claimed, vec![request.pickup]);
    assert_eq!(result.summary.regenerated.len(), 1);
    assert_eq!(env.world().ledger.waiting_count(), 2);
    assert_eq!(result.observations[1].other_availabilities, vec![0]);
    assert_eq!(result.observations[1].other_delivery_targets, vec![delivery]);
    assert_invariants(&env);
}

#[test]
fn claim_reward_includes_remaining_wait_time() {
    let mut config = small_config();
    config.rewards.pickup_time_multiplier = 0.5;
    config.pickup_wait_ticks = 10;
    let mut env = teleport_warehouse(config, 2);
    let request = waiting(&env)[0];

    let position = pickup_position(&env, request.pickup);
    env.physics_mut().teleport(0, position);
    let result = env.step(&no_actions()).unwrap();

    // One tick was counted off before the claim.
    assert_eq!(result.rewards[0], 1.0 + 9.0 * 0.5);
}

#[test]
fn contended_point_goes_to_lowest_agent_id() {
    let mut env = teleport_warehouse(small_config(), 8);
    let request = waiting(&env)[0];
    let pickup = pickup_position(&env, request.pickup);

    // Agent 1 is closer, agent 0 still wins.
    env.physics_mut().teleport(0, pickup + Vec2::new(0.125, 0.0));
    env.physics_mut().teleport(1, pickup);
    let result = env.step(&no_actions()).unwrap();

    assert_eq!(result.infos[0].claimed, Some(request.pickup));
    assert_eq!(result.infos[1].claimed, None);
    assert!(result.observations[1].is_available());

    let collision = env.config().rewards.collision_penalty;
    assert_eq!(result.infos[1].collisions, 1);
    assert_eq!(result.rewards[1], collision);
    assert!(result.rewards[0] > result.rewards[1]);
    assert_invariants(&env);
}

#[test]
fn claim_loser_takes_nothing_then_claims_next_tick() {
    let mut config = small_config();
    config.pickup_tolerance = 0.9;
    let tolerance = config.pickup_tolerance;
    let mut env = teleport_warehouse(config, 17);
    let requests = waiting(&env);
    let (near, far) = (requests[0].pickup, requests[1].pickup);
    let near_position = pickup_position(&env, near);
    let far_position = pickup_position(&env, far);

    // Agent 1 has both points in range but prefers the nearer one, which agent 0
    // takes.
    let loser_position = near_position + (far_position - near_position) * 0.4;
    assert!(far_position.distance(loser_position) < tolerance);
    env.physics_mut().teleport(0, near_position);
    env.physics_mut().teleport(1, loser_position);
    let result = env.step(&no_actions()).unwrap();

    assert_eq!(result.infos[0].claimed, Some(near));
    assert_eq!(result.infos[1].claimed, None);
    assert!(result.observations[1].is_available());
    assert!(env.world().pickup_state(far).unwrap().is_waiting());

    let expected = waiting(&env)
        .iter()
        .map(|r| (r.pickup, pickup_position(&env, r.pickup).distance(loser_position)))
        .filter(|&(_, distance)| distance < tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(pickup, _)| pickup);
    assert!(expected.is_some());

    let result = env.step(&no_actions()).unwrap();
    assert_eq!(result.infos[1].claimed, expected);
    assert!(!result.observations[1].is_available());
    assert_invariants(&env);
}

#[test]
fn tolerance_boundary_is_exclusive() {
    let mut config = small_config();
    config.pickup_tolerance = 0.25;
    let mut env = teleport_warehouse(config, 5);
    let request = waiting(&env)[0];
    let pickup = pickup_position(&env, request.pickup);

    env.physics_mut().teleport(0, pickup + Vec2::new(0.25, 0.0));
    let result = env.step(&no_actions()).unwrap();
    assert_eq!(result.infos[0].claimed, None);
    assert!(env.world().pickup_state(request.pickup).unwrap().is_waiting());

    env.physics_mut().teleport(0, pickup + Vec2::new(0.125, 0.0));
    let result = env.step(&no_actions()).unwrap();
    assert_eq!(result.infos[0].claimed, Some(request.pickup));
}

#[test]
fn unclaimed_request_expires_and_is_replaced() {
    let mut config = small_config();
    config.pickup_wait_ticks = 3;
    let mut env = teleport_warehouse(config, 13);
    let mut initial: Vec<_> = waiting(&env).iter().map(|r| r.pickup).collect();
    initial.sort_unstable();

    for _ in 0..2 {
        let result = env.step(&no_actions()).unwrap();
        assert!(result.summary.expired.is_empty());
        assert!(result.summary.regenerated.is_empty());
    }

    let result = env.step(&no_actions()).unwrap();
    assert_eq!(result.summary.expired, initial);
    assert!(result.summary.claimed.is_empty());
    assert_eq!(result.summary.regenerated.len(), 2);
    assert_eq!(result.rewards, vec![0.0, 0.0]);
    for request in waiting(&env) {
        assert_eq!(request.remaining_ticks, 3);
    }
    assert_invariants(&env);
}

#[test]
fn delivery_frees_agent_and_pays() {
    let mut env = teleport_warehouse(small_config(), 34);
    let request = waiting(&env)[0];
    let position = pickup_position(&env, request.pickup);
    env.physics_mut().teleport(0, position);
    env.step(&no_actions()).unwrap();

    let delivery = env.world().delivery_positions()[request.target];
    env.physics_mut().teleport(0, delivery);
    let result = env.step(&no_actions()).unwrap();

    assert!(result.infos[0].delivered);
    assert_eq!(result.summary.delivered, vec![0]);
    assert_eq!(result.rewards[0], env.config().rewards.delivery);
    assert!(result.observations[0].is_available());
    assert_eq!(result.observations[0].self_delivery_target, Vec2::ZERO);
}

#[test]
fn carrying_agent_cannot_claim_again() {
    let mut env = teleport_warehouse(small_config(), 55);
    let first = waiting(&env)[0];
    let position = pickup_position(&env, first.pickup);
    env.physics_mut().teleport(0, position);
    env.step(&no_actions()).unwrap();
    let target = env.world().agent_delivery_targets[0];

    let other = waiting(&env)[0];
    let position = pickup_position(&env, other.pickup);
    env.physics_mut().teleport(0, position);
    let result = env.step(&no_actions()).unwrap();

    assert_eq!(result.infos[0].claimed, None);
    assert_eq!(env.world().agent_delivery_targets[0], target);
    assert!(matches!(
        env.world().pickup_state(other.pickup),
        Some(PickupState::Waiting { .. })
    ));
}

#[test]
fn simultaneous_claims_are_all_regenerated() {
    let config = WarehouseConfig::preset(Preset::Medium);
    let mut env = teleport_warehouse(config, 77);
    let requests = waiting(&env);
    for (agent, request) in requests.iter().take(3).enumerate() {
        let position = pickup_position(&env, request.pickup);
        env.physics_mut().teleport(agent, position);
    }

    let result = env.step(&no_actions()).unwrap();
    let claims = result.infos.iter().filter(|i| i.claimed.is_some()).count();
    assert_eq!(claims, 3);
    assert_eq!(result.summary.regenerated.len(), 3);
    assert_eq!(result.observations[3].requests.len(), 8);
    assert_invariants(&env);
}

#[test]
fn episode_ends_exactly_at_duration() {
    let mut config = small_config();
    config.episode_duration_ticks = 600;
    let mut env = teleport_warehouse(config, 0);

    for call in 1..=600 {
        let result = env.step(&no_actions()).unwrap();
        let expected = call == 600;
        assert_eq!(result.dones.all, expected, "call {call}");
        assert!(result.dones.agents.iter().all(|&d| d == expected));
    }
    assert!(env.is_done());
}

#[test]
fn invariants_hold_under_random_play() {
    let mut config = WarehouseConfig::preset(Preset::Medium);
    config.pickup_wait_ticks = 7;
    config.pickup_tolerance = 0.6;
    let mut env = Warehouse::with_default_physics(config).unwrap();
    let mut policy = RandomPolicy::new(3);
    let mut observations = env.reset(3).unwrap();

    for _ in 0..1500 {
        let actions = policy.compute_actions(&observations);
        let result = env.step(&actions).unwrap();
        assert_invariants(&env);
        for obs in &result.observations {
            assert_eq!(obs.requests.len(), 8);
            assert_eq!(
                obs.to_vec().len(),
                env.observation_builder().flat_len()
            );
        }
        assert_eq!(
            result.summary.regenerated.len(),
            result.summary.expired.len() + result.summary.claimed.len()
        );
        observations = result.observations;
    }
}

#[test]
fn greedy_policy_completes_deliveries() {
    let mut env = Warehouse::with_default_physics(small_config()).unwrap();
    let mut policy = GreedyPolicy::new(9);
    let mut observations = env.reset(9).unwrap();
    let (mut claims, mut deliveries) = (0, 0);

    loop {
        let actions = policy.compute_actions(&observations);
        let result = env.step(&actions).unwrap();
        claims += result.summary.claimed.len();
        deliveries += result.summary.delivered.len();
        assert_invariants(&env);
        observations = result.observations;
        if result.dones.all {
            break;
        }
    }
    assert!(claims > 0);
    assert!(deliveries > 0);
}

#[test]
fn same_seed_same_trajectory() {
    fn run(seed: u64) -> Vec<u32> {
        let mut env =
            Warehouse::with_default_physics(WarehouseConfig::preset(Preset::Medium)).unwrap();
        let mut policy = RandomPolicy::new(seed);
        let mut observations = env.reset(seed).unwrap();
        let mut trace = Vec::new();
        for _ in 0..300 {
            let actions = policy.compute_actions(&observations);
            let result = env.step(&actions).unwrap();
            for obs in &result.observations {
                trace.extend(obs.to_vec().iter().map(|v| v.to_bits()));
            }
            trace.extend(result.rewards.iter().map(|r| r.to_bits()));
            observations = result.observations;
        }
        trace
    }

    assert_eq!(run(99), run(99));
    assert_ne!(run(99), run(100));
}

#[test]
fn reset_discards_previous_episode() {
    let mut env = teleport_warehouse(small_config(), 4);
    let first_draw = waiting(&env);
    let request = first_draw[0];
    let position = pickup_position(&env, request.pickup);
    env.physics_mut().teleport(0, position);
    env.step(&no_actions()).unwrap();

    let observations = env.reset(4).unwrap();
    assert_eq!(waiting(&env), first_draw);
    assert_eq!(env.elapsed_ticks(), 0);
    assert!(observations.iter().all(|obs| obs.is_available()));
    assert_eq!(
        env.world().agent_positions,
        env.world().layout.agent_initial_positions
    );
}

#[test]
fn deserialized_actions_respect_max_speed() {
    let mut env = Warehouse::new(small_config(), TeleportPhysics::default()).unwrap();
    env.reset(1).unwrap();
    let start = env.world().agent_positions[0];

    let mut actions = BTreeMap::new();
    actions.insert(0, toml::from_str::<Action>("vx = 50.0\nvy = -9.0").unwrap());
    env.step(&actions).unwrap();

    let limit = env.config().tick_duration() * env.config().max_speed;
    let moved = env.world().agent_positions[0] - start;
    assert!((moved.x - limit).abs() < 1e-5, "{moved:?}");
    assert!((moved.y + limit).abs() < 1e-5, "{moved:?}");
}

#[test]
fn malformed_actions_are_clamped() {
    let mut env = Warehouse::new(small_config(), TeleportPhysics::default()).unwrap();
    env.reset(1).unwrap();
    let start = env.world().agent_positions[0];

    let mut actions = BTreeMap::new();
    actions.insert(0, Action::from_slice(&[50.0, f32::NAN, 3.0]));
    env.step(&actions).unwrap();

    let dt = env.config().tick_duration();
    let moved = env.world().agent_positions[0] - start;
    assert!((moved.x - dt * env.config().max_speed).abs() < 1e-5, "{moved:?}");
    assert_eq!(moved.y, 0.0);
}
