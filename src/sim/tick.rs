//! World tick
//!
//! Advances the simulation by one host frame. Everything that mutates the
//! world during play goes through here.

use super::collision::resolve_collisions;
use super::physics::{apply_intent, integrate_body, integrate_player};
use super::ruleset::{Ruleset, Travel};
use super::spawn::run_spawner;
use super::state::{EndReason, WorldState};
use super::particles;
use crate::consts::*;
use crate::input::{Intent, IntentQueue};

/// Advance the world by `dt_scale` nominal ticks.
///
/// Does nothing once the game is over, apart from discarding queued intents.
pub fn tick(world: &mut WorldState, rules: &Ruleset, intents: &mut IntentQueue, dt_scale: f32) {
    if world.game_over {
        intents.clear();
        return;
    }

    let dt = if dt_scale.is_finite() && dt_scale >= 0.0 {
        dt_scale.min(MAX_DT_SCALE)
    } else {
        log::warn!("Rejected tick scale {dt_scale}, using 1.0");
        1.0
    };

    world.events.clear();
    world.tick_count += 1;
    world.elapsed_ms += (dt * NOMINAL_FRAME_MS) as f64;

    for intent in intents.drain() {
        match intent {
            Intent::Exit => world.end(EndReason::Exit),
            other => apply_intent(&mut world.player, rules, other),
        }
    }
    if world.game_over {
        return;
    }

    integrate_player(&mut world.player, rules, dt);
    for o in &mut world.obstacles {
        integrate_body(&mut o.body, o.motion, dt);
    }
    for c in &mut world.collectibles {
        integrate_body(&mut c.body, c.motion, dt);
    }

    if !world.is_finite() {
        log::error!(
            "Non-finite world state at tick {}, ending session",
            world.tick_count
        );
        world.sanitize(rules);
        world.end(EndReason::Fault);
        return;
    }

    // Timers
    if world.player.invulnerable_ticks > 0.0 {
        world.player.invulnerable_ticks = (world.player.invulnerable_ticks - dt).max(0.0);
    }
    if world.combo > 0 && world.elapsed_ms - world.last_collect_ms > rules.combo_window_ms() {
        world.combo = 0;
    }

    // Survival points
    if rules.distance_points_per_tick > 0.0 {
        world.distance_carry += rules.distance_points_per_tick * dt;
        let whole = world.distance_carry.floor();
        if whole >= 1.0 {
            world.distance_carry -= whole;
            world.award(whole as u64);
        }
    }

    if let Some(limit) = world.time_limit_ms
        && world.elapsed_ms >= limit
    {
        world.end(EndReason::TimeUp);
        return;
    }

    run_spawner(world, rules);
    resolve_collisions(world, rules);
    despawn_offscreen(world, rules);
    particles::update(&mut world.particles, dt);
}

/// True once an entity can no longer reach the player
fn is_gone(pos: glam::Vec2, rules: &Ruleset) -> bool {
    if let Travel::Inward { center, .. } = rules.travel {
        return pos.distance(center) <= ORBIT_CORE_RADIUS;
    }
    pos.x < -DESPAWN_MARGIN
        || pos.y < -DESPAWN_MARGIN
        || pos.x > rules.field.x + DESPAWN_MARGIN
        || pos.y > rules.field.y + DESPAWN_MARGIN
}

/// Drop entities that left the playfield
pub fn despawn_offscreen(world: &mut WorldState, rules: &Ruleset) {
    world.obstacles.retain(|o| !is_gone(o.body.pos, rules));
    world.collectibles.retain(|c| !is_gone(c.body.pos, rules));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Body, Collectible, GameEvent, Motion, Shape};
    use glam::Vec2;
    use proptest::prelude::*;

    fn run(world: &mut WorldState, rules: &Ruleset, ticks: usize) {
        let mut intents = IntentQueue::new();
        for _ in 0..ticks {
            tick(world, rules, &mut intents, 1.0);
        }
    }

    #[test]
    fn test_two_jumps_one_impulse() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(1, &rules);
        let mut intents = IntentQueue::new();
        intents.push(Intent::Jump);
        intents.push(Intent::Jump);
        tick(&mut world, &rules, &mut intents, 1.0);

        let crate::sim::ruleset::MovementModel::Jump {
            gravity,
            jump_force,
            ..
        } = rules.movement
        else {
            panic!("runner uses jump movement");
        };
        assert!(intents.is_empty());
        assert!((world.player.body.vel.y - (-jump_force + gravity)).abs() < 1e-4);
    }

    #[test]
    fn test_exit_intent_ends_session() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(1, &rules);
        let mut intents = IntentQueue::new();
        intents.push(Intent::Exit);
        tick(&mut world, &rules, &mut intents, 1.0);
        assert_eq!(world.end_reason, Some(EndReason::Exit));
    }

    #[test]
    fn test_world_frozen_after_game_over() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(3, &rules);
        run(&mut world, &rules, 200);
        world.end(EndReason::Collision);

        let score = world.score();
        let ticks = world.tick_count;
        let spawned = world.obstacles.len() + world.collectibles.len();
        let mut intents = IntentQueue::new();
        intents.push(Intent::Jump);
        for _ in 0..100 {
            tick(&mut world, &rules, &mut intents, 1.0);
        }
        assert_eq!(world.score(), score);
        assert_eq!(world.tick_count, ticks);
        assert_eq!(world.obstacles.len() + world.collectibles.len(), spawned);
        assert!(intents.is_empty());
    }

    #[test]
    fn test_collected_entity_removed_same_tick() {
        let rules = Ruleset::orbit();
        let mut world = WorldState::new(1, &rules);
        let id = world.next_entity_id();
        let at = world.player.body.pos + Vec2::new(30.0, 0.0);
        world.collectibles.push(Collectible::new(
            id,
            Body::new(at, Vec2::ZERO, Shape::circle(9.0)),
            Motion::Linear,
            15,
            None,
            None,
        ));
        let mut intents = IntentQueue::new();
        intents.push(Intent::SteerTo(at));
        for _ in 0..10 {
            tick(&mut world, &rules, &mut intents, 1.0);
            if world
                .events
                .iter()
                .any(|e| matches!(e, GameEvent::Collected { id: got, .. } if *got == id))
            {
                assert!(world.collectibles.iter().all(|c| c.id != id));
                return;
            }
        }
        panic!("collectible was never collected");
    }

    #[test]
    fn test_non_finite_dt_is_replaced() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(1, &rules);
        let mut intents = IntentQueue::new();
        tick(&mut world, &rules, &mut intents, f32::NAN);
        assert!(!world.game_over);
        assert!((world.elapsed_ms - NOMINAL_FRAME_MS as f64).abs() < 1e-3);
    }

    #[test]
    fn test_corrupted_state_faults() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(1, &rules);
        world.player.body.vel = Vec2::new(f32::INFINITY, 0.0);
        run(&mut world, &rules, 1);
        assert_eq!(world.end_reason, Some(EndReason::Fault));
        assert!(world.is_finite());
    }

    #[test]
    fn test_time_limit_ends_session() {
        let rules = Ruleset::catcher();
        let mut world = WorldState::new(1, &rules);
        world.time_limit_ms = Some(500.0);
        run(&mut world, &rules, 40);
        assert_eq!(world.end_reason, Some(EndReason::TimeUp));
    }

    #[test]
    fn test_distance_points_accrue() {
        let mut rules = Ruleset::runner();
        rules.lanes.clear();
        rules.distance_points_per_tick = 0.25;
        let mut world = WorldState::new(1, &rules);
        run(&mut world, &rules, 100);
        assert_eq!(world.score(), 25);
    }

    /// Two coins about one second apart, stepped at the given frame scale
    fn combo_after_second(dt: f32) -> (u32, u64) {
        let mut rules = Ruleset::runner();
        rules.lanes.clear();
        rules.distance_points_per_tick = 0.0;
        let mut world = WorldState::new(1, &rules);
        let mut intents = IntentQueue::new();
        let frames = (60.0 / dt).round() as usize;

        for coin in 0..2 {
            let id = world.next_entity_id();
            world.collectibles.push(Collectible::new(
                id,
                Body::new(world.player.body.pos, Vec2::ZERO, Shape::circle(40.0)),
                Motion::Linear,
                10,
                None,
                None,
            ));
            tick(&mut world, &rules, &mut intents, dt);
            if coin == 0 {
                for _ in 1..frames {
                    tick(&mut world, &rules, &mut intents, dt);
                }
            }
        }
        (world.combo, world.score())
    }

    #[test]
    fn test_combo_window_independent_of_frame_rate() {
        let at_60hz = combo_after_second(1.0);
        let at_144hz = combo_after_second(60.0 / 144.0);
        assert_eq!(at_60hz, (2, 21));
        assert_eq!(at_144hz, at_60hz);
    }

    #[test]
    fn test_offscreen_entities_despawn() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(1, &rules);
        let id = world.next_entity_id();
        world.collectibles.push(Collectible::new(
            id,
            Body::new(Vec2::new(-DESPAWN_MARGIN - 1.0, 100.0), Vec2::ZERO, Shape::circle(5.0)),
            Motion::Linear,
            10,
            None,
            None,
        ));
        despawn_offscreen(&mut world, &rules);
        assert!(world.collectibles.is_empty());
    }

    proptest! {
        #[test]
        fn prop_score_never_decreases(seed in any::<u64>(), jumps in prop::collection::vec(any::<bool>(), 1..400)) {
            let rules = Ruleset::runner();
            let mut world = WorldState::new(seed, &rules);
            let mut intents = IntentQueue::new();
            let mut last = 0;
            for jump in jumps {
                if jump {
                    intents.push(Intent::Jump);
                }
                tick(&mut world, &rules, &mut intents, 1.0);
                prop_assert!(world.score() >= last);
                last = world.score();
            }
        }
    }
}
