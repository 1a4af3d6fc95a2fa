//! Spawner
//!
//! Each lane keeps its own last-spawn time and spawns one entity when its
//! interval has elapsed. Intervals shrink as score and time grow.

use glam::Vec2;
use rand::Rng;

use super::ruleset::{Band, Ruleset, SpawnKind, SpawnLane, SpawnWeight, Travel};
use super::state::{Body, Collectible, Motion, Obstacle, Shape, WorldState};

/// Spawn interval for a lane at the given score and sim time.
///
/// Never grows with score or time, and never drops below the lane minimum.
pub fn spawn_interval_ms(lane: &SpawnLane, score: u64, elapsed_ms: f64) -> f64 {
    let ramp = 1.0 + score as f64 * lane.score_ramp + (elapsed_ms / 1000.0) * lane.time_ramp;
    (lane.base_interval_ms / ramp.max(1.0)).max(lane.min_interval_ms)
}

/// Entity speed at the current score
pub fn travel_speed(rules: &Ruleset, score: u64, speed_scale: f32) -> f32 {
    let ramp = (1.0 + score as f32 * rules.speed_ramp).min(rules.max_speed_factor.max(1.0));
    rules.base_speed * speed_scale * ramp
}

/// Weighted draw from a spawn table. Lethal kinds are skipped when not allowed.
pub fn draw_kind<'a, R: Rng>(
    table: &'a [SpawnWeight],
    rng: &mut R,
    allow_lethal: bool,
) -> Option<&'a SpawnKind> {
    let eligible = || {
        table
            .iter()
            .filter(move |w| w.weight > 0 && (allow_lethal || !w.kind.is_lethal()))
    };
    let total: u32 = eligible().map(|w| w.weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.random_range(0..total);
    for entry in eligible() {
        if roll < entry.weight {
            return Some(&entry.kind);
        }
        roll -= entry.weight;
    }
    None
}

/// Run every lane once
pub fn run_spawner(world: &mut WorldState, rules: &Ruleset) {
    if world.game_over {
        return;
    }
    let now = world.elapsed_ms;
    for (index, lane) in rules.lanes.iter().enumerate() {
        let last = world.last_spawn_ms.get(index).copied().unwrap_or(0.0);
        if now - last < spawn_interval_ms(lane, world.score(), now) {
            continue;
        }
        if let Some(slot) = world.last_spawn_ms.get_mut(index) {
            *slot = now;
        }

        // No fresh lethal spawns during post-hit invulnerability
        let allow_lethal = !world.player.is_invulnerable();
        let Some(kind) = draw_kind(&lane.table, &mut world.rng, allow_lethal) else {
            continue;
        };
        log::trace!("Lane '{}' spawning {:?} at {:.0} ms", lane.name, kind, now);
        spawn(world, rules, kind);
    }
}

/// Entry position and velocity for a new entity
fn entry_point(
    world: &mut WorldState,
    rules: &Ruleset,
    shape: Shape,
    band: Band,
    speed: f32,
) -> (Vec2, Vec2, Motion) {
    let half = shape.half_extents();
    let across = if band.max > band.min {
        world.rng.random_range(band.min..=band.max)
    } else {
        band.min
    };
    match rules.travel {
        Travel::Left => (
            Vec2::new(rules.field.x + half.x, across),
            Vec2::new(-speed, 0.0),
            Motion::Linear,
        ),
        Travel::Down => (
            Vec2::new(across, -half.y),
            Vec2::new(0.0, speed),
            Motion::Linear,
        ),
        Travel::Inward { center, radius } => {
            let theta = world.rng.random::<f32>() * std::f32::consts::TAU;
            let pos = center + crate::polar_to_cartesian(radius, theta);
            let motion = Motion::Radial {
                center,
                radial_speed: speed,
                angular_speed: across,
            };
            (pos, (center - pos).normalize_or_zero() * speed, motion)
        }
    }
}

/// Create one entity from a template
pub fn spawn(world: &mut WorldState, rules: &Ruleset, kind: &SpawnKind) {
    match *kind {
        SpawnKind::Obstacle {
            kind,
            shape,
            band,
            speed_scale,
            colored,
        } => {
            let speed = travel_speed(rules, world.score(), speed_scale);
            let (pos, vel, motion) = entry_point(world, rules, shape, band, speed);
            let color = (colored && rules.matching)
                .then(|| world.rng.random_range(0..rules.palette_size.max(1)));
            let id = world.next_entity_id();
            world.obstacles.push(Obstacle {
                id,
                kind,
                body: Body::new(pos, vel, shape),
                motion,
                speed,
                color,
                passed: false,
            });
        }
        SpawnKind::Collectible {
            value,
            tier_hint,
            shape,
            band,
            effect,
        } => {
            let speed = travel_speed(rules, world.score(), 1.0);
            let (pos, vel, motion) = entry_point(world, rules, shape, band, speed);
            let id = world.next_entity_id();
            world.collectibles.push(Collectible::new(
                id,
                Body::new(pos, vel, shape),
                motion,
                value,
                tier_hint,
                effect,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ruleset::Ruleset;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_interval_shrinks_with_score() {
        let rules = Ruleset::runner();
        let lane = &rules.lanes[0];
        let at_zero = spawn_interval_ms(lane, 0, 0.0);
        let at_thousand = spawn_interval_ms(lane, 1000, 0.0);
        assert!(at_thousand < at_zero);
        assert!(spawn_interval_ms(lane, 10_000_000, 1e9) >= lane.min_interval_ms);
    }

    #[test]
    fn test_weighted_draw_distribution() {
        let rules = Ruleset::runner();
        let table = &rules.lanes[0].table;
        let mut rng = Pcg32::seed_from_u64(11);
        let draws = 10_000;
        let lethal = (0..draws)
            .filter(|_| draw_kind(table, &mut rng, true).unwrap().is_lethal())
            .count();
        // 60% obstacles in the runner table
        let share = lethal as f64 / draws as f64;
        assert!((share - 0.6).abs() < 0.03, "lethal share {share}");
    }

    #[test]
    fn test_no_lethal_draw_while_invulnerable() {
        let rules = Ruleset::catcher();
        let table = &rules.lanes[0].table;
        let mut rng = Pcg32::seed_from_u64(5);
        for _ in 0..500 {
            assert!(!draw_kind(table, &mut rng, false).unwrap().is_lethal());
        }
        let only_lethal = vec![table.iter().find(|w| w.kind.is_lethal()).unwrap().clone()];
        assert!(draw_kind(&only_lethal, &mut rng, false).is_none());
    }

    #[test]
    fn test_spawner_waits_for_interval() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(1, &rules);
        let interval = spawn_interval_ms(&rules.lanes[0], 0, 0.0);

        world.elapsed_ms = interval * 0.5;
        run_spawner(&mut world, &rules);
        assert_eq!(world.obstacles.len() + world.collectibles.len(), 0);

        world.elapsed_ms = interval + 1.0;
        run_spawner(&mut world, &rules);
        assert_eq!(world.obstacles.len() + world.collectibles.len(), 1);
        assert_eq!(world.last_spawn_ms[0], interval + 1.0);

        // Same instant again: nothing new
        run_spawner(&mut world, &rules);
        assert_eq!(world.obstacles.len() + world.collectibles.len(), 1);
    }

    #[test]
    fn test_spawns_at_entry_edge() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(2, &rules);
        for kind in rules.lanes[0].table.iter().map(|w| &w.kind) {
            spawn(&mut world, &rules, kind);
        }
        for o in &world.obstacles {
            assert!(o.body.pos.x > rules.field.x);
            assert!(o.body.vel.x < 0.0);
        }
        for c in &world.collectibles {
            assert!(c.body.pos.x > rules.field.x);
        }

        let rules = Ruleset::catcher();
        let mut world = WorldState::new(2, &rules);
        spawn(&mut world, &rules, &rules.lanes[0].table[0].kind);
        let coin = &world.collectibles[0];
        assert!(coin.body.pos.y < 0.0);
        assert!(coin.body.vel.y > 0.0);
    }

    #[test]
    fn test_inward_spawns_on_ring() {
        let rules = Ruleset::orbit();
        let Travel::Inward { center, radius } = rules.travel else {
            panic!("orbit travels inward");
        };
        let mut world = WorldState::new(9, &rules);
        spawn(&mut world, &rules, &rules.lanes[0].table[0].kind);
        let rock = &world.obstacles[0];
        assert!(((rock.body.pos - center).length() - radius).abs() < 1e-2);
        assert!(matches!(rock.motion, Motion::Radial { .. }));
    }

    #[test]
    fn test_colored_obstacles_get_palette_color() {
        let rules = Ruleset::color_switch();
        let mut world = WorldState::new(4, &rules);
        for _ in 0..20 {
            spawn(&mut world, &rules, &rules.lanes[0].table[0].kind);
        }
        assert!(world
            .obstacles
            .iter()
            .all(|o| o.color.is_some_and(|c| c < rules.palette_size)));
    }

    proptest! {
        #[test]
        fn prop_interval_monotonic(s1 in 0u64..100_000, s2 in 0u64..100_000, t1 in 0.0f64..600_000.0, t2 in 0.0f64..600_000.0) {
            let rules = Ruleset::runner();
            let lane = &rules.lanes[0];
            let (lo_s, hi_s) = if s1 <= s2 { (s1, s2) } else { (s2, s1) };
            let (lo_t, hi_t) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            prop_assert!(spawn_interval_ms(lane, hi_s, hi_t) <= spawn_interval_ms(lane, lo_s, lo_t));
        }
    }
}
