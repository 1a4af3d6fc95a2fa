//! Collision detection and response
//!
//! Overlap predicates between bounding shapes, and the per-tick resolver that
//! turns player contacts into score, lost lives, or game over.

use glam::Vec2;

use super::particles;
use super::ruleset::{CollisionPredicate, Ruleset};
use super::state::{Body, CollectEffect, ColorTag, EndReason, GameEvent, Shape, WorldState};

/// Axis-aligned boxes overlap (touching edges do not count)
pub fn aabb_overlap(a_pos: Vec2, a_half: Vec2, b_pos: Vec2, b_half: Vec2) -> bool {
    let d = (a_pos - b_pos).abs();
    d.x < a_half.x + b_half.x && d.y < a_half.y + b_half.y
}

pub fn circle_overlap(a_pos: Vec2, a_radius: f32, b_pos: Vec2, b_radius: f32) -> bool {
    let r = a_radius + b_radius;
    a_pos.distance_squared(b_pos) < r * r
}

/// Circle against box, via the closest point on the box
pub fn circle_aabb_overlap(c_pos: Vec2, radius: f32, b_pos: Vec2, b_half: Vec2) -> bool {
    let closest = c_pos.clamp(b_pos - b_half, b_pos + b_half);
    c_pos.distance_squared(closest) < radius * radius
}

/// Overlap test between two bodies, each hitbox scaled by `scale`
pub fn overlaps(predicate: CollisionPredicate, a: &Body, b: &Body, scale: f32) -> bool {
    let sa = a.shape.scaled(scale);
    let sb = b.shape.scaled(scale);
    match predicate {
        CollisionPredicate::Aabb => {
            aabb_overlap(a.pos, sa.half_extents(), b.pos, sb.half_extents())
        }
        CollisionPredicate::Circle => {
            circle_overlap(a.pos, sa.bounding_radius(), b.pos, sb.bounding_radius())
        }
        CollisionPredicate::Exact => match (sa, sb) {
            (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
                circle_overlap(a.pos, ra, b.pos, rb)
            }
            (Shape::Circle { radius }, Shape::Box { half }) => {
                circle_aabb_overlap(a.pos, radius, b.pos, half)
            }
            (Shape::Box { half }, Shape::Circle { radius }) => {
                circle_aabb_overlap(b.pos, radius, a.pos, half)
            }
            (Shape::Box { half: ha }, Shape::Box { half: hb }) => {
                aabb_overlap(a.pos, ha, b.pos, hb)
            }
        },
    }
}

/// Register a lethal contact. Returns true if it ended the game.
fn lethal_hit(world: &mut WorldState, rules: &Ruleset, id: Option<u32>, at: Vec2) -> bool {
    world.obstacles_hit += 1;
    world.combo = 0;
    particles::emit(
        &mut world.particles,
        &mut world.rng,
        at,
        14,
        ColorTag::Obstacle,
        rules.max_particles,
    );

    let lives_left = world.player.lives.saturating_sub(1);
    world.player.lives = lives_left;
    world.events.push(GameEvent::ObstacleHit { id, lives_left });
    if lives_left == 0 {
        world.end(EndReason::Collision);
        return true;
    }
    world.player.invulnerable_ticks = rules.invulnerability_ticks;
    false
}

/// Resolve every player contact for this tick
pub fn resolve_collisions(world: &mut WorldState, rules: &Ruleset) {
    if world.game_over {
        return;
    }

    // Floor and ceiling
    if rules.lethal_bounds
        && !world.player.is_invulnerable()
        && (world.player.on_ground || world.player.on_ceiling)
    {
        let at = world.player.body.pos;
        if lethal_hit(world, rules, None, at) {
            return;
        }
    }

    resolve_obstacles(world, rules);
    if world.game_over {
        return;
    }
    resolve_collectibles(world, rules);
}

fn resolve_obstacles(world: &mut WorldState, rules: &Ruleset) {
    let player = world.player.body;
    let touching: Vec<usize> = world
        .obstacles
        .iter()
        .enumerate()
        .filter(|(_, o)| overlaps(rules.collision, &player, &o.body, rules.hitbox_scale))
        .map(|(i, _)| i)
        .collect();

    let mut removed = Vec::new();
    for i in touching {
        let (id, pos, color, passed) = {
            let o = &world.obstacles[i];
            (o.id, o.body.pos, o.color, o.passed)
        };

        // Matching color lets the player through
        if rules.matching
            && let Some(required) = color
            && required == world.player.color
        {
            if !passed {
                world.obstacles[i].passed = true;
                world.award(rules.gate_points);
                world.events.push(GameEvent::GatePassed {
                    id,
                    points: rules.gate_points,
                });
            }
            continue;
        }

        if world.player.is_invulnerable() {
            continue;
        }
        if lethal_hit(world, rules, Some(id), pos) {
            // First lethal contact decides the outcome
            return;
        }
        removed.push(id);
    }

    if !removed.is_empty() {
        world.obstacles.retain(|o| !removed.contains(&o.id));
    }
}

fn resolve_collectibles(world: &mut WorldState, rules: &Ruleset) {
    let player = world.player.body;
    let touching: Vec<usize> = world
        .collectibles
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            !c.is_collected() && overlaps(rules.collision, &player, &c.body, rules.hitbox_scale)
        })
        .map(|(i, _)| i)
        .collect();

    for i in touching {
        let coin = &mut world.collectibles[i];
        if !coin.collect() {
            continue;
        }
        let (id, value, tier_hint, effect, pos) =
            (coin.id, coin.value, coin.tier_hint, coin.effect, coin.body.pos);

        let in_window =
            world.combo > 0 && world.elapsed_ms - world.last_collect_ms <= rules.combo_window_ms();
        world.combo = if in_window { world.combo + 1 } else { 1 };
        world.last_collect_ms = world.elapsed_ms;

        let points = (value as f32 * world.combo_multiplier()).round() as u64;
        world.award(points);
        world.objects_collected += 1;
        world.events.push(GameEvent::Collected { id, points });

        let tag = if tier_hint.is_some() {
            ColorTag::Rare
        } else {
            ColorTag::Collectible
        };
        particles::emit(
            &mut world.particles,
            &mut world.rng,
            pos,
            8,
            tag,
            rules.max_particles,
        );

        match effect {
            Some(CollectEffect::TimeBonus { ms }) => {
                if let Some(limit) = world.time_limit_ms.as_mut() {
                    *limit += ms;
                }
            }
            None => {}
        }
    }

    // Collected entities leave the world in the same tick
    world.collectibles.retain(|c| !c.is_collected());
}
