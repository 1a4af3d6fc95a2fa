//! Physics integrator
//!
//! Semi-implicit Euler on per-tick constants. `dt` is the tick scale: 1.0 for a
//! nominal 60 Hz frame, larger for slow frames.

use glam::Vec2;

use super::ruleset::{MovementModel, Ruleset};
use super::state::{Body, Motion, Player, WallSide};
use crate::input::Intent;
use crate::{cartesian_to_polar, polar_to_cartesian};

/// Apply one movement intent to the player
pub fn apply_intent(player: &mut Player, rules: &Ruleset, intent: Intent) {
    match (intent, rules.movement) {
        (Intent::Jump, MovementModel::Jump { jump_force, .. }) => {
            if player.on_ground {
                player.body.vel.y = -jump_force;
                player.on_ground = false;
            }
        }
        (
            Intent::Jump,
            MovementModel::WallJump {
                jump_force,
                wall_kick,
                ..
            },
        ) => {
            if player.on_ground || player.wall.is_some() {
                player.body.vel.y = -jump_force;
                player.body.vel.x = player.facing * wall_kick;
                player.on_ground = false;
                player.wall = None;
            }
        }
        (Intent::LiftStart, MovementModel::Flight { .. }) => player.lifting = true,
        (Intent::LiftStop, MovementModel::Flight { .. }) => player.lifting = false,
        (Intent::SteerTo(target), MovementModel::Steer { .. }) => {
            player.steer_target = Some(target);
        }
        (Intent::Nudge(delta), MovementModel::Steer { .. }) => {
            let from = player.steer_target.unwrap_or(player.body.pos);
            player.steer_target = Some(from + delta);
        }
        (Intent::CycleColor, _) => {
            player.color = (player.color + 1) % rules.palette_size.max(1);
        }
        // Intent does not apply to this movement model
        _ => {}
    }
}

/// Advance the player one tick
pub fn integrate_player(player: &mut Player, rules: &Ruleset, dt: f32) {
    let half = player.body.shape.half_extents();
    match rules.movement {
        MovementModel::Jump {
            gravity, ground_y, ..
        } => {
            player.body.vel.y += gravity * dt;
            player.body.pos += player.body.vel * dt;
            land(player, ground_y);
        }

        MovementModel::WallJump {
            gravity,
            wall_slide,
            ground_y,
            ..
        } => {
            player.body.vel.y += gravity * dt;
            if player.wall.is_some() && player.body.vel.y > wall_slide {
                player.body.vel.y = wall_slide;
            }
            player.body.pos += player.body.vel * dt;

            let left = half.x;
            let right = rules.field.x - half.x;
            if player.body.pos.x <= left {
                player.body.pos.x = left;
                touch_wall(player, WallSide::Left);
            } else if player.body.pos.x >= right {
                player.body.pos.x = right;
                touch_wall(player, WallSide::Right);
            }

            land(player, ground_y);
            if player.on_ground {
                player.wall = None;
                player.body.vel.x = 0.0;
            }
        }

        MovementModel::Flight {
            gravity,
            lift,
            max_rise,
            max_fall,
            ground_y,
            ceiling_y,
        } => {
            if player.lifting {
                player.body.vel.y -= lift * dt;
            } else {
                player.body.vel.y += gravity * dt;
            }
            player.body.vel.y = player.body.vel.y.clamp(-max_rise, max_fall);
            player.body.pos += player.body.vel * dt;

            player.on_ceiling = player.body.pos.y <= ceiling_y;
            if player.on_ceiling {
                player.body.pos.y = ceiling_y;
                player.body.vel.y = 0.0;
            }
            land(player, ground_y);
        }

        MovementModel::Steer { speed, free } => {
            let prev = player.body.pos;
            if let Some(target) = player.steer_target {
                let mut delta = target - player.body.pos;
                if !free {
                    delta.y = 0.0;
                }
                let step = delta.clamp_length_max(speed * dt);
                player.body.pos += step;
            }
            let min = half;
            let max = rules.field - half;
            player.body.pos = player.body.pos.clamp(min, max.max(min));
            player.body.vel = if dt > 0.0 {
                (player.body.pos - prev) / dt
            } else {
                Vec2::ZERO
            };
        }
    }
}

/// Clamp to the ground and zero vertical speed on contact
fn land(player: &mut Player, ground_y: f32) {
    if player.body.pos.y >= ground_y {
        player.body.pos.y = ground_y;
        player.body.vel.y = 0.0;
        player.on_ground = true;
    } else {
        player.on_ground = false;
    }
}

fn touch_wall(player: &mut Player, side: WallSide) {
    player.body.vel.x = 0.0;
    if !player.on_ground {
        player.wall = Some(side);
    }
    // Next jump kicks away from the wall
    player.facing = match side {
        WallSide::Left => 1.0,
        WallSide::Right => -1.0,
    };
}

/// Advance a non-player body one tick (no gravity)
pub fn integrate_body(body: &mut Body, motion: Motion, dt: f32) {
    match motion {
        Motion::Linear => body.pos += body.vel * dt,
        Motion::Radial {
            center,
            radial_speed,
            angular_speed,
        } => {
            let (r, theta) = cartesian_to_polar(body.pos - center);
            let r = (r - radial_speed * dt).max(0.0);
            let next = center + polar_to_cartesian(r, theta + angular_speed * dt);
            if dt > 0.0 {
                body.vel = (next - body.pos) / dt;
            }
            body.pos = next;
        }
    }
}
