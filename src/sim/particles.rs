//! Cosmetic particle effects
//!
//! Emitted on collection and impact. Never read by scoring or collision.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::state::{ColorTag, Particle};

/// Velocity kept per tick
const DRAG: f32 = 0.94;
/// Downward pull per tick
const PARTICLE_GRAVITY: f32 = 0.12;

/// Burst `count` particles outward from `origin`
pub fn emit(
    particles: &mut Vec<Particle>,
    rng: &mut Pcg32,
    origin: Vec2,
    count: usize,
    color: ColorTag,
    cap: usize,
) {
    if cap == 0 {
        return;
    }
    for _ in 0..count {
        // Drop the oldest when full
        if particles.len() >= cap {
            particles.remove(0);
        }
        let angle = rng.random::<f32>() * std::f32::consts::TAU;
        let speed = 1.5 + rng.random::<f32>() * 4.0;
        let life = 18.0 + rng.random::<f32>() * 24.0;
        particles.push(Particle {
            pos: origin,
            vel: Vec2::new(angle.cos(), angle.sin()) * speed,
            life,
            max_life: life,
            color,
            size: 2.0 + rng.random::<f32>() * 3.0,
        });
    }
}

/// Advance particles and drop dead ones
pub fn update(particles: &mut Vec<Particle>, dt: f32) {
    let drag = DRAG.powf(dt);
    for p in particles.iter_mut() {
        p.pos += p.vel * dt;
        p.vel *= drag;
        p.vel.y += PARTICLE_GRAVITY * dt;
        p.life -= dt;
        p.size *= 0.99;
    }
    particles.retain(|p| p.life > 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_emit_respects_cap() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut particles = Vec::new();
        emit(&mut particles, &mut rng, Vec2::ZERO, 40, ColorTag::Collectible, 25);
        assert_eq!(particles.len(), 25);

        emit(&mut particles, &mut rng, Vec2::ZERO, 10, ColorTag::Obstacle, 0);
        assert_eq!(particles.len(), 25);
    }

    #[test]
    fn test_particles_fade_and_die() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut particles = Vec::new();
        emit(&mut particles, &mut rng, Vec2::ZERO, 8, ColorTag::Player, 100);
        assert!(particles.iter().all(|p| p.alpha() == 1.0));

        update(&mut particles, 10.0);
        assert!(particles.iter().all(|p| p.alpha() < 1.0));

        for _ in 0..60 {
            update(&mut particles, 1.0);
        }
        assert!(particles.is_empty());
    }
}
