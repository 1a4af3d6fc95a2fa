//! World state and entity model
//!
//! One `WorldState` per session. Only the world tick mutates it; the renderer
//! reads it through a snapshot.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::ruleset::Ruleset;

/// Bounding shape, centered on the body position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Box { half: Vec2 },
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        Shape::Circle { radius }
    }

    pub fn rect(half_w: f32, half_h: f32) -> Self {
        Shape::Box {
            half: Vec2::new(half_w, half_h),
        }
    }

    /// Half extents of the axis-aligned bounding box
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            Shape::Circle { radius } => Vec2::splat(radius),
            Shape::Box { half } => half,
        }
    }

    /// Radius of the bounding circle
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Shape::Circle { radius } => radius,
            Shape::Box { half } => half.length(),
        }
    }

    /// Same shape scaled about its center (hitbox forgiveness)
    pub fn scaled(&self, factor: f32) -> Self {
        match *self {
            Shape::Circle { radius } => Shape::Circle {
                radius: radius * factor,
            },
            Shape::Box { half } => Shape::Box {
                half: half * factor,
            },
        }
    }
}

/// Fields every entity carries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    pub shape: Shape,
}

impl Body {
    pub fn new(pos: Vec2, vel: Vec2, shape: Shape) -> Self {
        Self { pos, vel, shape }
    }

    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite()
    }
}

/// Entity tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Obstacle,
    Collectible,
    Particle,
}

/// Which wall the player is clinging to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    Left,
    Right,
}

/// The player avatar
#[derive(Debug, Clone)]
pub struct Player {
    pub body: Body,
    pub on_ground: bool,
    /// Touching the ceiling (flight variants)
    pub on_ceiling: bool,
    /// Clinging to a wall (wall-jump variants)
    pub wall: Option<WallSide>,
    /// Horizontal direction of the next jump (wall-jump variants)
    pub facing: f32,
    /// Lift held (flight variants)
    pub lifting: bool,
    /// Pointer target (steering variants)
    pub steer_target: Option<Vec2>,
    /// Ticks of post-hit invulnerability left
    pub invulnerable_ticks: f32,
    /// Palette index for matching-constraint variants
    pub color: u8,
    pub lives: u8,
}

impl Player {
    pub fn new(rules: &Ruleset) -> Self {
        let ground = rules.movement.ground_y();
        Self {
            body: Body::new(rules.player_start, Vec2::ZERO, rules.player_shape),
            on_ground: ground.is_some_and(|g| rules.player_start.y >= g),
            on_ceiling: false,
            wall: None,
            facing: 1.0,
            lifting: false,
            steer_target: None,
            invulnerable_ticks: 0.0,
            color: 0,
            lives: rules.lives.max(1),
        }
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_ticks > 0.0
    }
}

/// Obstacle type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleKind {
    Crate,
    Spike,
    Bird,
    Pillar,
    Gate,
    Bomb,
    Rock,
}

/// How a non-player entity moves each tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Constant velocity
    Linear,
    /// Constant radial and angular speed around a center (inward is positive)
    Radial {
        center: Vec2,
        radial_speed: f32,
        angular_speed: f32,
    },
}

/// Lethal entity
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: u32,
    pub kind: ObstacleKind,
    pub body: Body,
    pub motion: Motion,
    pub speed: f32,
    /// Required player color (matching variants)
    pub color: Option<u8>,
    /// Matching gate already scored
    pub passed: bool,
}

/// Extra effect applied when a collectible is picked up
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollectEffect {
    /// Extend the session time limit
    TimeBonus { ms: f64 },
}

/// Scoring entity
#[derive(Debug, Clone)]
pub struct Collectible {
    pub id: u32,
    pub body: Body,
    pub motion: Motion,
    pub value: u32,
    /// Rarity hint for rendering (higher = rarer)
    pub tier_hint: Option<u8>,
    pub effect: Option<CollectEffect>,
    collected: bool,
}

impl Collectible {
    pub fn new(
        id: u32,
        body: Body,
        motion: Motion,
        value: u32,
        tier_hint: Option<u8>,
        effect: Option<CollectEffect>,
    ) -> Self {
        Self {
            id,
            body,
            motion,
            value,
            tier_hint,
            effect,
            collected: false,
        }
    }

    /// Mark collected. Returns false if it already was.
    pub fn collect(&mut self) -> bool {
        if self.collected {
            return false;
        }
        self.collected = true;
        true
    }

    pub fn is_collected(&self) -> bool {
        self.collected
    }
}

/// Particle color tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorTag {
    Player,
    Obstacle,
    Collectible,
    Rare,
    /// Matching-palette color
    Palette(u8),
}

/// Cosmetic particle (never affects score)
#[derive(Debug, Clone)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Ticks left
    pub life: f32,
    pub max_life: f32,
    pub color: ColorTag,
    pub size: f32,
}

impl Particle {
    /// Remaining life fraction (drives fade)
    pub fn alpha(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life / self.max_life).clamp(0.0, 1.0)
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// Lethal contact with no lives left
    Collision,
    /// Player asked to stop
    Exit,
    /// Timed variant ran out of time
    TimeUp,
    /// Simulation state went non-finite
    Fault,
}

/// Things that happened during the last tick
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Collected { id: u32, points: u64 },
    GatePassed { id: u32, points: u64 },
    ObstacleHit { id: Option<u32>, lives_left: u8 },
    GameOver { reason: EndReason },
}

/// Complete simulation state for one session
#[derive(Debug, Clone)]
pub struct WorldState {
    pub seed: u64,
    pub rng: Pcg32,
    pub player: Player,
    pub obstacles: Vec<Obstacle>,
    pub collectibles: Vec<Collectible>,
    pub particles: Vec<Particle>,
    /// Monotonic score
    score: u64,
    /// Fractional survival points not yet awarded
    pub distance_carry: f32,
    pub combo: u32,
    /// Sim time of the most recent collect
    pub last_collect_ms: f64,
    /// Ticks processed
    pub tick_count: u64,
    /// Simulated time (sum of scaled ticks)
    pub elapsed_ms: f64,
    /// Per spawn lane, sim time of its last spawn
    pub last_spawn_ms: Vec<f64>,
    pub time_limit_ms: Option<f64>,
    pub objects_collected: u32,
    pub obstacles_hit: u32,
    pub game_over: bool,
    pub end_reason: Option<EndReason>,
    /// Events from the most recent tick
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl WorldState {
    /// Fresh world: player reset, no obstacles or collectibles
    pub fn new(seed: u64, rules: &Ruleset) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            player: Player::new(rules),
            obstacles: Vec::new(),
            collectibles: Vec::new(),
            particles: Vec::new(),
            score: 0,
            distance_carry: 0.0,
            combo: 0,
            last_collect_ms: 0.0,
            tick_count: 0,
            elapsed_ms: 0.0,
            last_spawn_ms: vec![0.0; rules.lanes.len()],
            time_limit_ms: rules.time_limit_ms,
            objects_collected: 0,
            obstacles_hit: 0,
            game_over: false,
            end_reason: None,
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    /// Add points. Ignored once the game is over.
    pub fn award(&mut self, points: u64) {
        if !self.game_over {
            self.score = self.score.saturating_add(points);
        }
    }

    /// Score multiplier for the current combo (1.1x at combo 2, up to 3.0x)
    pub fn combo_multiplier(&self) -> f32 {
        (1.0 + self.combo.saturating_sub(1) as f32 * 0.1).min(3.0)
    }

    /// Set the game-over flag. The first reason wins.
    pub fn end(&mut self, reason: EndReason) {
        if self.game_over {
            return;
        }
        self.game_over = true;
        self.end_reason = Some(reason);
        self.events.push(GameEvent::GameOver { reason });
    }

    /// Remaining time on timed variants
    pub fn time_left_ms(&self) -> Option<f64> {
        self.time_limit_ms
            .map(|limit| (limit - self.elapsed_ms).max(0.0))
    }

    /// True if every body holds finite numbers
    pub fn is_finite(&self) -> bool {
        self.player.body.is_finite()
            && self.obstacles.iter().all(|o| o.body.is_finite())
            && self.collectibles.iter().all(|c| c.body.is_finite())
    }

    /// Clamp corrupted state back to something paintable
    pub fn sanitize(&mut self, rules: &Ruleset) {
        if !self.player.body.is_finite() {
            self.player.body.pos = rules.player_start;
            self.player.body.vel = Vec2::ZERO;
        }
        self.obstacles.retain(|o| o.body.is_finite());
        self.collectibles.retain(|c| c.body.is_finite());
        self.particles
            .retain(|p| p.pos.is_finite() && p.vel.is_finite());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_world_is_empty() {
        let rules = Ruleset::runner();
        let world = WorldState::new(7, &rules);
        assert_eq!(world.score(), 0);
        assert!(world.obstacles.is_empty());
        assert!(world.collectibles.is_empty());
        assert!(world.player.on_ground);
        assert_eq!(world.last_spawn_ms.len(), rules.lanes.len());
    }

    #[test]
    fn test_collect_is_write_once() {
        let body = Body::new(Vec2::ZERO, Vec2::ZERO, Shape::circle(5.0));
        let mut coin = Collectible::new(1, body, Motion::Linear, 10, None, None);
        assert!(coin.collect());
        assert!(!coin.collect());
        assert!(coin.is_collected());
    }

    #[test]
    fn test_end_keeps_first_reason() {
        let mut world = WorldState::new(1, &Ruleset::runner());
        world.end(EndReason::Collision);
        world.end(EndReason::Exit);
        assert_eq!(world.end_reason, Some(EndReason::Collision));
        assert_eq!(world.events.len(), 1);

        world.award(100);
        assert_eq!(world.score(), 0);
    }

    #[test]
    fn test_combo_multiplier_caps() {
        let mut world = WorldState::new(1, &Ruleset::runner());
        assert_eq!(world.combo_multiplier(), 1.0);
        world.combo = 2;
        assert!((world.combo_multiplier() - 1.1).abs() < 1e-6);
        world.combo = 100;
        assert_eq!(world.combo_multiplier(), 3.0);
    }

    #[test]
    fn test_sanitize_resets_non_finite_player() {
        let rules = Ruleset::runner();
        let mut world = WorldState::new(1, &rules);
        world.player.body.pos = Vec2::new(f32::NAN, 10.0);
        assert!(!world.is_finite());
        world.sanitize(&rules);
        assert!(world.is_finite());
        assert_eq!(world.player.body.pos, rules.player_start);
    }
}
