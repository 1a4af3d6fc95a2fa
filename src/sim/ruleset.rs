//! Rulesets: the variant table every mini-game is built from
//!
//! A ruleset picks a movement model, a collision predicate and spawn weight
//! tables. All speeds and accelerations are per nominal 60 Hz tick.

use glam::Vec2;

use super::state::{CollectEffect, ObstacleKind, Shape};
use crate::config::Difficulty;
use crate::consts::{FIELD_HEIGHT, FIELD_WIDTH, MAX_PARTICLES, NOMINAL_FRAME_MS};

/// How the player moves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementModel {
    /// Gravity plus an instantaneous jump impulse while grounded
    Jump {
        gravity: f32,
        jump_force: f32,
        /// Resting y of the player's center
        ground_y: f32,
    },
    /// Jump that also works while clinging to a side wall
    WallJump {
        gravity: f32,
        jump_force: f32,
        /// Horizontal speed of every jump
        wall_kick: f32,
        /// Max fall speed while clinging
        wall_slide: f32,
        ground_y: f32,
    },
    /// Continuous lift while held, gravity otherwise
    Flight {
        gravity: f32,
        lift: f32,
        max_rise: f32,
        max_fall: f32,
        ground_y: f32,
        ceiling_y: f32,
    },
    /// Player moves toward a pointer target at capped speed
    Steer {
        speed: f32,
        /// Vertical steering allowed
        free: bool,
    },
}

impl MovementModel {
    /// Resting y of the player's center, for models with a floor
    pub fn ground_y(&self) -> Option<f32> {
        match *self {
            MovementModel::Jump { ground_y, .. }
            | MovementModel::WallJump { ground_y, .. }
            | MovementModel::Flight { ground_y, .. } => Some(ground_y),
            MovementModel::Steer { .. } => None,
        }
    }
}

/// Overlap test used between the player and other entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPredicate {
    /// Compare axis-aligned bounding boxes
    Aabb,
    /// Compare bounding circles
    Circle,
    /// Use each entity's own shape
    Exact,
}

/// What the primary action (tap / space) does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction {
    /// Whatever the movement model does (jump, lift, steer)
    Move,
    /// Cycle the player's palette color
    CycleColor,
}

/// Direction entities enter and travel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Travel {
    /// Enter at the right edge, move left
    Left,
    /// Enter at the top edge, move down
    Down,
    /// Enter on a ring at a random angle, move toward its center
    Inward { center: Vec2, radius: f32 },
}

/// Cross-axis spawn range: y for `Left`, x for `Down`, angular speed
/// (radians per tick) for `Inward`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f32,
    pub max: f32,
}

impl Band {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub const fn at(v: f32) -> Self {
        Self { min: v, max: v }
    }
}

/// A spawnable entity template
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnKind {
    Obstacle {
        kind: ObstacleKind,
        shape: Shape,
        band: Band,
        speed_scale: f32,
        /// Gets a random palette color (matching variants)
        colored: bool,
    },
    Collectible {
        value: u32,
        tier_hint: Option<u8>,
        shape: Shape,
        band: Band,
        effect: Option<CollectEffect>,
    },
}

impl SpawnKind {
    pub fn is_lethal(&self) -> bool {
        matches!(self, SpawnKind::Obstacle { .. })
    }
}

/// Weighted entry of a spawn table
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnWeight {
    pub weight: u32,
    pub kind: SpawnKind,
}

impl SpawnWeight {
    pub fn new(weight: u32, kind: SpawnKind) -> Self {
        Self { weight, kind }
    }
}

/// A spawn category with its own timer and weight table
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnLane {
    pub name: &'static str,
    pub base_interval_ms: f64,
    pub min_interval_ms: f64,
    /// Interval shrink per score point
    pub score_ramp: f64,
    /// Interval shrink per elapsed second
    pub time_ramp: f64,
    pub table: Vec<SpawnWeight>,
}

/// Complete rule set for one mini-game variant
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    pub name: &'static str,
    /// Playfield size
    pub field: Vec2,
    pub movement: MovementModel,
    pub primary: PrimaryAction,
    pub player_shape: Shape,
    pub player_start: Vec2,
    pub collision: CollisionPredicate,
    /// Shrinks every hitbox (1.0 = exact)
    pub hitbox_scale: f32,
    /// Colored obstacles require a matching player color
    pub matching: bool,
    pub palette_size: u8,
    /// Points for passing a matching gate
    pub gate_points: u64,
    pub travel: Travel,
    /// Entity speed in px per tick
    pub base_speed: f32,
    /// Speed growth per score point
    pub speed_ramp: f32,
    pub max_speed_factor: f32,
    pub lanes: Vec<SpawnLane>,
    pub lives: u8,
    pub invulnerability_ticks: f32,
    pub time_limit_ms: Option<f64>,
    /// Survival points per tick
    pub distance_points_per_tick: f32,
    /// Nominal ticks between collects that keep a combo alive
    pub combo_window_ticks: u64,
    /// Touching floor or ceiling is lethal
    pub lethal_bounds: bool,
    pub max_particles: usize,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::runner()
    }
}

/// Preset names accepted by `Ruleset::by_name`
pub const PRESETS: [&str; 6] = [
    "runner",
    "flyer",
    "catcher",
    "color_switch",
    "wall_climber",
    "orbit",
];

impl Ruleset {
    /// Look up a preset by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().replace('-', "_").as_str() {
            "runner" | "jump" => Some(Self::runner()),
            "flyer" | "flappy" => Some(Self::flyer()),
            "catcher" | "catch" => Some(Self::catcher()),
            "color_switch" | "color" => Some(Self::color_switch()),
            "wall_climber" | "climber" => Some(Self::wall_climber()),
            "orbit" | "dodge" => Some(Self::orbit()),
            _ => None,
        }
    }

    /// Combo window in simulated milliseconds
    pub fn combo_window_ms(&self) -> f64 {
        self.combo_window_ticks as f64 * NOMINAL_FRAME_MS as f64
    }

    /// Apply merchant speed and difficulty
    pub fn tuned(mut self, game_speed: f32, difficulty: Difficulty) -> Self {
        self.base_speed *= game_speed * difficulty.speed_factor();
        let factor = difficulty.interval_factor() as f64;
        for lane in &mut self.lanes {
            lane.base_interval_ms *= factor;
            lane.min_interval_ms *= factor;
        }
        self
    }

    /// Side-scrolling runner: jump over crates, grab coins
    pub fn runner() -> Self {
        let ground = FIELD_HEIGHT - 58.0;
        Self {
            name: "runner",
            field: Vec2::new(FIELD_WIDTH, FIELD_HEIGHT),
            movement: MovementModel::Jump {
                gravity: 0.6,
                jump_force: 12.0,
                ground_y: ground,
            },
            primary: PrimaryAction::Move,
            player_shape: Shape::rect(18.0, 18.0),
            player_start: Vec2::new(120.0, ground),
            collision: CollisionPredicate::Aabb,
            hitbox_scale: 0.85,
            matching: false,
            palette_size: 1,
            gate_points: 0,
            travel: Travel::Left,
            base_speed: 6.0,
            speed_ramp: 0.0005,
            max_speed_factor: 2.0,
            lanes: vec![SpawnLane {
                name: "ground",
                base_interval_ms: 1400.0,
                min_interval_ms: 500.0,
                score_ramp: 0.001,
                time_ramp: 0.01,
                table: vec![
                    SpawnWeight::new(
                        45,
                        SpawnKind::Obstacle {
                            kind: ObstacleKind::Crate,
                            shape: Shape::rect(16.0, 20.0),
                            band: Band::at(ground - 2.0),
                            speed_scale: 1.0,
                            colored: false,
                        },
                    ),
                    SpawnWeight::new(
                        15,
                        SpawnKind::Obstacle {
                            kind: ObstacleKind::Spike,
                            shape: Shape::rect(14.0, 14.0),
                            band: Band::at(ground + 4.0),
                            speed_scale: 1.0,
                            colored: false,
                        },
                    ),
                    SpawnWeight::new(
                        30,
                        SpawnKind::Collectible {
                            value: 10,
                            tier_hint: None,
                            shape: Shape::circle(10.0),
                            band: Band::new(ground - 120.0, ground - 20.0),
                            effect: None,
                        },
                    ),
                    SpawnWeight::new(
                        10,
                        SpawnKind::Collectible {
                            value: 50,
                            tier_hint: Some(1),
                            shape: Shape::circle(12.0),
                            band: Band::new(ground - 110.0, ground - 80.0),
                            effect: None,
                        },
                    ),
                ],
            }],
            lives: 1,
            invulnerability_ticks: 0.0,
            time_limit_ms: None,
            distance_points_per_tick: 0.1,
            combo_window_ticks: 120,
            lethal_bounds: false,
            max_particles: MAX_PARTICLES,
        }
    }

    /// Hold to fly between pillars; floor and ceiling are lethal
    pub fn flyer() -> Self {
        Self {
            name: "flyer",
            movement: MovementModel::Flight {
                gravity: 0.35,
                lift: 0.9,
                max_rise: 7.0,
                max_fall: 9.0,
                ground_y: FIELD_HEIGHT - 20.0,
                ceiling_y: 20.0,
            },
            player_shape: Shape::circle(14.0),
            player_start: Vec2::new(160.0, FIELD_HEIGHT / 2.0),
            collision: CollisionPredicate::Exact,
            hitbox_scale: 0.9,
            base_speed: 4.5,
            lanes: vec![
                SpawnLane {
                    name: "pillars",
                    base_interval_ms: 1600.0,
                    min_interval_ms: 700.0,
                    score_ramp: 0.0008,
                    time_ramp: 0.008,
                    table: vec![
                        SpawnWeight::new(
                            70,
                            SpawnKind::Obstacle {
                                kind: ObstacleKind::Pillar,
                                shape: Shape::rect(20.0, 60.0),
                                band: Band::new(60.0, FIELD_HEIGHT - 60.0),
                                speed_scale: 1.0,
                                colored: false,
                            },
                        ),
                        SpawnWeight::new(
                            30,
                            SpawnKind::Obstacle {
                                kind: ObstacleKind::Bird,
                                shape: Shape::rect(16.0, 12.0),
                                band: Band::new(40.0, FIELD_HEIGHT - 40.0),
                                speed_scale: 1.3,
                                colored: false,
                            },
                        ),
                    ],
                },
                SpawnLane {
                    name: "coins",
                    base_interval_ms: 900.0,
                    min_interval_ms: 600.0,
                    score_ramp: 0.0,
                    time_ramp: 0.0,
                    table: vec![SpawnWeight::new(
                        1,
                        SpawnKind::Collectible {
                            value: 10,
                            tier_hint: None,
                            shape: Shape::circle(10.0),
                            band: Band::new(40.0, FIELD_HEIGHT - 40.0),
                            effect: None,
                        },
                    )],
                },
            ],
            distance_points_per_tick: 0.05,
            lethal_bounds: true,
            ..Self::runner()
        }
    }

    /// Timed catch game: steer a basket, avoid bombs
    pub fn catcher() -> Self {
        let basket_y = FIELD_HEIGHT - 30.0;
        Self {
            name: "catcher",
            movement: MovementModel::Steer {
                speed: 9.0,
                free: false,
            },
            player_shape: Shape::rect(40.0, 12.0),
            player_start: Vec2::new(FIELD_WIDTH / 2.0, basket_y),
            collision: CollisionPredicate::Aabb,
            hitbox_scale: 1.0,
            travel: Travel::Down,
            base_speed: 3.5,
            speed_ramp: 0.001,
            lanes: vec![SpawnLane {
                name: "items",
                base_interval_ms: 700.0,
                min_interval_ms: 250.0,
                score_ramp: 0.002,
                time_ramp: 0.02,
                table: vec![
                    SpawnWeight::new(
                        50,
                        SpawnKind::Collectible {
                            value: 10,
                            tier_hint: None,
                            shape: Shape::circle(11.0),
                            band: Band::new(30.0, FIELD_WIDTH - 30.0),
                            effect: None,
                        },
                    ),
                    SpawnWeight::new(
                        15,
                        SpawnKind::Collectible {
                            value: 30,
                            tier_hint: Some(1),
                            shape: Shape::circle(11.0),
                            band: Band::new(30.0, FIELD_WIDTH - 30.0),
                            effect: None,
                        },
                    ),
                    SpawnWeight::new(
                        5,
                        SpawnKind::Collectible {
                            value: 5,
                            tier_hint: Some(2),
                            shape: Shape::circle(12.0),
                            band: Band::new(30.0, FIELD_WIDTH - 30.0),
                            effect: Some(CollectEffect::TimeBonus { ms: 3000.0 }),
                        },
                    ),
                    SpawnWeight::new(
                        30,
                        SpawnKind::Obstacle {
                            kind: ObstacleKind::Bomb,
                            shape: Shape::circle(13.0),
                            band: Band::new(30.0, FIELD_WIDTH - 30.0),
                            speed_scale: 1.2,
                            colored: false,
                        },
                    ),
                ],
            }],
            lives: 3,
            invulnerability_ticks: 60.0,
            time_limit_ms: Some(30_000.0),
            distance_points_per_tick: 0.0,
            ..Self::runner()
        }
    }

    /// Runner with colored gates: tap to cycle color, pass matching gates only
    pub fn color_switch() -> Self {
        let runner = Self::runner();
        let ground = runner.movement.ground_y().unwrap_or(FIELD_HEIGHT - 58.0);
        Self {
            name: "color_switch",
            primary: PrimaryAction::CycleColor,
            matching: true,
            palette_size: 4,
            gate_points: 25,
            base_speed: 5.0,
            lanes: vec![
                SpawnLane {
                    name: "gates",
                    base_interval_ms: 1800.0,
                    min_interval_ms: 800.0,
                    score_ramp: 0.001,
                    time_ramp: 0.005,
                    table: vec![SpawnWeight::new(
                        1,
                        SpawnKind::Obstacle {
                            kind: ObstacleKind::Gate,
                            shape: Shape::rect(10.0, 90.0),
                            band: Band::at(ground - 70.0),
                            speed_scale: 1.0,
                            colored: true,
                        },
                    )],
                },
                SpawnLane {
                    name: "coins",
                    base_interval_ms: 1100.0,
                    min_interval_ms: 700.0,
                    score_ramp: 0.0,
                    time_ramp: 0.0,
                    table: vec![SpawnWeight::new(
                        1,
                        SpawnKind::Collectible {
                            value: 10,
                            tier_hint: None,
                            shape: Shape::circle(10.0),
                            band: Band::new(ground - 100.0, ground - 10.0),
                            effect: None,
                        },
                    )],
                },
            ],
            distance_points_per_tick: 0.0,
            ..runner
        }
    }

    /// Hop between side walls while rocks fall
    pub fn wall_climber() -> Self {
        let ground = FIELD_HEIGHT - 30.0;
        Self {
            name: "wall_climber",
            movement: MovementModel::WallJump {
                gravity: 0.5,
                jump_force: 11.0,
                wall_kick: 7.0,
                wall_slide: 2.0,
                ground_y: ground,
            },
            player_shape: Shape::rect(14.0, 14.0),
            player_start: Vec2::new(FIELD_WIDTH / 2.0, ground),
            collision: CollisionPredicate::Circle,
            hitbox_scale: 0.9,
            travel: Travel::Down,
            base_speed: 3.0,
            lanes: vec![SpawnLane {
                name: "falling",
                base_interval_ms: 900.0,
                min_interval_ms: 300.0,
                score_ramp: 0.0015,
                time_ramp: 0.01,
                table: vec![
                    SpawnWeight::new(
                        55,
                        SpawnKind::Obstacle {
                            kind: ObstacleKind::Rock,
                            shape: Shape::circle(14.0),
                            band: Band::new(20.0, FIELD_WIDTH - 20.0),
                            speed_scale: 1.0,
                            colored: false,
                        },
                    ),
                    SpawnWeight::new(
                        45,
                        SpawnKind::Collectible {
                            value: 10,
                            tier_hint: None,
                            shape: Shape::circle(10.0),
                            band: Band::new(40.0, FIELD_WIDTH - 40.0),
                            effect: None,
                        },
                    ),
                ],
            }],
            distance_points_per_tick: 0.05,
            ..Self::runner()
        }
    }

    /// Omnidirectional dodge: rocks close in on a ring, steer anywhere
    pub fn orbit() -> Self {
        let center = Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0);
        Self {
            name: "orbit",
            movement: MovementModel::Steer {
                speed: 7.0,
                free: true,
            },
            player_shape: Shape::circle(12.0),
            player_start: center,
            collision: CollisionPredicate::Circle,
            hitbox_scale: 0.9,
            travel: Travel::Inward {
                center,
                radius: FIELD_HEIGHT * 0.65,
            },
            base_speed: 2.5,
            lanes: vec![SpawnLane {
                name: "ring",
                base_interval_ms: 800.0,
                min_interval_ms: 250.0,
                score_ramp: 0.0015,
                time_ramp: 0.015,
                table: vec![
                    SpawnWeight::new(
                        60,
                        SpawnKind::Obstacle {
                            kind: ObstacleKind::Rock,
                            shape: Shape::circle(12.0),
                            band: Band::new(-0.01, 0.01),
                            speed_scale: 1.0,
                            colored: false,
                        },
                    ),
                    SpawnWeight::new(
                        40,
                        SpawnKind::Collectible {
                            value: 15,
                            tier_hint: None,
                            shape: Shape::circle(9.0),
                            band: Band::new(-0.005, 0.005),
                            effect: None,
                        },
                    ),
                ],
            }],
            distance_points_per_tick: 0.05,
            ..Self::runner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_resolves() {
        for name in PRESETS {
            let rules = Ruleset::by_name(name).unwrap();
            assert_eq!(rules.name, name);
            assert!(!rules.lanes.is_empty());
            assert!(rules.lanes.iter().all(|l| l.table.iter().any(|w| w.weight > 0)));
        }
        assert!(Ruleset::by_name("Color-Switch").is_some());
        assert!(Ruleset::by_name("pinball").is_none());
    }

    #[test]
    fn test_tuned_scales_speed_and_intervals() {
        let base = Ruleset::runner();
        let hard = Ruleset::runner().tuned(1.5, Difficulty::Hard);
        assert!((hard.base_speed - base.base_speed * 1.5 * 1.2).abs() < 1e-4);
        assert!(hard.lanes[0].base_interval_ms < base.lanes[0].base_interval_ms);
    }

    #[test]
    fn test_ground_presets_start_grounded() {
        for rules in [Ruleset::runner(), Ruleset::wall_climber()] {
            let ground = rules.movement.ground_y().unwrap();
            assert_eq!(rules.player_start.y, ground);
        }
        assert!(Ruleset::orbit().movement.ground_y().is_none());
    }
}
