//! Render snapshot
//!
//! Copies everything drawable out of the world so painting never holds a
//! reference to live simulation state.

use glam::Vec2;

use crate::sim::{ColorTag, EndReason, EntityKind, ObstacleKind, Ruleset, Shape, WorldState};

/// Linear RGBA
pub type Rgba = [f32; 4];

/// Matching-constraint palette (cyan, magenta, yellow, lime)
pub const PALETTE: [Rgba; 4] = [
    [0.2, 0.85, 0.95, 1.0],
    [0.95, 0.3, 0.75, 1.0],
    [0.98, 0.85, 0.25, 1.0],
    [0.5, 0.95, 0.35, 1.0],
];

pub const BACKGROUND: Rgba = [0.06, 0.07, 0.12, 1.0];
pub const GROUND: Rgba = [0.2, 0.22, 0.3, 1.0];

/// Ticks per invulnerability blink phase
const BLINK_TICKS: u64 = 6;

pub fn color_for(tag: ColorTag) -> Rgba {
    match tag {
        ColorTag::Player => [0.35, 0.75, 1.0, 1.0],
        ColorTag::Obstacle => [0.95, 0.35, 0.3, 1.0],
        ColorTag::Collectible => [1.0, 0.8, 0.2, 1.0],
        ColorTag::Rare => [0.75, 0.45, 1.0, 1.0],
        ColorTag::Palette(i) => PALETTE[i as usize % PALETTE.len()],
    }
}

/// CSS color string for a canvas fill style
pub fn to_css(color: Rgba, alpha: f32) -> String {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "rgba({},{},{},{:.3})",
        c(color[0]),
        c(color[1]),
        c(color[2]),
        (color[3] * alpha).clamp(0.0, 1.0)
    )
}

/// One drawable entity
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub kind: EntityKind,
    pub pos: Vec2,
    pub shape: Shape,
    pub color: Rgba,
    pub alpha: f32,
    /// Obstacle subtype, for glyph choice
    pub obstacle: Option<ObstacleKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    pub field: Vec2,
    pub ground_y: Option<f32>,
    /// Player last so it draws on top
    pub sprites: Vec<Sprite>,
    pub particles: Vec<Sprite>,
    pub score: u64,
    pub lives: u8,
    pub combo: u32,
    pub time_left_ms: Option<f64>,
    pub game_over: bool,
    pub end_reason: Option<EndReason>,
}

impl RenderSnapshot {
    pub fn capture(world: &WorldState, rules: &Ruleset) -> Self {
        let mut sprites =
            Vec::with_capacity(world.obstacles.len() + world.collectibles.len() + 1);

        for o in &world.obstacles {
            let tag = match o.color {
                Some(c) => ColorTag::Palette(c),
                None => ColorTag::Obstacle,
            };
            sprites.push(Sprite {
                kind: EntityKind::Obstacle,
                pos: o.body.pos,
                shape: o.body.shape,
                color: color_for(tag),
                alpha: if o.passed { 0.4 } else { 1.0 },
                obstacle: Some(o.kind),
            });
        }

        for c in world.collectibles.iter().filter(|c| !c.is_collected()) {
            let tag = if c.tier_hint.is_some() {
                ColorTag::Rare
            } else {
                ColorTag::Collectible
            };
            sprites.push(Sprite {
                kind: EntityKind::Collectible,
                pos: c.body.pos,
                shape: c.body.shape,
                color: color_for(tag),
                alpha: 1.0,
                obstacle: None,
            });
        }

        let player = &world.player;
        let player_tag = if rules.matching {
            ColorTag::Palette(player.color)
        } else {
            ColorTag::Player
        };
        let blink_off = player.is_invulnerable() && (world.tick_count / BLINK_TICKS) % 2 == 1;
        sprites.push(Sprite {
            kind: EntityKind::Player,
            pos: player.body.pos,
            shape: player.body.shape,
            color: color_for(player_tag),
            alpha: if blink_off { 0.3 } else { 1.0 },
            obstacle: None,
        });

        let particles = world
            .particles
            .iter()
            .map(|p| Sprite {
                kind: EntityKind::Particle,
                pos: p.pos,
                shape: Shape::circle(p.size),
                color: color_for(p.color),
                alpha: p.alpha(),
                obstacle: None,
            })
            .collect();

        Self {
            field: rules.field,
            ground_y: rules
                .movement
                .ground_y()
                .map(|g| g + rules.player_shape.half_extents().y),
            sprites,
            particles,
            score: world.score(),
            lives: player.lives,
            combo: world.combo,
            time_left_ms: world.time_left_ms(),
            game_over: world.game_over,
            end_reason: world.end_reason,
        }
    }
}
