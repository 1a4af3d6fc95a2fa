//! Canvas 2D painter

use std::f64::consts::TAU;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::snapshot::{BACKGROUND, GROUND, RenderSnapshot, Sprite, to_css};
use crate::sim::{EndReason, ObstacleKind, Shape};

pub struct CanvasPainter {
    ctx: CanvasRenderingContext2d,
    width: f64,
    height: f64,
}

impl CanvasPainter {
    pub fn new(canvas: &HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| JsValue::from_str("context is not 2d"))?;
        Ok(Self {
            ctx,
            width: canvas.width() as f64,
            height: canvas.height() as f64,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width as f64;
        self.height = height as f64;
    }

    /// Paint one snapshot, scaled to fit the canvas
    pub fn paint(&self, snap: &RenderSnapshot) -> Result<(), JsValue> {
        let ctx = &self.ctx;
        ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
        ctx.set_fill_style_str(&to_css(BACKGROUND, 1.0));
        ctx.fill_rect(0.0, 0.0, self.width, self.height);

        let scale = (self.width / snap.field.x as f64).min(self.height / snap.field.y as f64);
        ctx.scale(scale, scale)?;

        if let Some(ground) = snap.ground_y {
            ctx.set_fill_style_str(&to_css(GROUND, 1.0));
            ctx.fill_rect(
                0.0,
                ground as f64,
                snap.field.x as f64,
                (snap.field.y - ground).max(0.0) as f64,
            );
        }

        for sprite in snap.sprites.iter().chain(&snap.particles) {
            self.sprite(sprite)?;
        }

        if snap.game_over {
            self.banner(snap)?;
        }
        Ok(())
    }

    fn sprite(&self, sprite: &Sprite) -> Result<(), JsValue> {
        if sprite.alpha <= 0.0 {
            return Ok(());
        }
        let ctx = &self.ctx;
        ctx.set_fill_style_str(&to_css(sprite.color, sprite.alpha));
        let (x, y) = (sprite.pos.x as f64, sprite.pos.y as f64);
        match (sprite.obstacle, sprite.shape) {
            (Some(ObstacleKind::Spike), Shape::Box { half }) => {
                let (hx, hy) = (half.x as f64, half.y as f64);
                ctx.begin_path();
                ctx.move_to(x - hx, y + hy);
                ctx.line_to(x, y - hy);
                ctx.line_to(x + hx, y + hy);
                ctx.close_path();
                ctx.fill();
            }
            (Some(ObstacleKind::Gate), Shape::Box { half }) => {
                let (hx, hy) = (half.x as f64, half.y as f64);
                ctx.fill_rect(x - hx, y - hy, hx * 2.0, hy * 2.0);
                ctx.set_stroke_style_str(&to_css(BACKGROUND, sprite.alpha));
                ctx.set_line_width(2.0);
                ctx.stroke_rect(x - hx, y - hy, hx * 2.0, hy * 2.0);
            }
            (_, Shape::Circle { radius }) => {
                ctx.begin_path();
                ctx.arc(x, y, radius as f64, 0.0, TAU)?;
                ctx.fill();
            }
            (_, Shape::Box { half }) => {
                ctx.fill_rect(
                    x - half.x as f64,
                    y - half.y as f64,
                    half.x as f64 * 2.0,
                    half.y as f64 * 2.0,
                );
            }
        }
        Ok(())
    }

    fn banner(&self, snap: &RenderSnapshot) -> Result<(), JsValue> {
        let ctx = &self.ctx;
        let (w, h) = (snap.field.x as f64, snap.field.y as f64);
        ctx.set_fill_style_str("rgba(0,0,0,0.55)");
        ctx.fill_rect(0.0, 0.0, w, h);

        let title = match snap.end_reason {
            Some(EndReason::TimeUp) => "TIME UP",
            Some(EndReason::Exit) => "FINISHED",
            _ => "GAME OVER",
        };
        ctx.set_fill_style_str("#ffffff");
        ctx.set_text_align("center");
        ctx.set_font("bold 36px sans-serif");
        ctx.fill_text(title, w / 2.0, h / 2.0 - 10.0)?;
        ctx.set_font("20px sans-serif");
        ctx.fill_text(&format!("Score: {}", snap.score), w / 2.0, h / 2.0 + 24.0)?;
        Ok(())
    }
}
