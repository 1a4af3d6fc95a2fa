//! Discount Arcade entry point
//!
//! On the web this mounts the widget. Natively it runs one headless session
//! against an in-process backend with a simple autopilot and prints the result.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialised".into());
    }
    log::info!("Discount arcade starting...");
    discount_arcade::platform::web::launch();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    demo::run();
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use discount_arcade::RemoteConfig;
    use discount_arcade::backend::LocalBackend;
    use discount_arcade::consts::NOMINAL_FRAME_MS;
    use discount_arcade::input::Intent;
    use discount_arcade::platform::now_ms;
    use discount_arcade::plays::MemoryStore;
    use discount_arcade::session::{SessionController, SessionOptions, SessionPhase};
    use discount_arcade::sim::{MovementModel, PrimaryAction, Ruleset, Travel, WorldState};
    use glam::Vec2;

    /// Give up after this much simulated play
    const MAX_FRAMES: usize = 60 * 120;

    pub fn run() {
        let mut args = std::env::args().skip(1);
        let game_type = args.next().unwrap_or_else(|| "runner".to_string());
        let seed = args
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| now_ms() as u64);

        if Ruleset::by_name(&game_type).is_none() {
            log::error!(
                "Unknown game '{}', expected one of {:?}",
                game_type,
                discount_arcade::sim::PRESETS
            );
            std::process::exit(2);
        }

        let mut backend = LocalBackend::new(RemoteConfig {
            game_type: Some(game_type.clone()),
            ..Default::default()
        });
        let mut controller = SessionController::new(
            SessionOptions::new("demo-shop", seed),
            Box::new(MemoryStore::new()),
        );

        if let Err(err) = controller.load() {
            log::error!("Config load failed: {}", err);
            return;
        }
        controller.pump(&mut backend);

        let mut now = now_ms();
        if let Err(err) = controller.start(now) {
            log::error!("Cannot start: {}", err);
            return;
        }
        controller.pump(&mut backend);
        log::info!("Playing '{}' with seed {}", game_type, seed);

        for _ in 0..MAX_FRAMES {
            if controller.phase() != SessionPhase::Playing {
                break;
            }
            if let Some(world) = controller.world() {
                if let Some(intent) = autopilot(world, controller.ruleset()) {
                    controller.push_intent(intent);
                }
            }
            now += NOMINAL_FRAME_MS as f64;
            controller.frame(now);
        }
        if controller.phase() == SessionPhase::Playing {
            controller.request_exit();
            now += NOMINAL_FRAME_MS as f64;
            controller.frame(now);
        }
        controller.pump(&mut backend);

        match controller.result() {
            Some(result) => match serde_json::to_string_pretty(result) {
                Ok(json) => println!("{}", json),
                Err(err) => log::error!("Failed to encode result: {}", err),
            },
            None => log::warn!("Session produced no result"),
        }
    }

    /// Nearest lethal obstacle ahead of the player in the direction of travel
    fn threat(world: &WorldState, rules: &Ruleset, reach: f32) -> Option<Vec2> {
        let player = world.player.body.pos;
        world
            .obstacles
            .iter()
            .filter(|o| !(rules.matching && o.color == Some(world.player.color)))
            .map(|o| o.body.pos)
            .filter(|p| match rules.travel {
                Travel::Left => p.x > player.x - 10.0 && p.x - player.x < reach,
                _ => p.distance(player) < reach,
            })
            .min_by(|a, b| a.distance(player).total_cmp(&b.distance(player)))
    }

    fn nearest_collectible(world: &WorldState) -> Option<Vec2> {
        let player = world.player.body.pos;
        world
            .collectibles
            .iter()
            .map(|c| c.body.pos)
            .min_by(|a, b| a.distance(player).total_cmp(&b.distance(player)))
    }

    /// One intent per tick, chosen from the current world
    fn autopilot(world: &WorldState, rules: &Ruleset) -> Option<Intent> {
        let player = &world.player;

        if rules.primary == PrimaryAction::CycleColor {
            let gate = world
                .obstacles
                .iter()
                .filter(|o| o.body.pos.x > player.body.pos.x)
                .min_by(|a, b| a.body.pos.x.total_cmp(&b.body.pos.x))?;
            return match gate.color {
                Some(c) if c != player.color => Some(Intent::CycleColor),
                _ => None,
            };
        }

        match rules.movement {
            MovementModel::Jump { .. } => {
                threat(world, rules, 90.0).filter(|_| player.on_ground).map(|_| Intent::Jump)
            }
            MovementModel::WallJump { .. } => {
                (player.on_ground || player.wall.is_some()).then_some(Intent::Jump)
            }
            MovementModel::Flight { .. } => {
                let target_y = threat(world, rules, 200.0)
                    .map(|p| if p.y > rules.field.y / 2.0 { p.y - 110.0 } else { p.y + 110.0 })
                    .or_else(|| nearest_collectible(world).map(|p| p.y))
                    .unwrap_or(rules.field.y / 2.0);
                let below = player.body.pos.y > target_y;
                match (below, player.lifting) {
                    (true, false) => Some(Intent::LiftStart),
                    (false, true) => Some(Intent::LiftStop),
                    _ => None,
                }
            }
            MovementModel::Steer { .. } => {
                if let Some(danger) = threat(world, rules, 70.0) {
                    let away = (player.body.pos - danger).normalize_or_zero() * 80.0;
                    return Some(Intent::SteerTo(player.body.pos + away));
                }
                nearest_collectible(world).map(Intent::SteerTo)
            }
        }
    }
}
