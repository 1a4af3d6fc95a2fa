//! Session lifecycle controller
//!
//! `Idle → Loading → Playing → Ended`. The controller owns the world and
//! is the only thing that ticks it. Collaborator calls leave through an outbox
//! of `BackendRequest`s; their results come back through the `complete_*`
//! methods, tagged with the ticket they were issued under. A result whose
//! ticket is stale, or that arrives after teardown, is dropped.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use crate::backend::{
    Backend, BackendRequest, FinishSessionRequest, FinishSessionResponse, GameData,
    StartSessionRequest, StartSessionResponse, Ticket, fallback_discount_code,
    placeholder_session_id,
};
use crate::config::{GameConfig, RemoteConfig};
use crate::error::{BackendError, SessionError};
use crate::input::{InputAction, Intent, IntentQueue, map_input};
use crate::plays::{PlayLimiter, PlayStore, load_history};
use crate::scheduler::{FrameOutcome, FrameScheduler, SkipReason};
use crate::sim::{EndReason, Ruleset, WorldState};
use crate::tiers::DiscountTier;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Playing,
    Ended,
}

/// The controller's two outward notifications
pub trait SessionObserver {
    /// Called after every tick while playing
    fn on_score_update(&mut self, score: u64);
    /// Called exactly once per session
    fn on_game_end(&mut self, final_score: u64, game_data: &GameData);
}

/// Where a session comes from
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub shop_id: String,
    /// Embedding surface, sent with session start
    pub source: String,
    pub referrer: Option<String>,
    /// Host override for the ruleset preset, wins over the merchant config
    pub game_type: Option<String>,
    /// RNG seed for worlds, ids and codes
    pub seed: u64,
}

impl SessionOptions {
    pub fn new(shop_id: impl Into<String>, seed: u64) -> Self {
        Self {
            shop_id: shop_id.into(),
            source: "widget".to_string(),
            referrer: None,
            game_type: None,
            seed,
        }
    }
}

/// Session identifier, possibly synthesized locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId {
    pub value: String,
    /// Synthesized after session start failed
    pub provisional: bool,
}

/// Discount code and whether the backend issued it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountCode {
    pub code: String,
    /// False for client-synthesized fallback codes
    pub authoritative: bool,
}

/// Outcome of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub final_score: u64,
    pub discount_earned: u32,
    pub discount_code: Option<DiscountCode>,
    pub duration_ms: f64,
    pub objects_collected: u32,
    pub obstacles_hit: u32,
    pub end_reason: EndReason,
}

impl SessionResult {
    pub fn game_data(&self) -> GameData {
        GameData {
            duration: self.duration_ms / 1000.0,
            objects_collected: self.objects_collected,
            obstacles_hit: self.obstacles_hit,
        }
    }
}

/// Apply host-side overrides to a merged config
fn with_overrides(mut config: GameConfig, options: &SessionOptions) -> GameConfig {
    if let Some(name) = &options.game_type {
        if Ruleset::by_name(name).is_some() {
            config.game_type = name.clone();
        } else {
            log::warn!("Ignoring unknown game type override '{}'", name);
        }
    }
    config
}

pub struct SessionController {
    options: SessionOptions,
    config: GameConfig,
    rules: Ruleset,
    phase: SessionPhase,
    world: Option<WorldState>,
    intents: IntentQueue,
    scheduler: FrameScheduler,
    session_id: Option<SessionId>,
    outbox: Vec<BackendRequest>,
    observer: Option<Box<dyn SessionObserver>>,
    store: Box<dyn PlayStore>,
    rng: Pcg32,
    result: Option<SessionResult>,
    /// Bumped whenever outstanding requests become stale
    generation: u64,
    /// Cleared on teardown
    active: bool,
    finish_sent: bool,
    started_at_ms: f64,
}

impl SessionController {
    pub fn new(options: SessionOptions, store: Box<dyn PlayStore>) -> Self {
        let config = with_overrides(GameConfig::default(), &options);
        let rules = config.ruleset();
        Self {
            rng: Pcg32::seed_from_u64(options.seed),
            options,
            config,
            rules,
            phase: SessionPhase::Idle,
            world: None,
            intents: IntentQueue::new(),
            scheduler: FrameScheduler::new(),
            session_id: None,
            outbox: Vec::new(),
            observer: None,
            store,
            result: None,
            generation: 0,
            active: true,
            finish_sent: false,
            started_at_ms: 0.0,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
        }
    }

    /// True if a completion under `ticket` may still mutate state
    fn accepts(&self, ticket: Ticket, what: &str) -> bool {
        if !self.active {
            log::debug!("Dropping {} completion after teardown", what);
            return false;
        }
        if ticket.generation != self.generation {
            log::debug!(
                "Dropping stale {} completion (generation {} != {})",
                what,
                ticket.generation,
                self.generation
            );
            return false;
        }
        true
    }

    /// Begin fetching the merchant configuration
    pub fn load(&mut self) -> Result<(), SessionError> {
        if !self.active {
            return Err(SessionError::TornDown);
        }
        if matches!(self.phase, SessionPhase::Loading | SessionPhase::Playing) {
            return Err(SessionError::InvalidPhase {
                action: "load",
                phase: self.phase,
            });
        }
        self.generation += 1;
        self.phase = SessionPhase::Loading;
        self.outbox.push(BackendRequest::FetchConfig {
            ticket: self.ticket(),
            shop_id: self.options.shop_id.clone(),
        });
        Ok(())
    }

    /// Apply a configuration fetch result. Failures fall back to defaults.
    pub fn complete_config(&mut self, ticket: Ticket, result: Result<RemoteConfig, BackendError>) {
        if !self.accepts(ticket, "config") || self.phase != SessionPhase::Loading {
            return;
        }
        let config = match result {
            Ok(remote) => GameConfig::merge(remote).0,
            Err(err) => {
                log::warn!("Config fetch failed ({}), using defaults", err);
                GameConfig::default()
            }
        };
        let config = with_overrides(config, &self.options);
        self.rules = config.ruleset();
        log::info!(
            "Config loaded: game={} speed={} difficulty={}",
            self.rules.name,
            config.game_speed,
            config.difficulty.as_str()
        );
        self.config = config;
        self.phase = SessionPhase::Idle;
    }

    /// Start a new session at host time `now_ms`
    pub fn start(&mut self, now_ms: f64) -> Result<(), SessionError> {
        if !self.active {
            return Err(SessionError::TornDown);
        }
        match self.phase {
            SessionPhase::Playing => {
                return Err(SessionError::InvalidPhase {
                    action: "start",
                    phase: self.phase,
                });
            }
            SessionPhase::Loading => {
                log::info!("Starting before config arrived, using defaults");
            }
            SessionPhase::Idle | SessionPhase::Ended => {}
        }

        let mut history = load_history(self.store.as_ref(), &self.options.shop_id, now_ms);
        PlayLimiter::from_config(&self.config)
            .check(&history)
            .map_err(SessionError::PlayLimitReached)?;
        history.record_play(now_ms);
        self.store.save(&history);

        // Anything still in flight belongs to an earlier phase
        self.generation += 1;
        let seed = self.rng.random::<u64>();
        self.world = Some(WorldState::new(seed, &self.rules));
        self.intents.clear();
        self.scheduler.register();
        self.session_id = None;
        self.result = None;
        self.finish_sent = false;
        self.started_at_ms = now_ms;
        self.phase = SessionPhase::Playing;

        self.outbox.push(BackendRequest::StartSession {
            ticket: self.ticket(),
            body: StartSessionRequest {
                shop_id: self.options.shop_id.clone(),
                source: self.options.source.clone(),
                referrer: self.options.referrer.clone(),
            },
        });
        log::info!("Session started: game={} seed={}", self.rules.name, seed);
        Ok(())
    }

    /// Apply a session start result. Failures get a placeholder id.
    pub fn complete_session_start(
        &mut self,
        ticket: Ticket,
        result: Result<StartSessionResponse, BackendError>,
    ) {
        if !self.accepts(ticket, "session start") {
            return;
        }
        match result {
            Ok(response) if self.finish_sent => {
                log::debug!(
                    "Session id {} arrived after finish, dropped",
                    response.session_id
                );
            }
            Ok(response) => {
                self.session_id = Some(SessionId {
                    value: response.session_id,
                    provisional: false,
                });
            }
            Err(err) => {
                log::warn!("Session start failed ({}), continuing with placeholder id", err);
                self.ensure_session_id();
            }
        }
    }

    fn ensure_session_id(&mut self) -> String {
        if let Some(id) = &self.session_id {
            return id.value.clone();
        }
        let value = placeholder_session_id(self.started_at_ms, &mut self.rng);
        log::warn!("Using placeholder session id {}", value);
        self.session_id = Some(SessionId {
            value: value.clone(),
            provisional: true,
        });
        value
    }

    /// Queue an intent for the next tick. False if not playing or the queue is full.
    pub fn push_intent(&mut self, intent: Intent) -> bool {
        if !self.active || self.phase != SessionPhase::Playing {
            return false;
        }
        self.intents.push(intent)
    }

    /// Map a host input action and queue the resulting intent
    pub fn handle_input(&mut self, action: &InputAction) -> bool {
        match map_input(&self.rules, action) {
            Some(intent) => self.push_intent(intent),
            None => false,
        }
    }

    /// End the session on the next tick
    pub fn request_exit(&mut self) -> bool {
        self.push_intent(Intent::Exit)
    }

    /// Handle one host frame
    pub fn frame(&mut self, now_ms: f64) -> FrameOutcome {
        if !self.active || self.phase != SessionPhase::Playing {
            return FrameOutcome::Idle(SkipReason::NotRegistered);
        }
        let Some(world) = self.world.as_mut() else {
            return FrameOutcome::Idle(SkipReason::NotRegistered);
        };

        let outcome = self
            .scheduler
            .frame(now_ms, world, &self.rules, &mut self.intents);
        let (score, over) = (world.score(), world.game_over);

        if let FrameOutcome::Ticked { .. } = outcome
            && let Some(observer) = self.observer.as_mut()
        {
            observer.on_score_update(score);
        }
        if over {
            self.finish(now_ms);
        }
        outcome
    }

    fn finish(&mut self, now_ms: f64) {
        if self.phase != SessionPhase::Playing {
            return;
        }
        let Some(world) = self.world.as_ref() else {
            return;
        };
        self.phase = SessionPhase::Ended;
        self.scheduler.deregister();
        self.intents.clear();

        let final_score = world.score();
        let discount_earned = self.config.discount_tiers.discount_for(final_score);
        let duration_ms = if now_ms.is_finite() && now_ms >= self.started_at_ms {
            now_ms - self.started_at_ms
        } else {
            world.elapsed_ms
        };
        let result = SessionResult {
            final_score,
            discount_earned,
            discount_code: None,
            duration_ms,
            objects_collected: world.objects_collected,
            obstacles_hit: world.obstacles_hit,
            end_reason: world.end_reason.unwrap_or(EndReason::Exit),
        };
        log::info!(
            "Session ended ({:?}): score={} discount={}%",
            result.end_reason,
            final_score,
            discount_earned
        );

        let mut history = load_history(self.store.as_ref(), &self.options.shop_id, now_ms);
        if history.record_score(final_score) {
            self.store.save(&history);
        }

        let game_data = result.game_data();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_game_end(final_score, &game_data);
        }

        let session_id = self.ensure_session_id();
        self.outbox.push(BackendRequest::FinishSession {
            ticket: self.ticket(),
            body: FinishSessionRequest {
                session_id,
                final_score,
                game_data,
            },
        });
        self.finish_sent = true;
        self.result = Some(result);
    }

    /// Apply a session finish result. Failures with an earned discount get a
    /// client-synthesized, non-authoritative code.
    pub fn complete_session_finish(
        &mut self,
        ticket: Ticket,
        result: Result<FinishSessionResponse, BackendError>,
    ) {
        if !self.accepts(ticket, "session finish") {
            return;
        }
        let Some(percent) = self.result.as_ref().map(|r| r.discount_earned) else {
            return;
        };
        let code = match result {
            Ok(response) => response.discount_code.map(|code| DiscountCode {
                code,
                authoritative: true,
            }),
            Err(err) if percent > 0 => {
                let code = fallback_discount_code(percent, &mut self.rng);
                log::warn!(
                    "Session finish failed ({}), issuing non-authoritative code {}",
                    err,
                    code
                );
                Some(DiscountCode {
                    code,
                    authoritative: false,
                })
            }
            Err(err) => {
                log::warn!("Session finish failed ({}), no discount earned", err);
                None
            }
        };
        if let Some(result) = self.result.as_mut() {
            result.discount_code = code;
        }
    }

    /// Stop for good: deregister the frame callback and drop the world.
    /// Later completions are ignored.
    pub fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.generation += 1;
        self.scheduler.deregister();
        self.intents.clear();
        self.outbox.clear();
        self.world = None;
        log::info!("Session controller torn down");
    }

    /// Take every pending collaborator request
    pub fn take_requests(&mut self) -> Vec<BackendRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Run pending requests against a synchronous backend until none remain
    pub fn pump(&mut self, backend: &mut dyn Backend) {
        loop {
            let requests = self.take_requests();
            if requests.is_empty() {
                break;
            }
            for request in requests {
                match request {
                    BackendRequest::FetchConfig { ticket, shop_id } => {
                        let result = backend.get_configuration(&shop_id);
                        self.complete_config(ticket, result);
                    }
                    BackendRequest::StartSession { ticket, body } => {
                        let result = backend.start_session(&body);
                        self.complete_session_start(ticket, result);
                    }
                    BackendRequest::FinishSession { ticket, body } => {
                        let result = backend.finish_session(&body);
                        self.complete_session_finish(ticket, result);
                    }
                }
            }
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.rules
    }

    pub fn world(&self) -> Option<&WorldState> {
        self.world.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    pub fn score(&self) -> u64 {
        self.world.as_ref().map_or(0, |w| w.score())
    }

    pub fn current_tier(&self) -> DiscountTier {
        self.config.discount_tiers.lookup(self.score())
    }

    pub fn next_tier(&self) -> Option<&DiscountTier> {
        self.config.discount_tiers.next_tier(self.score())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::{LocalBackend, OfflineBackend, is_fallback_code, is_placeholder_id};
    use crate::consts::NOMINAL_FRAME_MS;
    use crate::plays::MemoryStore;
    use crate::sim::{Body, Collectible, Motion, Shape};

    #[derive(Default)]
    struct Recorded {
        score_updates: Vec<u64>,
        ends: Vec<(u64, GameData)>,
    }

    struct Recorder(Rc<RefCell<Recorded>>);

    impl SessionObserver for Recorder {
        fn on_score_update(&mut self, score: u64) {
            self.0.borrow_mut().score_updates.push(score);
        }

        fn on_game_end(&mut self, final_score: u64, game_data: &GameData) {
            self.0.borrow_mut().ends.push((final_score, game_data.clone()));
        }
    }

    fn controller() -> (SessionController, Rc<RefCell<Recorded>>) {
        let mut c = SessionController::new(
            SessionOptions::new("shop-1", 42),
            Box::new(MemoryStore::new()),
        );
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        c.set_observer(Box::new(Recorder(recorded.clone())));
        (c, recorded)
    }

    /// Drop a coin worth `value` on the player
    fn feed(c: &mut SessionController, value: u32) {
        let world = c.world.as_mut().unwrap();
        let id = world.next_entity_id();
        let at = world.player.body.pos;
        world.collectibles.push(Collectible::new(
            id,
            Body::new(at, glam::Vec2::ZERO, Shape::circle(10.0)),
            Motion::Linear,
            value,
            None,
            None,
        ));
    }

    fn run_frames(c: &mut SessionController, from_ms: f64, frames: usize) -> f64 {
        let mut now = from_ms;
        for _ in 0..frames {
            now += NOMINAL_FRAME_MS as f64;
            c.frame(now);
        }
        now
    }

    #[test]
    fn test_finish_failure_synthesizes_fallback_code() {
        let (mut c, _) = controller();
        c.load().unwrap();
        c.pump(&mut OfflineBackend);
        assert_eq!(c.phase(), SessionPhase::Idle);

        c.start(1000.0).unwrap();
        c.pump(&mut OfflineBackend);
        feed(&mut c, 500);
        let now = run_frames(&mut c, 1000.0, 1);
        assert_eq!(c.score(), 500);

        c.request_exit();
        run_frames(&mut c, now, 1);
        c.pump(&mut OfflineBackend);

        let result = c.result().unwrap();
        assert_eq!(result.final_score, 500);
        assert_eq!(result.discount_earned, 15);
        let code = result.discount_code.as_ref().unwrap();
        assert!(is_fallback_code(&code.code), "{}", code.code);
        assert!(code.code.starts_with("OFFLINE15-"));
        assert!(!code.authoritative);
    }

    #[test]
    fn test_no_fallback_code_without_discount() {
        let (mut c, _) = controller();
        c.start(0.0).unwrap();
        c.request_exit();
        run_frames(&mut c, 0.0, 1);
        c.pump(&mut OfflineBackend);
        let result = c.result().unwrap();
        assert_eq!(result.discount_earned, 0);
        assert_eq!(result.discount_code, None);
    }

    #[test]
    fn test_start_failure_uses_placeholder_id() {
        let (mut c, _) = controller();
        c.start(1_700_000_000_000.0).unwrap();
        c.pump(&mut OfflineBackend);
        let id = c.session_id().unwrap();
        assert!(id.provisional);
        assert!(is_placeholder_id(&id.value));
        assert!(id.value.starts_with("temp-1700000000000-"));
        assert_eq!(c.phase(), SessionPhase::Playing);
    }

    #[test]
    fn test_real_id_replaces_placeholder_before_finish() {
        let (mut c, _) = controller();
        c.start(0.0).unwrap();
        let requests = c.take_requests();
        let ticket = requests[0].ticket();
        c.complete_session_start(ticket, Err(BackendError::Network("offline".into())));
        assert!(c.session_id().unwrap().provisional);

        c.complete_session_start(
            ticket,
            Ok(StartSessionResponse {
                session_id: "real-1".into(),
            }),
        );
        assert_eq!(c.session_id().unwrap().value, "real-1");
        assert!(!c.session_id().unwrap().provisional);
    }

    #[test]
    fn test_backend_flow_yields_authoritative_code() {
        let (mut c, recorded) = controller();
        let mut backend = LocalBackend::new(RemoteConfig::default());
        c.load().unwrap();
        c.pump(&mut backend);
        c.start(0.0).unwrap();
        c.pump(&mut backend);
        assert!(c.session_id().unwrap().value.starts_with("local-"));

        feed(&mut c, 300);
        let now = run_frames(&mut c, 0.0, 3);
        c.request_exit();
        run_frames(&mut c, now, 3);
        c.pump(&mut backend);

        let result = c.result().unwrap();
        assert_eq!(result.discount_earned, 10);
        let code = result.discount_code.as_ref().unwrap();
        assert!(code.authoritative);
        assert_eq!(backend.finished[0].final_score, result.final_score);

        let recorded = recorded.borrow();
        assert_eq!(recorded.ends.len(), 1);
        assert_eq!(recorded.ends[0].0, result.final_score);
        assert_eq!(recorded.score_updates.len(), 4);
    }

    #[test]
    fn test_game_end_notified_once() {
        let (mut c, recorded) = controller();
        c.start(0.0).unwrap();
        c.request_exit();
        c.request_exit();
        run_frames(&mut c, 0.0, 10);
        assert_eq!(c.phase(), SessionPhase::Ended);
        assert_eq!(recorded.borrow().ends.len(), 1);
        assert_eq!(c.result().unwrap().end_reason, EndReason::Exit);
    }

    #[test]
    fn test_late_completions_after_teardown_are_ignored() {
        let (mut c, _) = controller();
        c.load().unwrap();
        let config_ticket = c.take_requests()[0].ticket();
        c.start(0.0).unwrap();
        let start_ticket = c.take_requests()[0].ticket();

        // Config arriving after start is stale
        c.complete_config(
            config_ticket,
            Ok(RemoteConfig {
                game_type: Some("flyer".into()),
                ..Default::default()
            }),
        );
        assert_eq!(c.ruleset().name, "runner");

        c.teardown();
        assert!(c.world().is_none());
        c.complete_session_start(
            start_ticket,
            Ok(StartSessionResponse {
                session_id: "late".into(),
            }),
        );
        assert!(c.session_id().is_none());
        assert_eq!(c.frame(100.0), FrameOutcome::Idle(SkipReason::NotRegistered));
        assert_eq!(c.start(200.0), Err(SessionError::TornDown));
        assert!(!c.push_intent(Intent::Jump));
    }

    #[test]
    fn test_play_limit_blocks_start() {
        let (mut c, _) = controller();
        c.load().unwrap();
        c.pump(&mut LocalBackend::new(RemoteConfig {
            max_plays_per_day: Some(1),
            ..Default::default()
        }));

        c.start(0.0).unwrap();
        c.request_exit();
        run_frames(&mut c, 0.0, 1);
        assert_eq!(c.phase(), SessionPhase::Ended);

        let err = c.start(1000.0).unwrap_err();
        assert_eq!(
            err,
            SessionError::PlayLimitReached(crate::plays::PlayLimit::PerDay(1))
        );
    }

    #[test]
    fn test_input_ignored_outside_play() {
        let (mut c, _) = controller();
        assert!(!c.push_intent(Intent::Jump));
        c.start(0.0).unwrap();
        assert!(c.handle_input(&InputAction::KeyDown {
            key: " ".into(),
            repeat: false,
        }));
        assert_eq!(c.start(1.0).unwrap_err(), SessionError::InvalidPhase {
            action: "start",
            phase: SessionPhase::Playing,
        });
    }

    #[test]
    fn test_host_game_type_overrides_config() {
        let mut options = SessionOptions::new("shop", 1);
        options.game_type = Some("orbit".into());
        let mut c = SessionController::new(options, Box::new(MemoryStore::new()));
        assert_eq!(c.ruleset().name, "orbit");

        c.load().unwrap();
        c.pump(&mut LocalBackend::new(RemoteConfig {
            game_type: Some("flyer".into()),
            ..Default::default()
        }));
        assert_eq!(c.ruleset().name, "orbit");
    }

    #[test]
    fn test_tier_feedback_tracks_score() {
        let (mut c, _) = controller();
        c.start(0.0).unwrap();
        feed(&mut c, 120);
        run_frames(&mut c, 0.0, 1);
        assert_eq!(c.current_tier().discount_percent, 5);
        assert_eq!(c.next_tier().unwrap().min_score, 250);
    }
}
