//! Browser host
//!
//! Mounts one widget on a canvas. The host owns the session controller, runs
//! the requestAnimationFrame loop, turns DOM input into controller input,
//! performs backend calls with fetch, and reports score and game end as DOM
//! `CustomEvent`s on the canvas.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    CustomEvent, CustomEventInit, Document, EventTarget, HtmlCanvasElement, KeyboardEvent,
    MouseEvent, Request, RequestInit, RequestMode, Response,
};

use crate::backend::{BackendRequest, FinishSessionResponse, GameData, StartSessionResponse};
use crate::config::RemoteConfig;
use crate::error::{BackendError, SessionError};
use crate::input::InputAction;
use crate::persistence::LocalStorageStore;
use crate::renderer::{CanvasPainter, RenderSnapshot};
use crate::session::{SessionController, SessionObserver, SessionOptions, SessionPhase};

/// Event fired after every tick, `detail` is the score
pub const SCORE_EVENT: &str = "discountarcade:score";
/// Event fired once per session, `detail` is `{ finalScore, gameData }`
pub const END_EVENT: &str = "discountarcade:end";

/// Canvas id mounted automatically on load
const AUTO_MOUNT_ID: &str = "discount-arcade";
const DEFAULT_API_BASE: &str = "/api";

type Shared = Rc<RefCell<WidgetHost>>;

thread_local! {
    static AUTO_MOUNTED: RefCell<Option<WidgetHandle>> = const { RefCell::new(None) };
}

/// A DOM listener that must be removed on teardown
struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    fn remove(&self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
    }
}

/// Dispatches controller notifications as DOM events
struct DomObserver {
    target: EventTarget,
}

impl DomObserver {
    fn dispatch(&self, kind: &str, detail: &JsValue) {
        let init = CustomEventInit::new();
        init.set_bubbles(true);
        init.set_detail(detail);
        match CustomEvent::new_with_event_init_dict(kind, &init) {
            Ok(event) => {
                let _ = self.target.dispatch_event(&event);
            }
            Err(err) => log::warn!("Failed to create {} event: {:?}", kind, err),
        }
    }
}

impl SessionObserver for DomObserver {
    fn on_score_update(&mut self, score: u64) {
        self.dispatch(SCORE_EVENT, &JsValue::from_f64(score as f64));
    }

    fn on_game_end(&mut self, final_score: u64, game_data: &GameData) {
        let detail = serde_json::json!({
            "finalScore": final_score,
            "gameData": game_data,
        });
        let detail = js_sys::JSON::parse(&detail.to_string()).unwrap_or(JsValue::NULL);
        self.dispatch(END_EVENT, &detail);
    }
}

pub struct WidgetHost {
    controller: SessionController,
    painter: CanvasPainter,
    canvas: HtmlCanvasElement,
    document: Document,
    api_base: String,
    raf_id: Option<i32>,
    listeners: Vec<Listener>,
    notice: Option<String>,
}

impl WidgetHost {
    /// Canvas client coordinates to playfield coordinates
    fn to_field(&self, client_x: i32, client_y: i32) -> Vec2 {
        let rect = self.canvas.get_bounding_client_rect();
        let field = self.controller.ruleset().field;
        let (w, h) = (rect.width().max(1.0), rect.height().max(1.0));
        // Painter scales uniformly from the top-left corner
        let scale = (w / field.x as f64).min(h / field.y as f64);
        Vec2::new(
            ((client_x as f64 - rect.left()) / scale) as f32,
            ((client_y as f64 - rect.top()) / scale) as f32,
        )
    }

    /// Match the canvas backing store to its laid-out size
    fn fit_canvas(&mut self) {
        let (w, h) = (self.canvas.client_width(), self.canvas.client_height());
        if w <= 0 || h <= 0 {
            return;
        }
        let (w, h) = (w as u32, h as u32);
        if self.canvas.width() != w || self.canvas.height() != h {
            self.canvas.set_width(w);
            self.canvas.set_height(h);
        }
        self.painter.resize(w, h);
    }

    /// Start a session if none is running. Returns true if one started.
    fn start_if_idle(&mut self) -> bool {
        if self.controller.phase() == SessionPhase::Playing {
            return false;
        }
        match self.controller.start(js_sys::Date::now()) {
            Ok(()) => {
                self.notice = None;
                true
            }
            Err(SessionError::PlayLimitReached(limit)) => {
                self.notice = Some(format!("Play limit reached ({})", limit));
                false
            }
            Err(err) => {
                log::warn!("Cannot start session: {}", err);
                false
            }
        }
    }

    fn input(&mut self, action: InputAction) {
        let starts = matches!(
            action,
            InputAction::PointerDown { .. } | InputAction::KeyDown { repeat: false, .. }
        );
        if starts && self.start_if_idle() {
            return;
        }
        self.controller.handle_input(&action);
    }

    fn paint(&self) {
        let Some(world) = self.controller.world() else {
            return;
        };
        let snapshot = RenderSnapshot::capture(world, self.controller.ruleset());
        if let Err(err) = self.painter.paint(&snapshot) {
            log::warn!("Paint failed: {:?}", err);
        }
    }

    fn set_text(&self, id: &str, text: &str) {
        if let Some(el) = self.document.get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }

    fn update_hud(&self) {
        let score = self.controller.score();
        self.set_text("da-score", &score.to_string());

        let tier = self.controller.current_tier();
        let discount = if tier.discount_percent > 0 {
            format!("{}% off", tier.discount_percent)
        } else {
            String::new()
        };
        self.set_text("da-discount", &discount);

        let tiers = &self.controller.config().discount_tiers;
        let next = match (self.controller.next_tier(), tiers.points_to_next(score)) {
            (Some(next), Some(points)) => {
                format!("{} more for {}% off", points, next.discount_percent)
            }
            _ => String::new(),
        };
        self.set_text("da-next", &next);

        let status = match (&self.notice, self.controller.phase(), self.controller.result()) {
            (Some(notice), _, _) => notice.clone(),
            (None, SessionPhase::Loading, _) => "Loading...".to_string(),
            (None, SessionPhase::Ended, Some(result)) => match &result.discount_code {
                Some(code) => format!("Your code: {}", code.code),
                None if result.discount_earned > 0 => "Fetching your code...".to_string(),
                None => "Tap to play again".to_string(),
            },
            (None, SessionPhase::Playing, _) => String::new(),
            _ => "Tap to play".to_string(),
        };
        self.set_text("da-status", &status);
    }

    /// Cancel the frame callback, remove listeners, stop the controller
    fn teardown(&mut self) {
        if let (Some(id), Some(window)) = (self.raf_id.take(), web_sys::window()) {
            let _ = window.cancel_animation_frame(id);
        }
        for listener in self.listeners.drain(..) {
            listener.remove();
        }
        self.controller.teardown();
    }
}

/// Handle returned to JavaScript
#[wasm_bindgen]
pub struct WidgetHandle {
    host: Shared,
}

#[wasm_bindgen]
impl WidgetHandle {
    /// Start a session (no-op while one is running)
    pub fn start(&self) {
        if let Ok(mut host) = self.host.try_borrow_mut() {
            host.start_if_idle();
        }
        flush_requests(&self.host);
    }

    /// End the running session on the next frame
    pub fn exit(&self) {
        if let Ok(mut host) = self.host.try_borrow_mut() {
            host.controller.request_exit();
        }
    }

    pub fn score(&self) -> f64 {
        self.host
            .try_borrow()
            .map(|h| h.controller.score() as f64)
            .unwrap_or(0.0)
    }

    /// Unmount: stops the frame loop and drops late network results
    pub fn destroy(&self) {
        match self.host.try_borrow_mut() {
            Ok(mut host) => host.teardown(),
            Err(_) => log::warn!("destroy() called re-entrantly, ignored"),
        }
    }
}

/// Mount the widget on the canvas with id `canvas_id`
#[wasm_bindgen]
pub fn mount(canvas_id: &str) -> Result<WidgetHandle, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let canvas: HtmlCanvasElement = document
        .get_element_by_id(canvas_id)
        .ok_or_else(|| JsValue::from_str("canvas not found"))?
        .dyn_into()?;

    // Backing store at device resolution
    let dpr = window.device_pixel_ratio();
    let (client_w, client_h) = (canvas.client_width(), canvas.client_height());
    if client_w > 0 && client_h > 0 {
        canvas.set_width((client_w as f64 * dpr) as u32);
        canvas.set_height((client_h as f64 * dpr) as u32);
    }

    let data = canvas.dataset();
    let shop_id = data.get("shopId").unwrap_or_else(|| "default".to_string());
    let api_base = data
        .get("apiBase")
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let mut options = SessionOptions::new(shop_id, js_sys::Date::now() as u64);
    options.source = data.get("source").unwrap_or_else(|| "widget".to_string());
    options.game_type = data.get("gameType");
    options.referrer = Some(document.referrer()).filter(|r| !r.is_empty());

    let mut controller = SessionController::new(options, Box::new(LocalStorageStore::new()));
    controller.set_observer(Box::new(DomObserver {
        target: canvas.clone().into(),
    }));
    if let Err(err) = controller.load() {
        log::warn!("Config load not started: {}", err);
    }

    let painter = CanvasPainter::new(&canvas)?;
    let host = Rc::new(RefCell::new(WidgetHost {
        controller,
        painter,
        canvas: canvas.clone(),
        document,
        api_base,
        raf_id: None,
        listeners: Vec::new(),
        notice: None,
    }));

    let listeners = install_listeners(&host, &canvas, &window);
    {
        let mut h = host.borrow_mut();
        h.listeners = listeners;
        h.fit_canvas();
    }
    flush_requests(&host);
    request_frame(&host);

    log::info!("Discount arcade mounted on #{}", canvas_id);
    Ok(WidgetHandle { host })
}

/// Mount on the default canvas if the page has one
pub fn launch() {
    let present = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(AUTO_MOUNT_ID))
        .is_some();
    if !present {
        log::info!("No #{} canvas, waiting for mount()", AUTO_MOUNT_ID);
        return;
    }
    match mount(AUTO_MOUNT_ID) {
        Ok(handle) => AUTO_MOUNTED.with(|slot| *slot.borrow_mut() = Some(handle)),
        Err(err) => log::error!("Failed to mount widget: {:?}", err),
    }
}

fn listen<E, F>(host: &Shared, target: &EventTarget, kind: &'static str, mut handler: F) -> Listener
where
    E: JsCast,
    F: FnMut(&mut WidgetHost, &E) + 'static,
{
    let host = host.clone();
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
        let Some(event) = event.dyn_ref::<E>() else {
            return;
        };
        // Input never lands while a frame holds the host
        match host.try_borrow_mut() {
            Ok(mut h) => handler(&mut h, event),
            Err(_) => log::debug!("Dropped {} during frame", kind),
        }
        flush_requests(&host);
    });
    let _ = target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
    Listener {
        target: target.clone(),
        kind,
        closure,
    }
}

fn install_listeners(
    host: &Shared,
    canvas: &HtmlCanvasElement,
    window: &web_sys::Window,
) -> Vec<Listener> {
    let canvas_target: &EventTarget = canvas.as_ref();
    let window_target: &EventTarget = window.as_ref();
    vec![
        listen(host, canvas_target, "pointerdown", |h, e: &MouseEvent| {
            let pos = h.to_field(e.client_x(), e.client_y());
            h.input(InputAction::PointerDown { pos });
        }),
        listen(host, canvas_target, "pointermove", |h, e: &MouseEvent| {
            let pos = h.to_field(e.client_x(), e.client_y());
            h.input(InputAction::PointerMove { pos });
        }),
        listen(host, window_target, "pointerup", |h, _e: &MouseEvent| {
            h.input(InputAction::PointerUp);
        }),
        listen(host, window_target, "keydown", |h, e: &KeyboardEvent| {
            let key = e.key();
            let playing = h.controller.phase() == SessionPhase::Playing;
            if playing && matches!(key.as_str(), " " | "ArrowUp" | "ArrowDown") {
                e.prevent_default();
            }
            h.input(InputAction::KeyDown {
                key,
                repeat: e.repeat(),
            });
        }),
        listen(host, window_target, "keyup", |h, e: &KeyboardEvent| {
            h.input(InputAction::KeyUp { key: e.key() });
        }),
        listen(host, window_target, "resize", |h, _e: &web_sys::Event| {
            h.fit_canvas();
        }),
    ]
}

fn request_frame(host: &Shared) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let next = host.clone();
    let callback = Closure::once_into_js(move |time: f64| on_frame(&next, time));
    match window.request_animation_frame(callback.unchecked_ref()) {
        Ok(id) => {
            if let Ok(mut h) = host.try_borrow_mut() {
                h.raf_id = Some(id);
            }
        }
        Err(err) => log::error!("requestAnimationFrame failed: {:?}", err),
    }
}

fn on_frame(host: &Shared, time: f64) {
    {
        let Ok(mut h) = host.try_borrow_mut() else {
            // Re-entrant frame: skip it, the outer one reschedules
            log::debug!("Frame re-entered, skipped");
            return;
        };
        h.raf_id = None;
        if !h.controller.is_active() {
            return;
        }
        h.controller.frame(time);
        h.paint();
        h.update_hud();
    }
    flush_requests(host);
    request_frame(host);
}

/// Send every queued backend request
fn flush_requests(host: &Shared) {
    let (requests, api_base) = match host.try_borrow_mut() {
        Ok(mut h) => (h.controller.take_requests(), h.api_base.clone()),
        Err(_) => return,
    };
    for request in requests {
        let host = host.clone();
        let api_base = api_base.clone();
        spawn_local(async move {
            let body = send(&api_base, &request).await;
            let Ok(mut h) = host.try_borrow_mut() else {
                log::warn!("Host busy, dropping {:?} completion", request.route().1);
                return;
            };
            match request {
                BackendRequest::FetchConfig { ticket, .. } => {
                    let result = body.and_then(|b| Ok(serde_json::from_str::<RemoteConfig>(&b)?));
                    h.controller.complete_config(ticket, result);
                }
                BackendRequest::StartSession { ticket, .. } => {
                    let result =
                        body.and_then(|b| Ok(serde_json::from_str::<StartSessionResponse>(&b)?));
                    h.controller.complete_session_start(ticket, result);
                }
                BackendRequest::FinishSession { ticket, .. } => {
                    let result =
                        body.and_then(|b| Ok(serde_json::from_str::<FinishSessionResponse>(&b)?));
                    h.controller.complete_session_finish(ticket, result);
                }
            }
            h.update_hud();
        });
    }
}

fn network_error(err: JsValue) -> BackendError {
    BackendError::Network(format!("{:?}", err))
}

/// Perform one collaborator call and return the response body
async fn send(api_base: &str, request: &BackendRequest) -> Result<String, BackendError> {
    let (method, path) = request.route();
    let init = RequestInit::new();
    init.set_method(method);
    init.set_mode(RequestMode::Cors);
    if let Some(body) = request.body_json()? {
        init.set_body(&JsValue::from_str(&body));
    }

    let url = format!("{}{}", api_base.trim_end_matches('/'), path);
    let req = Request::new_with_str_and_init(&url, &init).map_err(network_error)?;
    req.headers()
        .set("Content-Type", "application/json")
        .map_err(network_error)?;

    let window = web_sys::window().ok_or(BackendError::Unavailable)?;
    let response: Response = JsFuture::from(window.fetch_with_request(&req))
        .await
        .map_err(network_error)?
        .dyn_into()
        .map_err(network_error)?;
    if !response.ok() {
        return Err(BackendError::Status(response.status()));
    }

    let text = JsFuture::from(response.text().map_err(network_error)?)
        .await
        .map_err(network_error)?;
    text.as_string()
        .ok_or_else(|| BackendError::Decode("response body is not text".to_string()))
}
