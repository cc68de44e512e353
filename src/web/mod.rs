//! Browser entry point: [`ViewerHost`] wires the registry to wgpu and the
//! DOM and is the only type exported to JS.

mod binding;
mod gpu;
mod label_canvas;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use log::{debug, error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{EventTarget, HtmlCanvasElement, HtmlElement, PointerEvent};

use crate::config::{ViewerConfig, ViewerOptions};
use crate::error::ViewerError;
use crate::interaction::PointerInput;
use crate::performance::PerformanceClock;
use crate::registry::{InstanceParts, SelectCallback, ViewerRegistry};
use crate::render::Renderer;
use crate::utils;

pub use binding::{create_canvas, show_fallback, DomBinding, FrameClosure, PointerClosure};
pub use gpu::GpuRenderer;

use binding::pointer_input;

struct HostState {
    registry: ViewerRegistry<GpuRenderer>,
    /// Latest create issued per id; an older create finishing late is
    /// thrown away.
    generations: HashMap<String, u64>,
    next_generation: u64,
    /// Static fallbacks shown in place of a viewer, per id.
    fallbacks: HashMap<String, HtmlElement>,
}

type SharedState = Rc<RefCell<HostState>>;

impl HostState {
    fn begin(&mut self, id: &str) -> u64 {
        self.next_generation += 1;
        self.generations.insert(id.to_string(), self.next_generation);
        self.next_generation
    }

    fn is_current(&self, id: &str, generation: u64) -> bool {
        self.generations.get(id) == Some(&generation)
    }

    /// Ends a create, whatever its outcome, unless a newer one took over.
    fn finish(&mut self, id: &str, generation: u64) {
        if self.is_current(id, generation) {
            self.generations.remove(id);
        }
    }

    fn clear_fallback(&mut self, id: &str) {
        if let Some(fallback) = self.fallbacks.remove(id) {
            fallback.remove();
        }
    }

    /// Live viewer, fallback and any create in flight for `id`.
    fn destroy(&mut self, id: &str) -> bool {
        let pending = self.generations.remove(id).is_some();
        self.clear_fallback(id);
        self.registry.destroy(id) || pending
    }

    fn teardown(&mut self) {
        self.generations.clear();
        for (_, fallback) in self.fallbacks.drain() {
            fallback.remove();
        }
        self.registry.teardown();
    }
}

/// Runs `f` on the host state unless it is gone or already borrowed.
fn with_state<T>(state: &Weak<RefCell<HostState>>, f: impl FnOnce(&mut HostState) -> T) -> Option<T> {
    let state = state.upgrade()?;
    let Ok(mut guard) = state.try_borrow_mut() else {
        warn!("viewer host busy, event dropped");
        return None;
    };
    Some(f(&mut guard))
}

#[wasm_bindgen]
pub struct ViewerHost {
    state: SharedState,
}

#[wasm_bindgen]
impl ViewerHost {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ViewerHost, JsValue> {
        utils::init_logging();
        let clock = PerformanceClock::new().ok_or_else(|| JsValue::from_str("performance.now() unavailable"))?;
        Ok(Self {
            state: Rc::new(RefCell::new(HostState {
                registry: ViewerRegistry::new(Box::new(clock)),
                generations: HashMap::new(),
                next_generation: 0,
                fallbacks: HashMap::new(),
            })),
        })
    }

    /// Builds a viewer inside `container`. Resolves to `true` once the 3D
    /// viewer runs, `false` when the static fallback was shown instead.
    pub fn create(
        &self,
        container: HtmlElement,
        config: JsValue,
        instance_id: String,
        on_select: Option<js_sys::Function>,
    ) -> js_sys::Promise {
        let state = self.state.clone();
        future_to_promise(async move {
            let live = create_viewer(state, container, config, instance_id, on_select).await;
            Ok(JsValue::from_bool(live))
        })
    }

    pub fn pause(&self, instance_id: &str) -> bool {
        self.with_registry(|r| r.pause(instance_id)).unwrap_or(false)
    }

    pub fn resume(&self, instance_id: &str) -> bool {
        self.with_registry(|r| r.resume(instance_id)).unwrap_or(false)
    }

    pub fn resize(&self, instance_id: &str, width: u32, height: u32) -> bool {
        self.with_registry(|r| r.resize(instance_id, width, height)).unwrap_or(false)
    }

    /// Re-tints the viewer with the page's current theme colors.
    #[wasm_bindgen(js_name = updateTheme)]
    pub fn update_theme(&self, instance_id: &str, primary: &str, secondary: &str) -> bool {
        self.with_registry(|r| r.update_theme_css(instance_id, primary, secondary))
            .unwrap_or(false)
    }

    /// Also cancels a create still in flight for the id and removes a
    /// fallback shown for it.
    pub fn destroy(&self, instance_id: &str) -> bool {
        with_state(&Rc::downgrade(&self.state), |s| s.destroy(instance_id)).unwrap_or(false)
    }

    pub fn teardown(&self) {
        with_state(&Rc::downgrade(&self.state), HostState::teardown);
    }

    /// Rolling frame statistics, `undefined` for unknown ids.
    #[wasm_bindgen(js_name = frameStats)]
    pub fn frame_stats(&self, instance_id: &str) -> JsValue {
        self.with_registry(|r| r.stats(instance_id))
            .flatten()
            .and_then(|snapshot| serde_wasm_bindgen::to_value(&snapshot).ok())
            .unwrap_or(JsValue::UNDEFINED)
    }

    #[wasm_bindgen(js_name = instanceCount)]
    pub fn instance_count(&self) -> usize {
        self.with_registry(|r| r.len()).unwrap_or(0)
    }

    fn with_registry<T>(&self, f: impl FnOnce(&mut ViewerRegistry<GpuRenderer>) -> T) -> Option<T> {
        with_state(&Rc::downgrade(&self.state), |s| f(&mut s.registry))
    }
}

fn container_size(container: &HtmlElement) -> (u32, u32) {
    let rect = container.get_bounding_client_rect();
    (rect.width().round().max(1.0) as u32, rect.height().round().max(1.0) as u32)
}

/// Shows the static fallback for the create `generation`, replacing an
/// earlier one. Superseded creates show nothing.
fn fallback(state: &SharedState, id: &str, generation: u64, container: &HtmlElement, labels: &[String]) {
    let mut s = state.borrow_mut();
    if !s.is_current(id, generation) {
        return;
    }
    s.clear_fallback(id);
    match show_fallback(container, labels) {
        Ok(element) => {
            s.fallbacks.insert(id.to_string(), element);
        }
        Err(e) => error!("failed to show fallback: {e:?}"),
    }
}

async fn create_viewer(
    state: SharedState,
    container: HtmlElement,
    config: JsValue,
    id: String,
    on_select: Option<js_sys::Function>,
) -> bool {
    let generation = {
        let mut s = state.borrow_mut();
        s.destroy(&id);
        s.begin(&id)
    };
    let live = start_viewer(&state, &container, config, &id, generation, on_select).await;
    state.borrow_mut().finish(&id, generation);
    live
}

async fn start_viewer(
    state: &SharedState,
    container: &HtmlElement,
    config: JsValue,
    id: &str,
    generation: u64,
    on_select: Option<js_sys::Function>,
) -> bool {
    let options: ViewerOptions = match serde_wasm_bindgen::from_value(config) {
        Ok(options) => options,
        Err(e) => {
            error!("viewer {id}: invalid options: {e}");
            fallback(state, id, generation, container, &[]);
            return false;
        }
    };
    let labels: Vec<String> = options.segments.iter().map(|s| s.label.clone()).collect();
    let config = match ViewerConfig::from_options(&options) {
        Ok(config) => config,
        Err(e) => {
            error!("viewer {id}: {e}");
            fallback(state, id, generation, container, &labels);
            return false;
        }
    };

    let Some((window, document)) = web_sys::window().and_then(|w| w.document().map(|d| (w, d))) else {
        error!("viewer {id}: no document");
        return false;
    };
    let canvas = match create_canvas(&document, container) {
        Ok(canvas) => canvas,
        Err(e) => {
            error!("viewer {id}: failed to create canvas: {e:?}");
            fallback(state, id, generation, container, &labels);
            return false;
        }
    };

    let (width, height) = container_size(container);
    let mut renderer = match GpuRenderer::new(canvas.clone(), width, height).await {
        Ok(renderer) => renderer,
        Err(e) => {
            warn!("viewer {id}: {e}, showing fallback");
            canvas.remove();
            if e.wants_fallback() {
                fallback(state, id, generation, container, &labels);
            }
            return false;
        }
    };

    if !state.borrow().is_current(id, generation) || !container.is_connected() {
        debug!("viewer {id}: superseded or detached while starting, discarding");
        renderer.release_context();
        canvas.remove();
        return false;
    }

    let mut binding = match DomBinding::new(window, &document, canvas.clone()) {
        Ok(binding) => binding,
        Err(e) => {
            error!("viewer {id}: {e:?}");
            renderer.release_context();
            canvas.remove();
            fallback(state, id, generation, container, &labels);
            return false;
        }
    };
    let weak = Rc::downgrade(state);
    binding.set_frame_callback(frame_callback(weak.clone(), id.to_string(), container.clone()));
    let removed = {
        let weak = weak.clone();
        let id = id.to_string();
        move || destroy_later(weak.clone(), id.clone())
    };
    if let Err(e) = binding.watch_removal(&document, container.clone(), removed) {
        warn!("viewer {id}: cannot watch for container removal: {e:?}");
    }
    if config.interactive {
        if let Err(e) = attach_pointer_listeners(&mut binding, &weak, id, &canvas, &document) {
            warn!("viewer {id}: pointer listeners incomplete: {e:?}");
        }
    }

    let parts = InstanceParts {
        renderer,
        binding: Box::new(binding),
        width,
        height,
        on_select: on_select.map(select_callback),
    };

    let result = state.borrow_mut().registry.create(id, config, parts);
    match result {
        Ok(()) => true,
        Err(e) => {
            if matches!(e, ViewerError::BuildFailure(_) | ViewerError::ContextUnavailable(_)) {
                fallback(state, id, generation, container, &labels);
            }
            false
        }
    }
}

/// Destroys `id` on a microtask: the caller may be a closure the
/// instance owns.
fn destroy_later(state: Weak<RefCell<HostState>>, id: String) {
    spawn_local(async move {
        debug!("viewer {id}: container left the document");
        with_state(&state, |s| s.registry.destroy(&id));
    });
}

/// JS selection callbacks run on a microtask, after the registry borrow
/// is released, so they may call back into the host.
fn select_callback(function: js_sys::Function) -> SelectCallback {
    Box::new(move |label: &str| {
        let function = function.clone();
        let label = JsValue::from_str(label);
        spawn_local(async move {
            if let Err(e) = function.call1(&JsValue::NULL, &label) {
                warn!("onSelect threw: {e:?}");
            }
        });
    })
}

fn frame_callback(state: Weak<RefCell<HostState>>, id: String, container: HtmlElement) -> FrameClosure {
    Closure::new(move |_timestamp: f64| {
        if !container.is_connected() {
            destroy_later(state.clone(), id.clone());
            return;
        }
        with_state(&state, |s| s.registry.frame(&id));
    })
}

type PointerHandler = fn(&mut ViewerRegistry<GpuRenderer>, &str, PointerInput);

fn attach_pointer_listeners(
    binding: &mut DomBinding,
    state: &Weak<RefCell<HostState>>,
    id: &str,
    canvas: &HtmlCanvasElement,
    document: &web_sys::Document,
) -> Result<(), JsValue> {
    let on_canvas: [(&'static str, PointerHandler); 4] = [
        ("pointerdown", |r, id, input| {
            r.pointer_down(id, input);
        }),
        ("pointermove", |r, id, input| {
            r.pointer_move(id, input);
        }),
        ("pointerup", |r, id, input| {
            r.pointer_up(id, input);
        }),
        ("pointerleave", |r, id, _| {
            r.pointer_leave(id);
        }),
    ];
    let canvas_target: &EventTarget = canvas.as_ref();
    for (event, handler) in on_canvas {
        let closure = pointer_closure(state.clone(), id.to_string(), canvas.clone(), handler);
        binding.listen(canvas_target, event, closure)?;
    }

    let release = pointer_closure(state.clone(), id.to_string(), canvas.clone(), |r, id, _| {
        r.release_outside(id);
    });
    binding.listen(document.as_ref(), "pointerup", release)
}

fn pointer_closure(
    state: Weak<RefCell<HostState>>,
    id: String,
    canvas: HtmlCanvasElement,
    handler: PointerHandler,
) -> PointerClosure {
    Closure::new(move |event: PointerEvent| {
        let input = pointer_input(&canvas, &event);
        with_state(&state, |s| handler(&mut s.registry, &id, input));
    })
}
