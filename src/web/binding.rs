use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, EventTarget, HtmlCanvasElement, HtmlElement, MutationObserver, MutationObserverInit, PointerEvent, Window,
};

use crate::interaction::PointerInput;
use crate::render::HostBinding;
use crate::scheduler::FrameHandle;
use crate::tooltip::{self, TooltipView};

pub type PointerClosure = Closure<dyn FnMut(PointerEvent)>;
pub type FrameClosure = Closure<dyn FnMut(f64)>;
type MutationClosure = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: PointerClosure,
}

/// Watches the document for the container leaving it.
struct RemovalWatch {
    observer: MutationObserver,
    _callback: MutationClosure,
}

/// DOM side of one viewer: canvas, tooltip element, pointer listeners and
/// the animation-frame callback. The container is borrowed from the page.
pub struct DomBinding {
    window: Window,
    canvas: HtmlCanvasElement,
    tooltip: HtmlElement,
    tooltip_title: HtmlElement,
    tooltip_body: HtmlElement,
    listeners: Vec<Listener>,
    removal: Option<RemovalWatch>,
    frame_callback: Option<FrameClosure>,
}

fn create_html(document: &Document, tag: &str) -> Result<HtmlElement, JsValue> {
    document.create_element(tag)?.dyn_into::<HtmlElement>().map_err(JsValue::from)
}

/// Canvas filling `container`, appended to it.
pub fn create_canvas(document: &Document, container: &HtmlElement) -> Result<HtmlCanvasElement, JsValue> {
    let canvas = document.create_element("canvas")?.dyn_into::<HtmlCanvasElement>()?;
    canvas.set_class_name("viewer-canvas");
    let style = canvas.style();
    style.set_property("display", "block")?;
    style.set_property("width", "100%")?;
    style.set_property("height", "100%")?;
    style.set_property("touch-action", "none")?;
    style.set_property("cursor", "grab")?;
    container.append_child(&canvas)?;
    Ok(canvas)
}

/// Static list of the segment labels, shown when no GPU context can be
/// had. The caller owns the returned element and removes it again.
pub fn show_fallback(container: &HtmlElement, labels: &[String]) -> Result<HtmlElement, JsValue> {
    let document = container
        .owner_document()
        .ok_or_else(|| JsValue::from_str("container is not in a document"))?;
    let fallback = create_html(&document, "div")?;
    fallback.set_class_name("viewer-fallback");
    let list = create_html(&document, "ul")?;
    for label in labels {
        let item = create_html(&document, "li")?;
        item.set_text_content(Some(label));
        list.append_child(&item)?;
    }
    fallback.append_child(&list)?;
    container.append_child(&fallback)?;
    Ok(fallback)
}

/// Pointer position relative to the canvas plus the raw client position.
pub fn pointer_input(canvas: &HtmlCanvasElement, event: &PointerEvent) -> PointerInput {
    let rect = canvas.get_bounding_client_rect();
    let client_x = event.client_x() as f32;
    let client_y = event.client_y() as f32;
    PointerInput {
        x: client_x - rect.left() as f32,
        y: client_y - rect.top() as f32,
        client_x,
        client_y,
        buttons: event.buttons(),
    }
}

impl DomBinding {
    pub fn new(window: Window, document: &Document, canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let tooltip = create_html(document, "div")?;
        tooltip.set_class_name("viewer-tooltip");
        tooltip.set_attribute("role", "tooltip")?;
        let style = tooltip.style();
        style.set_property("position", "fixed")?;
        style.set_property("left", "0px")?;
        style.set_property("top", "0px")?;
        style.set_property("pointer-events", "none")?;
        style.set_property("z-index", "1000")?;
        style.set_property("opacity", "0")?;
        style.set_property("transform", "scale(0.96)")?;
        style.set_property("transition", "opacity 120ms ease, transform 120ms ease")?;

        let tooltip_title = create_html(document, "strong")?;
        let tooltip_body = create_html(document, "div")?;
        tooltip.append_child(&tooltip_title)?;
        tooltip.append_child(&tooltip_body)?;
        document
            .body()
            .ok_or_else(|| JsValue::from_str("document has no body"))?
            .append_child(&tooltip)?;

        Ok(Self {
            window,
            canvas,
            tooltip,
            tooltip_title,
            tooltip_body,
            listeners: Vec::new(),
            removal: None,
            frame_callback: None,
        })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn set_frame_callback(&mut self, callback: FrameClosure) {
        self.frame_callback = Some(callback);
    }

    pub fn listen(&mut self, target: &EventTarget, event: &'static str, closure: PointerClosure) -> Result<(), JsValue> {
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        self.listeners.push(Listener {
            target: target.clone(),
            event,
            closure,
        });
        Ok(())
    }

    /// Calls `on_removed` once a DOM mutation leaves `container` outside
    /// the document. Runs whether or not frames are being scheduled.
    pub fn watch_removal(
        &mut self,
        document: &Document,
        container: HtmlElement,
        mut on_removed: impl FnMut() + 'static,
    ) -> Result<(), JsValue> {
        let callback: MutationClosure = Closure::new(move |_records: js_sys::Array, _observer: MutationObserver| {
            if !container.is_connected() {
                on_removed();
            }
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        observer.observe_with_options(document, &options)?;
        self.removal = Some(RemovalWatch {
            observer,
            _callback: callback,
        });
        Ok(())
    }

    fn viewport(&self) -> [f32; 2] {
        let extent = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
        [extent(self.window.inner_width()), extent(self.window.inner_height())]
    }
}

impl HostBinding for DomBinding {
    fn request_frame(&mut self) -> Option<FrameHandle> {
        let callback = self.frame_callback.as_ref()?;
        match self.window.request_animation_frame(callback.as_ref().unchecked_ref()) {
            Ok(id) => Some(FrameHandle(id)),
            Err(e) => {
                warn!("requestAnimationFrame failed: {e:?}");
                None
            }
        }
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if let Err(e) = self.window.cancel_animation_frame(handle.0) {
            warn!("cancelAnimationFrame failed: {e:?}");
        }
    }

    fn show_tooltip(&mut self, view: &TooltipView) {
        self.tooltip_title.set_text_content(Some(&view.label));
        self.tooltip_body.set_text_content(view.text.as_deref());
        self.tooltip_body
            .style()
            .set_property("display", if view.text.is_some() { "block" } else { "none" })
            .ok();
        let style = self.tooltip.style();

        let size = [self.tooltip.offset_width() as f32, self.tooltip.offset_height() as f32];
        let [left, top] = tooltip::place(view.anchor, size, self.viewport());
        style.set_property("left", &format!("{left}px")).ok();
        style.set_property("top", &format!("{top}px")).ok();
        style.set_property("opacity", "1").ok();
        style.set_property("transform", "scale(1)").ok();
    }

    fn hide_tooltip(&mut self) {
        let style = self.tooltip.style();
        style.set_property("opacity", "0").ok();
        style.set_property("transform", "scale(0.96)").ok();
    }

    fn detach_listeners(&mut self) {
        for listener in self.listeners.drain(..) {
            if let Err(e) = listener
                .target
                .remove_event_listener_with_callback(listener.event, listener.closure.as_ref().unchecked_ref())
            {
                warn!("failed to remove {} listener: {e:?}", listener.event);
            }
        }
        if let Some(watch) = self.removal.take() {
            watch.observer.disconnect();
        }
        // The pending frame was cancelled before this point.
        self.frame_callback = None;
    }

    fn detach_canvas(&mut self) {
        self.tooltip.remove();
        self.canvas.remove();
    }
}
