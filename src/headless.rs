//! A renderer and host binding that draw nothing and record everything.
//! Drives the controller from a fixed-tick loop or a test: live resource
//! counts show leaks, the event log shows teardown order.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, ViewerError};
use crate::geometry::PointCloud;
use crate::label::LabelTexture;
use crate::registry::{InstanceParts, SelectCallback};
use crate::render::{
    GeometryHandle, GeometrySource, HostBinding, MaterialDesc, MaterialHandle, Renderer, SceneFrame, TextureHandle,
};
use crate::scheduler::FrameHandle;
use crate::tooltip::TooltipView;

/// Shared between a [`HeadlessRenderer`], its [`HeadlessBinding`] and
/// whoever wants to inspect them after the instance is gone.
#[derive(Debug, Default)]
pub struct HeadlessLog {
    events: RefCell<Vec<String>>,
    live_geometries: Cell<usize>,
    live_textures: Cell<usize>,
    live_materials: Cell<usize>,
    texture_uploads: Cell<usize>,
    frames_rendered: Cell<usize>,
    frames_requested: Cell<usize>,
    pending_frames: RefCell<Vec<FrameHandle>>,
    context_released: Cell<bool>,
    listeners_attached: Cell<bool>,
    canvas_attached: Cell<bool>,
    tooltip: RefCell<Option<TooltipView>>,
    last_highlight: Cell<Option<usize>>,
    last_wire_opacity: Cell<f32>,
    /// Allocations allowed before every further one fails.
    upload_limit: Cell<Option<usize>>,
    allocations: Cell<usize>,
}

impl HeadlessLog {
    pub fn new() -> Rc<Self> {
        let log = Self::default();
        log.listeners_attached.set(true);
        log.canvas_attached.set(true);
        Rc::new(log)
    }

    fn push(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn live_geometries(&self) -> usize {
        self.live_geometries.get()
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.get()
    }

    pub fn live_materials(&self) -> usize {
        self.live_materials.get()
    }

    /// Nothing left on the GPU side.
    pub fn is_clean(&self) -> bool {
        self.live_geometries() == 0 && self.live_textures() == 0 && self.live_materials() == 0
    }

    pub fn texture_uploads(&self) -> usize {
        self.texture_uploads.get()
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered.get()
    }

    pub fn frames_requested(&self) -> usize {
        self.frames_requested.get()
    }

    pub fn pending_frames(&self) -> Vec<FrameHandle> {
        self.pending_frames.borrow().clone()
    }

    pub fn context_released(&self) -> bool {
        self.context_released.get()
    }

    pub fn listeners_attached(&self) -> bool {
        self.listeners_attached.get()
    }

    pub fn canvas_attached(&self) -> bool {
        self.canvas_attached.get()
    }

    pub fn tooltip(&self) -> Option<TooltipView> {
        self.tooltip.borrow().clone()
    }

    pub fn last_highlight(&self) -> Option<usize> {
        self.last_highlight.get()
    }

    pub fn last_wire_opacity(&self) -> f32 {
        self.last_wire_opacity.get()
    }

    /// The device recovers: uploads succeed again.
    pub fn lift_upload_limit(&self) {
        self.upload_limit.set(None);
    }
}

pub struct HeadlessRenderer {
    log: Rc<HeadlessLog>,
    next_id: u32,
    geometries: HashMap<u32, usize>,
    textures: HashMap<u32, LabelTexture>,
    materials: HashMap<u32, MaterialDesc>,
    size: (u32, u32),
}

impl HeadlessRenderer {
    pub fn new(log: Rc<HeadlessLog>) -> Self {
        Self {
            log,
            next_id: 1,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            materials: HashMap::new(),
            size: (0, 0),
        }
    }

    /// Simulates a device that runs out of memory after `n` uploads,
    /// until [`HeadlessLog::lift_upload_limit`].
    pub fn failing_after(self, n: usize) -> Self {
        self.log.upload_limit.set(Some(n));
        self
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&LabelTexture> {
        self.textures.get(&handle.0)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&MaterialDesc> {
        self.materials.get(&handle.0)
    }

    /// Vertex count per live geometry.
    pub fn geometry_vertices(&self, handle: GeometryHandle) -> Option<usize> {
        self.geometries.get(&handle.0).copied()
    }

    fn allocate(&mut self) -> Result<u32> {
        let allocations = self.log.allocations.get();
        if self.log.upload_limit.get().is_some_and(|n| allocations >= n) {
            return Err(ViewerError::BuildFailure("out of device memory".into()));
        }
        self.log.allocations.set(allocations + 1);
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }
}

fn bump(cell: &Cell<usize>, up: bool) {
    cell.set(if up { cell.get() + 1 } else { cell.get().saturating_sub(1) });
}

impl Renderer for HeadlessRenderer {
    fn upload_geometry(&mut self, source: GeometrySource<'_>) -> Result<GeometryHandle> {
        let id = self.allocate()?;
        self.geometries.insert(id, source.vertex_count());
        bump(&self.log.live_geometries, true);
        Ok(GeometryHandle(id))
    }

    fn update_points(&mut self, handle: GeometryHandle, cloud: &PointCloud) -> Result<()> {
        match self.geometries.get(&handle.0) {
            Some(&count) if count == cloud.len() => Ok(()),
            Some(_) => Err(ViewerError::Render("point count changed".into())),
            None => Err(ViewerError::Render(format!("unknown geometry {}", handle.0))),
        }
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        if self.geometries.remove(&handle.0).is_some() {
            bump(&self.log.live_geometries, false);
            self.log.push("release_geometry");
        }
    }

    fn upload_texture(&mut self, label: &LabelTexture) -> Result<TextureHandle> {
        let id = self.allocate()?;
        self.textures.insert(id, label.clone());
        bump(&self.log.live_textures, true);
        bump(&self.log.texture_uploads, true);
        Ok(TextureHandle(id))
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle.0).is_some() {
            bump(&self.log.live_textures, false);
            self.log.push("release_texture");
        }
    }

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialHandle> {
        let id = self.allocate()?;
        self.materials.insert(id, *desc);
        bump(&self.log.live_materials, true);
        Ok(MaterialHandle(id))
    }

    fn set_material_texture(&mut self, material: MaterialHandle, texture: Option<TextureHandle>) -> Result<()> {
        let desc = self
            .materials
            .get_mut(&material.0)
            .ok_or_else(|| ViewerError::Render(format!("unknown material {}", material.0)))?;
        desc.texture = texture;
        Ok(())
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        if self.materials.remove(&handle.0).is_some() {
            bump(&self.log.live_materials, false);
            self.log.push("release_material");
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn render(&mut self, frame: &SceneFrame<'_>) -> Result<()> {
        if self.log.context_released() {
            return Err(ViewerError::Render("context lost".into()));
        }
        bump(&self.log.frames_rendered, true);
        self.log.last_highlight.set(frame.highlight);
        self.log.last_wire_opacity.set(frame.wire_opacity);
        Ok(())
    }

    fn release_context(&mut self) {
        self.log.context_released.set(true);
        self.log.push("release_context");
    }
}

pub struct HeadlessBinding {
    log: Rc<HeadlessLog>,
    next_frame: i32,
}

impl HeadlessBinding {
    pub fn new(log: Rc<HeadlessLog>) -> Self {
        Self { log, next_frame: 1 }
    }
}

impl HostBinding for HeadlessBinding {
    fn request_frame(&mut self) -> Option<FrameHandle> {
        let handle = FrameHandle(self.next_frame);
        self.next_frame += 1;
        bump(&self.log.frames_requested, true);
        let mut pending = self.log.pending_frames.borrow_mut();
        // A host delivers at most one callback per request; older ones fired.
        pending.clear();
        pending.push(handle);
        Some(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.log.pending_frames.borrow_mut().retain(|h| *h != handle);
        self.log.push("cancel_frame");
    }

    fn show_tooltip(&mut self, view: &TooltipView) {
        *self.log.tooltip.borrow_mut() = Some(view.clone());
    }

    fn hide_tooltip(&mut self) {
        *self.log.tooltip.borrow_mut() = None;
    }

    fn detach_listeners(&mut self) {
        self.log.listeners_attached.set(false);
        self.log.push("detach_listeners");
    }

    fn detach_canvas(&mut self) {
        self.log.canvas_attached.set(false);
        self.log.push("detach_canvas");
    }
}

/// Parts for one headless instance sharing `log`.
pub fn parts(log: &Rc<HeadlessLog>, width: u32, height: u32) -> InstanceParts<HeadlessRenderer> {
    InstanceParts {
        renderer: HeadlessRenderer::new(log.clone()),
        binding: Box::new(HeadlessBinding::new(log.clone())),
        width,
        height,
        on_select: None,
    }
}

/// Like [`parts`], with a selection callback.
pub fn parts_with_callback(
    log: &Rc<HeadlessLog>,
    width: u32,
    height: u32,
    on_select: SelectCallback,
) -> InstanceParts<HeadlessRenderer> {
    InstanceParts {
        on_select: Some(on_select),
        ..parts(log, width, height)
    }
}
