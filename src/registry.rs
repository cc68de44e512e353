//! Caller-owned registry of live viewers, keyed by an opaque instance id.
//!
//! Every public operation takes the id and is a silent no-op (returning
//! `false`) for ids that are not registered, so a page can fire `pause`,
//! `resize` or `destroy` at a card that already went away.

use std::collections::HashMap;

use log::{debug, error, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::builder::RootObject;
use crate::camera::Camera;
use crate::color::ThemeColors;
use crate::config::{Segment, Tuning, ViewerConfig};
use crate::disposal::dispose_instance;
use crate::error::{Result, ViewerError};
use crate::interaction::{InteractionController, InteractionState, PointerInput, TooltipUpdate};
use crate::performance::{warn_if_slow, Clock, FrameSnapshot, FrameStats};
use crate::raycast::{self, Hit};
use crate::render::{HostBinding, Renderer, SceneFrame};
use crate::scheduler::{Motion, RenderScheduler};
use crate::theme::apply_theme;
use crate::tooltip::TooltipView;

/// Wireframe opacity at rest and the extra amount added while hovered.
const WIRE_OPACITY: f32 = 0.3;
const WIRE_GLOW: f32 = 0.5;

pub type SelectCallback = Box<dyn FnMut(&str)>;

/// What the host hands over when creating an instance.
pub struct InstanceParts<R> {
    pub renderer: R,
    pub binding: Box<dyn HostBinding>,
    pub width: u32,
    pub height: u32,
    pub on_select: Option<SelectCallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    Throttled,
    Paused,
    Missing,
}

pub struct ViewerInstance<R: Renderer> {
    pub(crate) id: String,
    pub(crate) config: ViewerConfig,
    pub(crate) renderer: R,
    pub(crate) binding: Box<dyn HostBinding>,
    pub(crate) root: RootObject,
    pub(crate) camera: Camera,
    pub(crate) motion: Motion,
    pub(crate) interaction: InteractionController,
    pub(crate) scheduler: RenderScheduler,
    pub(crate) stats: FrameStats,
    pub(crate) on_select: Option<SelectCallback>,
    pub(crate) tuning: Tuning,
    pub(crate) disposed: bool,
}

impl<R: Renderer> ViewerInstance<R> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn segments(&self) -> &[Segment] {
        &self.config.segments
    }

    pub fn theme(&self) -> &ThemeColors {
        &self.config.theme
    }

    pub fn root(&self) -> &RootObject {
        &self.root
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn state(&self) -> InteractionState {
        self.interaction.state()
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn is_visible(&self) -> bool {
        self.scheduler.is_visible()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.scheduler.has_pending()
    }

    fn pick(&self, x: f32, y: f32) -> Option<Hit> {
        let ray = self.camera.ray_through(x, y)?;
        raycast::cast(&ray, &self.root.mesh, &self.motion.model(), self.root.layout)
    }

    fn present_tooltip(&mut self, update: TooltipUpdate, input: PointerInput) {
        let segment = match update {
            TooltipUpdate::Unchanged => return,
            TooltipUpdate::Hide => {
                self.binding.hide_tooltip();
                return;
            }
            TooltipUpdate::Show { segment } => Some(segment),
            TooltipUpdate::Follow => self.interaction.hovered(),
        };
        let Some(segment) = segment.and_then(|i| self.config.segments.get(i)) else {
            return;
        };
        let view = TooltipView {
            label: segment.label.clone(),
            text: segment.tooltip.clone(),
            anchor: [input.client_x, input.client_y],
        };
        self.binding.show_tooltip(&view);
    }

    /// Re-runs the hover pick at the last pointer position, for when the
    /// shape turned under a pointer that did not move.
    fn refresh_hover(&mut self) {
        let Some(input) = self.interaction.hover_pointer() else {
            return;
        };
        let hit = self.pick(input.x, input.y);
        let update = self.interaction.pointer_move(input, hit, &mut self.motion);
        self.present_tooltip(update, input);
    }

    fn schedule_next(&mut self) {
        if !self.scheduler.has_pending() {
            let handle = self.binding.request_frame();
            self.scheduler.set_pending(handle);
        }
    }

    fn render(&mut self) -> Result<()> {
        let materials = self.root.material_handles();
        let (Some(mesh), Some(wireframe)) = (self.root.mesh_handle, self.root.wireframe_handle) else {
            return Err(ViewerError::Render("scene already disposed".into()));
        };
        let frame = SceneFrame {
            view_proj: self.camera.view_proj(),
            model: self.motion.model(),
            viewport: [self.camera.width, self.camera.height],
            mesh,
            groups: &self.root.mesh.groups,
            materials: &materials,
            highlight: self.interaction.hovered(),
            wireframe,
            wire_color: self.config.theme.primary,
            wire_opacity: WIRE_OPACITY + WIRE_GLOW * self.interaction.glow(),
            glow: self.interaction.glow(),
            points: self.root.points_handle,
            lighting: self.root.lighting,
        };
        self.renderer.render(&frame)
    }
}

/// 64-bit FNV-1a. Seeds must not change between toolchains.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Deterministic per-id starting orientation so previews side by side do
/// not spin in lockstep.
fn initial_motion(id: &str, config: &ViewerConfig) -> Motion {
    if let Some([x, y]) = config.initial_rotation {
        return Motion::new(x, y);
    }
    let mut rng = StdRng::seed_from_u64(fnv1a(id.as_bytes()));
    Motion::new(rng.gen_range(-0.6..0.6), rng.gen_range(0.0..std::f32::consts::TAU))
}

pub struct ViewerRegistry<R: Renderer> {
    instances: HashMap<String, ViewerInstance<R>>,
    clock: Box<dyn Clock>,
    tuning: Tuning,
}

impl<R: Renderer> ViewerRegistry<R> {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_tuning(clock, Tuning::default())
    }

    pub fn with_tuning(clock: Box<dyn Clock>, tuning: Tuning) -> Self {
        Self {
            instances: HashMap::new(),
            clock,
            tuning,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ViewerInstance<R>> {
        self.instances.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }

    /// Builds and registers a viewer, replacing (and fully destroying) any
    /// previous instance with the same id. On failure nothing is
    /// registered and the parts are released.
    pub fn create(&mut self, id: &str, config: ViewerConfig, parts: InstanceParts<R>) -> Result<()> {
        self.destroy(id);

        let started = self.clock.now_ms();
        let InstanceParts {
            mut renderer,
            mut binding,
            width,
            height,
            on_select,
        } = parts;

        let root = match RootObject::build(&config, &mut renderer) {
            Ok(root) => root,
            Err(e) => {
                error!("viewer {id}: {e}");
                binding.detach_listeners();
                renderer.release_context();
                binding.detach_canvas();
                return Err(e);
            }
        };
        renderer.resize(width, height);

        let motion = initial_motion(id, &config);
        let mut instance = ViewerInstance {
            id: id.to_string(),
            camera: Camera::new(width as f32, height as f32),
            renderer,
            binding,
            root,
            motion,
            interaction: InteractionController::new(self.tuning),
            scheduler: RenderScheduler::new(self.tuning.target_fps),
            stats: FrameStats::new(),
            on_select,
            tuning: self.tuning,
            disposed: false,
            config,
        };
        instance.schedule_next();

        warn_if_slow("create", id, self.clock.now_ms() - started, self.tuning.build_budget_ms);
        debug!("created viewer {id}");
        self.instances.insert(id.to_string(), instance);
        Ok(())
    }

    /// Tears the instance down and forgets it. Unknown ids are a no-op.
    pub fn destroy(&mut self, id: &str) -> bool {
        let Some(instance) = self.instances.get_mut(id) else {
            debug!("destroy: no viewer {id}");
            return false;
        };
        dispose_instance(instance);
        self.instances.remove(id);
        true
    }

    /// Destroys every instance.
    pub fn teardown(&mut self) {
        for id in self.ids() {
            self.destroy(&id);
        }
    }

    /// Stops rendering and rotation; GPU resources stay allocated.
    pub fn pause(&mut self, id: &str) -> bool {
        let Some(instance) = self.instances.get_mut(id) else {
            return false;
        };
        if let Some(frame) = instance.scheduler.pause() {
            instance.binding.cancel_frame(frame);
        }
        true
    }

    pub fn resume(&mut self, id: &str) -> bool {
        let Some(instance) = self.instances.get_mut(id) else {
            return false;
        };
        if !instance.scheduler.is_visible() {
            instance.scheduler.resume();
        }
        instance.schedule_next();
        true
    }

    pub fn resize(&mut self, id: &str, width: u32, height: u32) -> bool {
        let Some(instance) = self.instances.get_mut(id) else {
            return false;
        };
        if instance.camera.set_viewport(width as f32, height as f32) {
            instance.renderer.resize(width, height);
        }
        true
    }

    /// Re-tints materials in place. Same colors twice is a no-op.
    pub fn update_theme(&mut self, id: &str, theme: ThemeColors) -> bool {
        let Some(instance) = self.instances.get_mut(id) else {
            return false;
        };
        if instance.config.theme == theme {
            return true;
        }
        // Faces already in the new colors are skipped, so a failed update
        // can be retried with the same theme.
        match apply_theme(&mut instance.root, &instance.config.segments, &theme, &mut instance.renderer) {
            Ok(replaced) => {
                debug!("viewer {id}: theme applied, {replaced} textures replaced");
                instance.config.theme = theme;
            }
            Err(e) => warn!("viewer {id}: theme update incomplete: {e}"),
        }
        true
    }

    /// CSS-string flavor of [`update_theme`](Self::update_theme); unparsable
    /// colors keep the current theme.
    pub fn update_theme_css(&mut self, id: &str, primary: &str, secondary: &str) -> bool {
        match ThemeColors::parse(primary, secondary) {
            Ok(theme) => self.update_theme(id, theme),
            Err(e) => {
                warn!("viewer {id}: {e}");
                false
            }
        }
    }

    pub fn pick(&self, id: &str, x: f32, y: f32) -> Option<Hit> {
        self.instances.get(id)?.pick(x, y)
    }

    pub fn pointer_down(&mut self, id: &str, input: PointerInput) -> bool {
        let Some(instance) = self.interactive_mut(id) else {
            return false;
        };
        let hit = instance.pick(input.x, input.y);
        let update = instance.interaction.pointer_down(input, hit, &mut instance.motion);
        instance.present_tooltip(update, input);
        true
    }

    pub fn pointer_move(&mut self, id: &str, input: PointerInput) -> bool {
        let Some(instance) = self.interactive_mut(id) else {
            return false;
        };
        let hit = if instance.interaction.is_dragging() {
            None
        } else {
            instance.pick(input.x, input.y)
        };
        let update = instance.interaction.pointer_move(input, hit, &mut instance.motion);
        instance.present_tooltip(update, input);
        true
    }

    /// Ends a drag; a release that qualifies as a click selects the segment
    /// under the pointer and returns its label.
    pub fn pointer_up(&mut self, id: &str, input: PointerInput) -> Option<String> {
        let now = self.clock.now_ms();
        let instance = self.interactive_mut(id)?;
        let hit = instance.pick(input.x, input.y);
        let segment = instance.interaction.pointer_up(hit, &instance.motion, now)?;
        let label = instance.config.segments.get(segment)?.label.clone();
        debug!("viewer {id}: selected {label:?}");
        if let Some(callback) = instance.on_select.as_mut() {
            callback(&label);
        }
        Some(label)
    }

    pub fn pointer_leave(&mut self, id: &str) -> bool {
        let now = self.clock.now_ms();
        let Some(instance) = self.interactive_mut(id) else {
            return false;
        };
        let update = instance.interaction.pointer_leave(now);
        instance.present_tooltip(update, PointerInput::default());
        true
    }

    /// Release caught outside the canvas (document-level listener).
    pub fn release_outside(&mut self, id: &str) -> bool {
        let now = self.clock.now_ms();
        let Some(instance) = self.interactive_mut(id) else {
            return false;
        };
        if instance.interaction.is_dragging() {
            instance.interaction.pointer_leave(now);
        }
        true
    }

    /// Runs one frame callback: throttle, advance motion, render,
    /// reschedule. Paused instances are not rescheduled.
    pub fn frame(&mut self, id: &str) -> FrameOutcome {
        let now = self.clock.now_ms();
        let Some(instance) = self.instances.get_mut(id) else {
            return FrameOutcome::Missing;
        };
        // The callback that brought us here has fired.
        instance.scheduler.set_pending(None);

        if !instance.scheduler.is_visible() {
            return FrameOutcome::Paused;
        }
        if !instance.scheduler.admit(now) {
            instance.stats.record_throttled();
            instance.schedule_next();
            return FrameOutcome::Throttled;
        }

        instance.interaction.poll(now);
        if !instance.interaction.is_dragging() && !instance.motion.velocity.is_zero() {
            instance.motion.damp(&instance.tuning);
            if instance.interaction.state() == InteractionState::Hovering {
                instance.refresh_hover();
            }
        }
        if instance.config.animated && instance.interaction.auto_rotation_active() {
            instance.motion.auto_rotate(&instance.tuning);
        }

        if let Err(e) = instance.render() {
            warn!("viewer {id}: {e}");
        }
        instance.stats.record_frame(now);
        instance.schedule_next();
        FrameOutcome::Rendered
    }

    pub fn stats(&self, id: &str) -> Option<FrameSnapshot> {
        Some(self.instances.get(id)?.stats.snapshot())
    }

    fn interactive_mut(&mut self, id: &str) -> Option<&mut ViewerInstance<R>> {
        self.instances.get_mut(id).filter(|i| i.config.interactive)
    }
}

impl<R: Renderer> Drop for ViewerRegistry<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_hash_matches_reference_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
    }
}
