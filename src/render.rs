//! The seams between the platform-neutral controller and whatever draws
//! and hosts it: [`Renderer`] owns GPU resources, [`HostBinding`] owns the
//! per-instance host attachments (frame callbacks, listeners, canvas).

use std::ops::Range;

use cgmath::Matrix4;

use crate::color::Rgb;
use crate::error::Result;
use crate::geometry::{LineSet, Mesh, PointCloud};
use crate::label::LabelTexture;
use crate::scheduler::FrameHandle;
use crate::tooltip::TooltipView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u32);

#[derive(Debug, Clone, Copy)]
pub enum GeometrySource<'a> {
    Mesh(&'a Mesh),
    Lines(&'a LineSet),
    Points(&'a PointCloud),
}

impl GeometrySource<'_> {
    pub fn vertex_count(&self) -> usize {
        match self {
            GeometrySource::Mesh(m) => m.vertices.len(),
            GeometrySource::Lines(l) => l.vertices.len(),
            GeometrySource::Points(p) => p.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialDesc {
    pub color: Rgb,
    pub opacity: f32,
    pub texture: Option<TextureHandle>,
}

/// Ambient term plus one directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: f32,
    pub direction: [f32; 3],
    pub intensity: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0.6,
            direction: [0.5, 0.8, 1.0],
            intensity: 0.8,
        }
    }
}

/// Everything needed to draw one frame of one instance.
#[derive(Debug, Clone)]
pub struct SceneFrame<'a> {
    pub view_proj: Matrix4<f32>,
    pub model: Matrix4<f32>,
    pub viewport: [f32; 2],
    pub mesh: GeometryHandle,
    /// Index ranges, aligned with `materials`.
    pub groups: &'a [Range<u32>],
    pub materials: &'a [MaterialHandle],
    pub highlight: Option<usize>,
    pub wireframe: GeometryHandle,
    pub wire_color: Rgb,
    pub wire_opacity: f32,
    pub glow: f32,
    pub points: Option<GeometryHandle>,
    pub lighting: Lighting,
}

/// GPU side of one instance. Every handle returned here is released
/// exactly once by the disposal path.
pub trait Renderer {
    fn upload_geometry(&mut self, source: GeometrySource<'_>) -> Result<GeometryHandle>;

    /// Rewrites point colors in place; the point count must not change.
    fn update_points(&mut self, handle: GeometryHandle, cloud: &PointCloud) -> Result<()>;

    fn release_geometry(&mut self, handle: GeometryHandle);

    fn upload_texture(&mut self, label: &LabelTexture) -> Result<TextureHandle>;

    fn release_texture(&mut self, handle: TextureHandle);

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialHandle>;

    fn set_material_texture(&mut self, material: MaterialHandle, texture: Option<TextureHandle>) -> Result<()>;

    fn release_material(&mut self, handle: MaterialHandle);

    fn resize(&mut self, width: u32, height: u32);

    fn render(&mut self, frame: &SceneFrame<'_>) -> Result<()>;

    /// Drops the device and forces the host to give the context back.
    fn release_context(&mut self);
}

/// Host side of one instance.
pub trait HostBinding {
    /// Schedules the next frame callback, `None` if the host cannot.
    fn request_frame(&mut self) -> Option<FrameHandle>;

    fn cancel_frame(&mut self, handle: FrameHandle);

    fn show_tooltip(&mut self, view: &TooltipView);

    fn hide_tooltip(&mut self);

    /// Removes every listener registered for this instance, including
    /// document-level ones.
    fn detach_listeners(&mut self);

    /// Removes the canvas (and tooltip element) from the document. The
    /// container itself is borrowed and left alone.
    fn detach_canvas(&mut self);
}
