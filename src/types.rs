use cgmath::prelude::*;

/// Vertex of the solid shape: position, normal for the directional light,
/// and texture coordinates for the face label.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Vertex of the wireframe overlay. Its color comes from the frame uniforms
/// so a theme change never touches the buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
}

/// One point of the cloud, drawn as an instanced billboard.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointInstance {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub scale: f32,
    pub _padding: f32, // Ensure 16-byte alignment for GPU
}

impl PointInstance {
    pub fn new(position: [f32; 3], color: [f32; 3], scale: f32) -> Self {
        Self {
            position,
            color,
            scale,
            _padding: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    /// xyz: direction towards the light, w: directional intensity.
    pub light: [f32; 4],
    /// rgb: wireframe color, a: wireframe opacity.
    pub wire: [f32; 4],
    /// x: ambient intensity, y: glow (0..1), zw: viewport size in px.
    pub params: [f32; 4],
}

impl Uniforms {
    pub fn new() -> Self {
        Self {
            view_proj: cgmath::Matrix4::identity().into(),
            model: cgmath::Matrix4::identity().into(),
            light: [0.0, 0.0, 1.0, 1.0],
            wire: [1.0, 1.0, 1.0, 0.3],
            params: [0.6, 0.0, 1.0, 1.0],
        }
    }

    pub fn update_view_proj(&mut self, view_proj: cgmath::Matrix4<f32>) {
        self.view_proj = view_proj.into();
    }

    pub fn update_model(&mut self, model: cgmath::Matrix4<f32>) {
        self.model = model.into();
    }
}

impl Default for Uniforms {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-material block: face tint plus flags.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniforms {
    /// rgb: base color, a: opacity.
    pub color: [f32; 4],
    /// x: 1 when a label texture is bound, y: 1 when highlighted.
    pub flags: [f32; 4],
}
