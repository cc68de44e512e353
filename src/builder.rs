//! Builds the renderable root object: solid mesh with one material per
//! segment, wireframe overlay, optional point cloud, lighting.

use log::debug;

use crate::color::Rgb;
use crate::config::{ShapeKind, ViewerConfig, CUBE_FACES};
use crate::error::{Result, ViewerError};
use crate::geometry::{self, LineSet, Mesh, PointCloud, SegmentLayout, SHAPE_RADIUS};
use crate::label::LabelTexture;
use crate::render::{
    GeometryHandle, GeometrySource, Lighting, MaterialDesc, MaterialHandle, Renderer, TextureHandle,
};

const CUBE_OPACITY: f32 = 0.92;
const SPHERE_OPACITY: f32 = 0.35;
const POINT_SCALE: f32 = 0.035;

/// Material of one segment, index-aligned with the config's segments.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMaterial {
    pub material: MaterialHandle,
    pub texture: Option<TextureHandle>,
    /// Layout the current texture was generated from.
    pub label: Option<LabelTexture>,
    pub base: Rgb,
}

#[derive(Debug)]
pub struct RootObject {
    pub shape: ShapeKind,
    pub mesh: Mesh,
    pub layout: SegmentLayout,
    pub materials: Vec<SegmentMaterial>,
    pub wireframe: LineSet,
    pub points: Option<PointCloud>,
    pub lighting: Lighting,
    pub label_px: u32,
    pub(crate) mesh_handle: Option<GeometryHandle>,
    pub(crate) wireframe_handle: Option<GeometryHandle>,
    pub(crate) points_handle: Option<GeometryHandle>,
}

/// Handles created so far, released if the build fails halfway.
#[derive(Default)]
struct Staged {
    geometries: Vec<GeometryHandle>,
    textures: Vec<TextureHandle>,
    materials: Vec<MaterialHandle>,
}

impl Staged {
    fn release(self, renderer: &mut impl Renderer) {
        for m in self.materials {
            renderer.release_material(m);
        }
        for t in self.textures {
            renderer.release_texture(t);
        }
        for g in self.geometries {
            renderer.release_geometry(g);
        }
    }
}

impl RootObject {
    pub fn build<R: Renderer>(config: &ViewerConfig, renderer: &mut R) -> Result<RootObject> {
        let mut staged = Staged::default();
        match Self::build_staged(config, renderer, &mut staged) {
            Ok(root) => Ok(root),
            Err(e) => {
                staged.release(renderer);
                Err(match e {
                    ViewerError::BuildFailure(_) => e,
                    other => ViewerError::BuildFailure(other.to_string()),
                })
            }
        }
    }

    fn build_staged<R: Renderer>(config: &ViewerConfig, renderer: &mut R, staged: &mut Staged) -> Result<RootObject> {
        let budget = config.budget();
        let (mut mesh, wireframe, points) = match config.shape {
            ShapeKind::Cube => {
                let mesh = geometry::cube(SHAPE_RADIUS);
                (mesh, geometry::cube_edges(SHAPE_RADIUS), None)
            }
            ShapeKind::Icosphere => {
                let mesh = geometry::icosphere(SHAPE_RADIUS, budget.icosphere_detail);
                let edges = geometry::mesh_edges(&mesh);
                let cloud = geometry::fibonacci_points(
                    config.resolved_point_count(),
                    SHAPE_RADIUS,
                    POINT_SCALE,
                    &config.theme,
                );
                (mesh, edges, Some(cloud))
            }
        };

        let capacity = match config.shape {
            ShapeKind::Cube => CUBE_FACES,
            ShapeKind::Icosphere => mesh.triangle_count(),
        };
        config.validate(capacity)?;

        let layout = SegmentLayout::new(mesh.triangle_count(), config.segments.len());
        mesh.assign_groups(layout);

        let mut materials = Vec::with_capacity(config.segments.len());
        for segment in &config.segments {
            let material = match config.shape {
                ShapeKind::Cube => {
                    let label = LabelTexture::new(&segment.label, segment.color, &config.theme, budget.label_texture_px);
                    let texture = renderer.upload_texture(&label)?;
                    staged.textures.push(texture);
                    let material = renderer.create_material(&MaterialDesc {
                        color: segment.color,
                        opacity: CUBE_OPACITY,
                        texture: Some(texture),
                    })?;
                    staged.materials.push(material);
                    SegmentMaterial {
                        material,
                        texture: Some(texture),
                        label: Some(label),
                        base: segment.color,
                    }
                }
                ShapeKind::Icosphere => {
                    let material = renderer.create_material(&MaterialDesc {
                        color: segment.color,
                        opacity: SPHERE_OPACITY,
                        texture: None,
                    })?;
                    staged.materials.push(material);
                    SegmentMaterial {
                        material,
                        texture: None,
                        label: None,
                        base: segment.color,
                    }
                }
            };
            materials.push(material);
        }

        let mesh_handle = renderer.upload_geometry(GeometrySource::Mesh(&mesh))?;
        staged.geometries.push(mesh_handle);
        let wireframe_handle = renderer.upload_geometry(GeometrySource::Lines(&wireframe))?;
        staged.geometries.push(wireframe_handle);
        let points_handle = match &points {
            Some(cloud) => {
                let h = renderer.upload_geometry(GeometrySource::Points(cloud))?;
                staged.geometries.push(h);
                Some(h)
            }
            None => None,
        };

        debug!(
            "built {:?}: {} triangles, {} materials, {} points",
            config.shape,
            mesh.triangle_count(),
            materials.len(),
            points.as_ref().map_or(0, PointCloud::len)
        );

        Ok(RootObject {
            shape: config.shape,
            mesh,
            layout,
            materials,
            wireframe,
            points,
            lighting: Lighting::default(),
            label_px: budget.label_texture_px,
            mesh_handle: Some(mesh_handle),
            wireframe_handle: Some(wireframe_handle),
            points_handle,
        })
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn material_handles(&self) -> Vec<MaterialHandle> {
        self.materials.iter().map(|m| m.material).collect()
    }

    /// Vertices across mesh, wireframe and point cloud.
    pub fn vertex_count(&self) -> usize {
        self.mesh.vertices.len() + self.wireframe.vertices.len() + self.points.as_ref().map_or(0, PointCloud::len)
    }

    pub fn is_disposed(&self) -> bool {
        self.mesh_handle.is_none()
    }

    /// Releases every geometry, material and texture. Safe to repeat.
    pub fn dispose(&mut self, renderer: &mut impl Renderer) {
        for m in self.materials.drain(..) {
            renderer.release_material(m.material);
            if let Some(t) = m.texture {
                renderer.release_texture(t);
            }
        }
        for handle in [
            self.mesh_handle.take(),
            self.wireframe_handle.take(),
            self.points_handle.take(),
        ]
        .into_iter()
        .flatten()
        {
            renderer.release_geometry(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ThemeColors;
    use crate::config::{Segment, SizeClass};
    use crate::headless::{HeadlessLog, HeadlessRenderer};

    fn cube_config() -> ViewerConfig {
        let segments = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|l| Segment::new(*l, Rgb::new(0.2, 0.3, 0.4)))
            .collect();
        ViewerConfig::new(
            ShapeKind::Cube,
            SizeClass::Small,
            segments,
            ThemeColors::new(Rgb::WHITE, Rgb::BLACK),
        )
    }

    #[test]
    fn cube_has_one_labeled_material_per_face() {
        let log = HeadlessLog::new();
        let mut renderer = HeadlessRenderer::new(log.clone());
        let root = RootObject::build(&cube_config(), &mut renderer).unwrap();

        assert_eq!(root.material_count(), 6);
        assert_eq!(root.mesh.groups.len(), 6);
        for (i, m) in root.materials.iter().enumerate() {
            let tex = renderer.texture(m.texture.unwrap()).unwrap();
            assert_eq!(tex.lines, vec![["A", "B", "C", "D", "E", "F"][i]]);
            assert_eq!(renderer.material(m.material).unwrap().texture, m.texture);
        }
        assert_eq!(log.live_geometries(), 2);
        assert!(root.points.is_none());
    }

    #[test]
    fn icosphere_carries_capped_point_cloud() {
        let mut config = cube_config();
        config.shape = ShapeKind::Icosphere;
        config.size = SizeClass::Large;
        config.segments.truncate(3);
        config.point_count = Some(10_000);

        let log = HeadlessLog::new();
        let mut renderer = HeadlessRenderer::new(log.clone());
        let root = RootObject::build(&config, &mut renderer).unwrap();

        assert_eq!(root.mesh.triangle_count(), 320);
        assert_eq!(root.material_count(), 3);
        assert_eq!(root.points.as_ref().unwrap().len(), 200);
        assert_eq!(log.live_geometries(), 3);
        assert_eq!(log.live_textures(), 0);
    }

    #[test]
    fn failed_build_releases_partial_uploads() {
        let log = HeadlessLog::new();
        let mut renderer = HeadlessRenderer::new(log.clone()).failing_after(7);
        let err = RootObject::build(&cube_config(), &mut renderer).unwrap_err();
        assert!(matches!(err, ViewerError::BuildFailure(_)));
        assert!(log.is_clean());
    }

    #[test]
    fn wrong_segment_count_is_a_build_failure() {
        let mut config = cube_config();
        config.segments.pop();
        let log = HeadlessLog::new();
        let mut renderer = HeadlessRenderer::new(log.clone());
        assert!(matches!(
            RootObject::build(&config, &mut renderer),
            Err(ViewerError::BuildFailure(_))
        ));
        assert!(log.is_clean());
    }

    #[test]
    fn dispose_is_idempotent() {
        let log = HeadlessLog::new();
        let mut renderer = HeadlessRenderer::new(log.clone());
        let mut root = RootObject::build(&cube_config(), &mut renderer).unwrap();
        root.dispose(&mut renderer);
        assert!(log.is_clean());
        assert!(root.is_disposed());
        let released = log.events().len();
        root.dispose(&mut renderer);
        assert_eq!(log.events().len(), released);
    }
}
