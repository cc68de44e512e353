//! Re-tints an already built root object for new theme colors. Geometry is
//! never rebuilt: face labels get fresh textures, cloud points get new
//! colors written into their existing buffer.

use crate::builder::RootObject;
use crate::color::ThemeColors;
use crate::config::Segment;
use crate::error::Result;
use crate::label::LabelTexture;
use crate::render::Renderer;

/// Returns the number of textures that were replaced.
pub fn apply_theme<R: Renderer>(
    root: &mut RootObject,
    segments: &[Segment],
    theme: &ThemeColors,
    renderer: &mut R,
) -> Result<usize> {
    let mut replaced = 0;
    for (material, segment) in root.materials.iter_mut().zip(segments) {
        let Some(current) = material.label.as_ref() else {
            continue;
        };
        let next = LabelTexture::new(&segment.label, segment.color, theme, root.label_px);
        if *current == next {
            continue;
        }
        let texture = renderer.upload_texture(&next)?;
        if let Err(e) = renderer.set_material_texture(material.material, Some(texture)) {
            renderer.release_texture(texture);
            return Err(e);
        }
        if let Some(old) = material.texture.replace(texture) {
            renderer.release_texture(old);
        }
        material.label = Some(next);
        replaced += 1;
    }

    if let (Some(cloud), Some(handle)) = (root.points.as_mut(), root.points_handle) {
        cloud.recolor(theme);
        renderer.update_points(handle, cloud)?;
    }
    Ok(replaced)
}
