use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::error::{Result, ViewerError};
use crate::label::LabelTexture;

const FONT_FAMILY: &str = "system-ui, -apple-system, 'Segoe UI', sans-serif";

fn js_error(what: &str, e: JsValue) -> ViewerError {
    ViewerError::BuildFailure(format!("{what}: {e:?}"))
}

/// Off-screen 2D canvas that turns a [`LabelTexture`] into RGBA pixels.
/// Never attached to the document.
pub struct LabelCanvas {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl LabelCanvas {
    pub fn new() -> Result<Self> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| ViewerError::BuildFailure("no document".into()))?;
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| js_error("create label canvas", e))?
            .dyn_into()
            .map_err(|_| ViewerError::BuildFailure("label canvas is not a canvas".into()))?;
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(|e| js_error("2d context", e))?
            .ok_or_else(|| ViewerError::BuildFailure("2d context unavailable".into()))?
            .dyn_into()
            .map_err(|_| ViewerError::BuildFailure("unexpected 2d context type".into()))?;
        Ok(Self { canvas, context })
    }

    pub fn rasterize(&self, label: &LabelTexture) -> Result<Vec<u8>> {
        let size = label.size_px;
        if self.canvas.width() != size || self.canvas.height() != size {
            // Resizing also resets the context state.
            self.canvas.set_width(size);
            self.canvas.set_height(size);
        }
        let ctx = &self.context;
        let extent = size as f64;
        let center = extent / 2.0;
        let baselines = label.baselines();

        ctx.set_shadow_blur(0.0);
        ctx.set_shadow_color("transparent");
        ctx.set_fill_style_str(&label.background.to_css());
        ctx.fill_rect(0.0, 0.0, extent, extent);

        ctx.set_font(&format!("600 {}px {FONT_FAMILY}", label.font_px.round()));
        ctx.set_text_align("center");
        ctx.set_text_baseline("middle");
        ctx.set_line_join("round");

        let fill = label.fill.to_css();
        let [gr, gg, gb] = label.glow.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        for pass in &label.glow_passes {
            ctx.set_shadow_color(&format!("rgba({gr}, {gg}, {gb}, {})", pass.alpha));
            ctx.set_shadow_blur(pass.blur_px as f64);
            ctx.set_fill_style_str(&fill);
            for (line, y) in label.lines.iter().zip(&baselines) {
                ctx.fill_text(line, center, *y as f64).map_err(|e| js_error("fillText", e))?;
            }
        }

        ctx.set_shadow_blur(0.0);
        ctx.set_shadow_color("transparent");
        ctx.set_line_width(label.outline_px as f64);
        ctx.set_stroke_style_str(&label.outline.to_css());
        for (line, y) in label.lines.iter().zip(&baselines) {
            ctx.stroke_text(line, center, *y as f64).map_err(|e| js_error("strokeText", e))?;
        }
        ctx.set_fill_style_str(&fill);
        for (line, y) in label.lines.iter().zip(&baselines) {
            ctx.fill_text(line, center, *y as f64).map_err(|e| js_error("fillText", e))?;
        }

        let image = ctx
            .get_image_data(0.0, 0.0, extent, extent)
            .map_err(|e| js_error("getImageData", e))?;
        Ok(image.data().0)
    }
}
