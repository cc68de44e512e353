/// Gap between the pointer and the tooltip box.
pub const POINTER_OFFSET: f32 = 14.0;
/// Minimum distance kept from every viewport edge.
pub const VIEWPORT_MARGIN: f32 = 8.0;

/// What the host should show next to the pointer. Purely decorative: the
/// element never takes pointer events.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipView {
    pub label: String,
    pub text: Option<String>,
    /// Pointer position in viewport (client) coordinates.
    pub anchor: [f32; 2],
}

/// Top-left corner for a tooltip of `size` next to `anchor`, flipped to the
/// other side of the pointer when it would overflow, then clamped so it
/// stays inside the viewport on all four edges.
pub fn place(anchor: [f32; 2], size: [f32; 2], viewport: [f32; 2]) -> [f32; 2] {
    let axis = |a: f32, extent: f32, limit: f32| {
        let mut pos = a + POINTER_OFFSET;
        if pos + extent + VIEWPORT_MARGIN > limit {
            pos = a - POINTER_OFFSET - extent;
        }
        let max = (limit - extent - VIEWPORT_MARGIN).max(VIEWPORT_MARGIN);
        pos.clamp(VIEWPORT_MARGIN, max)
    };
    [
        axis(anchor[0], size[0], viewport[0]),
        axis(anchor[1], size[1], viewport[1]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: [f32; 2] = [800.0, 600.0];
    const SIZE: [f32; 2] = [160.0, 60.0];

    fn inside(p: [f32; 2]) -> bool {
        p[0] >= VIEWPORT_MARGIN
            && p[1] >= VIEWPORT_MARGIN
            && p[0] + SIZE[0] <= VIEW[0] - VIEWPORT_MARGIN
            && p[1] + SIZE[1] <= VIEW[1] - VIEWPORT_MARGIN
    }

    #[test]
    fn sits_below_right_of_pointer() {
        assert_eq!(place([100.0, 100.0], SIZE, VIEW), [114.0, 114.0]);
    }

    #[test]
    fn flips_near_right_and_bottom_edges() {
        let p = place([790.0, 590.0], SIZE, VIEW);
        assert_eq!(p, [790.0 - POINTER_OFFSET - 160.0, 590.0 - POINTER_OFFSET - 60.0]);
        assert!(inside(p));
    }

    #[test]
    fn clamps_on_all_edges() {
        for anchor in [[-50.0, -50.0], [0.0, 300.0], [400.0, 0.0], [900.0, 700.0], [799.0, 1.0]] {
            assert!(inside(place(anchor, SIZE, VIEW)), "{anchor:?}");
        }
    }

    #[test]
    fn oversized_tooltip_pins_to_margin() {
        assert_eq!(place([50.0, 50.0], [1000.0, 900.0], VIEW), [VIEWPORT_MARGIN, VIEWPORT_MARGIN]);
    }
}
