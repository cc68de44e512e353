//! CPU-side geometry for the two shape kinds: the solid mesh with its
//! per-segment index groups, the wireframe overlay and the point cloud.

use std::collections::{BTreeSet, HashMap};
use std::f32::consts::PI;
use std::ops::Range;

use cgmath::{InnerSpace, Vector3};

use crate::color::ThemeColors;
use crate::types::{LineVertex, MeshVertex, PointInstance};

/// Half edge length of the cube and radius of the icosphere.
pub const SHAPE_RADIUS: f32 = 1.0;

/// Points float slightly above the sphere surface.
pub const POINT_SHELL: f32 = 1.2;

/// Offset applied to the wireframe so it does not z-fight the faces.
const WIRE_INFLATE: f32 = 1.002;

/// Maps triangle indices to segments. Segment `i` owns the contiguous
/// triangle range `[ceil(i*T/n), ceil((i+1)*T/n))`, which reduces to
/// `p / (T/n)` whenever `n` divides `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    pub primitives: usize,
    pub segments: usize,
}

impl SegmentLayout {
    pub fn new(primitives: usize, segments: usize) -> Self {
        Self {
            primitives,
            segments,
        }
    }

    pub fn segment_of(&self, primitive: usize) -> Option<usize> {
        if self.segments == 0 || primitive >= self.primitives {
            return None;
        }
        Some(primitive * self.segments / self.primitives)
    }

    pub fn primitive_range(&self, segment: usize) -> Range<usize> {
        let start = |i: usize| (i * self.primitives).div_ceil(self.segments);
        start(segment)..start(segment + 1)
    }

    /// Exact primitives per segment, when the split is even.
    pub fn primitives_per_segment(&self) -> Option<usize> {
        if self.segments > 0 && self.primitives % self.segments == 0 {
            Some(self.primitives / self.segments)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Index ranges drawn with material `i`; index-aligned with segments.
    pub groups: Vec<Range<u32>>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangle(&self, primitive: usize) -> Option<[Vector3<f32>; 3]> {
        let base = primitive * 3;
        let idx = self.indices.get(base..base + 3)?;
        let p = |i: u32| Vector3::from(self.vertices[i as usize].position);
        Some([p(idx[0]), p(idx[1]), p(idx[2])])
    }

    /// Splits the index buffer into one group per segment.
    pub fn assign_groups(&mut self, layout: SegmentLayout) {
        self.groups = (0..layout.segments)
            .map(|i| {
                let r = layout.primitive_range(i);
                (r.start as u32 * 3)..(r.end as u32 * 3)
            })
            .collect();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSet {
    /// Pairs of endpoints (line list).
    pub vertices: Vec<LineVertex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub points: Vec<PointInstance>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Reassigns colors in place; positions and count are untouched.
    pub fn recolor(&mut self, theme: &ThemeColors) {
        for (i, p) in self.points.iter_mut().enumerate() {
            p.color = theme.alternating(i).to_array();
        }
    }
}

/// Face frames `(normal, right, up)` in builder order: +X, -X, +Y, -Y, +Z, -Z.
/// `right x up == normal` keeps the winding counter-clockwise from outside.
const CUBE_FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
    ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
];

/// Cube with four vertices and two triangles per face. Face `i` owns
/// triangles `2i` and `2i + 1`.
pub fn cube(half: f32) -> Mesh {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (n, r, u) in CUBE_FACES {
        let (n, r, u) = (Vector3::from(n), Vector3::from(r), Vector3::from(u));
        let c = n * half;
        let corners = [
            (c - r * half + u * half, [0.0, 0.0]),
            (c - r * half - u * half, [0.0, 1.0]),
            (c + r * half - u * half, [1.0, 1.0]),
            (c + r * half + u * half, [1.0, 0.0]),
        ];
        let base = vertices.len() as u32;
        for (p, uv) in corners {
            vertices.push(MeshVertex {
                position: p.into(),
                normal: n.into(),
                uv,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 3, base + 1, base + 2, base + 3]);
    }

    let mut mesh = Mesh {
        vertices,
        indices,
        groups: Vec::new(),
    };
    mesh.assign_groups(SegmentLayout::new(12, 6));
    mesh
}

/// The twelve box edges; the face diagonals are left out.
pub fn cube_edges(half: f32) -> LineSet {
    let h = half * WIRE_INFLATE;
    let corner = |i: usize| {
        let s = |bit: usize| if i & bit != 0 { h } else { -h };
        LineVertex {
            position: [s(1), s(2), s(4)],
        }
    };
    let mut vertices = Vec::with_capacity(24);
    for i in 0..8 {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                vertices.push(corner(i));
                vertices.push(corner(i | bit));
            }
        }
    }
    LineSet { vertices }
}

/// Subdivided icosahedron projected onto a sphere. Detail `d` yields
/// `20 * 4^d` triangles.
pub fn icosphere(radius: f32, detail: u32) -> Mesh {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    let mut positions: Vec<Vector3<f32>> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .into_iter()
    .map(|p| Vector3::from(p).normalize())
    .collect();

    let mut faces: Vec<[u32; 3]> = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    for _ in 0..detail {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, positions: &mut Vec<Vector3<f32>>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let m = (positions[a as usize] + positions[b as usize]).normalize();
                positions.push(m);
                (positions.len() - 1) as u32
            })
        };
        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            next.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = next;
    }

    let vertices = positions
        .iter()
        .map(|n| MeshVertex {
            position: (n * radius).into(),
            normal: (*n).into(),
            uv: [
                0.5 + n.z.atan2(n.x) / (2.0 * PI),
                0.5 - n.y.asin() / PI,
            ],
        })
        .collect();

    Mesh {
        vertices,
        indices: faces.into_iter().flatten().collect(),
        groups: Vec::new(),
    }
}

/// Every distinct triangle edge of `mesh`, slightly inflated.
pub fn mesh_edges(mesh: &Mesh) -> LineSet {
    let mut edges = BTreeSet::new();
    for tri in mesh.indices.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            edges.insert((a.min(b), a.max(b)));
        }
    }
    let at = |i: u32| {
        let p = mesh.vertices[i as usize].position;
        LineVertex {
            position: [p[0] * WIRE_INFLATE, p[1] * WIRE_INFLATE, p[2] * WIRE_INFLATE],
        }
    };
    LineSet {
        vertices: edges.into_iter().flat_map(|(a, b)| [at(a), at(b)]).collect(),
    }
}

/// `count` points spread evenly over a sphere of `radius * POINT_SHELL`
/// using the golden-angle spiral, colored by parity.
pub fn fibonacci_points(count: usize, radius: f32, point_scale: f32, theme: &ThemeColors) -> PointCloud {
    let shell = radius * POINT_SHELL;
    let n = count as f32;
    let points = (0..count)
        .map(|i| {
            let phi = (-1.0 + 2.0 * i as f32 / n).acos();
            let theta = (n * PI).sqrt() * phi;
            let position = [
                shell * theta.cos() * phi.sin(),
                shell * theta.sin() * phi.sin(),
                shell * phi.cos(),
            ];
            PointInstance::new(position, theme.alternating(i).to_array(), point_scale)
        })
        .collect();
    PointCloud { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use approx::assert_relative_eq;

    #[test]
    fn cube_layout_is_two_triangles_per_face() {
        let mesh = cube(SHAPE_RADIUS);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.groups.len(), 6);
        for (i, g) in mesh.groups.iter().enumerate() {
            assert_eq!(*g, (i as u32 * 6)..(i as u32 * 6 + 6));
        }
    }

    #[test]
    fn cube_faces_wind_outwards() {
        let mesh = cube(SHAPE_RADIUS);
        for p in 0..mesh.triangle_count() {
            let [a, b, c] = mesh.triangle(p).unwrap();
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "triangle {p} faces inwards");
        }
    }

    #[test]
    fn icosphere_triangle_counts() {
        assert_eq!(icosphere(1.0, 0).triangle_count(), 20);
        assert_eq!(icosphere(1.0, 1).triangle_count(), 80);
        assert_eq!(icosphere(1.0, 2).triangle_count(), 320);
        for v in icosphere(2.0, 1).vertices {
            assert_relative_eq!(Vector3::from(v.position).magnitude(), 2.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn layout_matches_even_division() {
        let layout = SegmentLayout::new(12, 6);
        assert_eq!(layout.primitives_per_segment(), Some(2));
        for p in 0..12 {
            assert_eq!(layout.segment_of(p), Some(p / 2));
        }
        assert_eq!(layout.segment_of(12), None);
    }

    #[test]
    fn uneven_layout_covers_every_primitive_once() {
        let layout = SegmentLayout::new(80, 7);
        let mut covered = 0;
        for s in 0..7 {
            let range = layout.primitive_range(s);
            assert!(!range.is_empty());
            for p in range.clone() {
                assert_eq!(layout.segment_of(p), Some(s));
            }
            covered += range.len();
        }
        assert_eq!(covered, 80);
    }

    #[test]
    fn cube_edges_are_twelve_lines() {
        assert_eq!(cube_edges(1.0).vertices.len(), 24);
    }

    #[test]
    fn icosahedron_has_thirty_edges() {
        assert_eq!(mesh_edges(&icosphere(1.0, 0)).vertices.len(), 60);
    }

    #[test]
    fn fibonacci_points_sit_on_shell() {
        let theme = ThemeColors::new(Rgb::WHITE, Rgb::BLACK);
        for count in [1, 2, 37, 100] {
            let cloud = fibonacci_points(count, 1.5, 0.03, &theme);
            assert_eq!(cloud.len(), count);
            for (i, p) in cloud.points.iter().enumerate() {
                let v = Vector3::from(p.position);
                assert!(p.position.iter().all(|c| c.is_finite()));
                assert_relative_eq!(v.magnitude(), 1.5 * POINT_SHELL, epsilon = 1e-4);
                assert_eq!(p.color, theme.alternating(i).to_array());
            }
        }
    }
}
