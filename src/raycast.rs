use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Transform, Vector3};

use crate::geometry::{Mesh, SegmentLayout};

const EPSILON: f32 = 1e-7;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub dir: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, dir: Vector3<f32>) -> Self {
        Self { origin, dir }
    }

    /// Moves the ray into the space described by `m`.
    pub fn transformed(&self, m: &Matrix4<f32>) -> Ray {
        Ray {
            origin: m.transform_point(self.origin),
            dir: m.transform_vector(self.dir),
        }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.dir * t
    }
}

/// First primitive hit along a ray.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hit {
    pub primitive: usize,
    pub segment: Option<usize>,
    pub distance: f32,
}

/// Möller–Trumbore. Returns the ray parameter of the hit, both faces count.
pub fn intersect_triangle(ray: &Ray, [a, b, c]: [Vector3<f32>; 3]) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let p = ray.dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray.origin.to_vec() - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray.dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t > EPSILON).then_some(t)
}

/// Closest triangle of `mesh` (placed by `model`) hit by a world-space ray.
/// Ties go to the lower primitive index so results are stable.
pub fn cast(ray: &Ray, mesh: &Mesh, model: &Matrix4<f32>, layout: SegmentLayout) -> Option<Hit> {
    let inverse = model.invert()?;
    let local = ray.transformed(&inverse);

    let mut best: Option<(f32, usize)> = None;
    for primitive in 0..mesh.triangle_count() {
        let Some(tri) = mesh.triangle(primitive) else {
            continue;
        };
        let Some(t) = intersect_triangle(&local, tri) else {
            continue;
        };
        if best.map_or(true, |(bt, _)| t < bt) {
            best = Some((t, primitive));
        }
    }

    let (t, primitive) = best?;
    let world_hit = model.transform_point(local.at(t));
    Some(Hit {
        primitive,
        segment: layout.segment_of(primitive),
        distance: (world_hit - ray.origin).magnitude(),
    })
}
