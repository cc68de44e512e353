//! Perspective camera looking at the origin, plus the screen-to-ray
//! mapping used for hit testing.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, SquareMatrix, Vector3, Vector4};

use crate::raycast::Ray;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub fov_y: Deg<f32>,
    pub near: f32,
    pub far: f32,
    pub width: f32,
    pub height: f32,
}

impl Camera {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            eye: Point3::new(0.0, 0.0, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
            fov_y: Deg(45.0),
            near: 0.1,
            far: 100.0,
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// Ignores non-positive sizes (collapsed containers).
    pub fn set_viewport(&mut self, width: f32, height: f32) -> bool {
        if width > 0.0 && height > 0.0 {
            self.width = width;
            self.height = height;
            true
        } else {
            false
        }
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, Vector3::unit_y())
    }

    pub fn projection(&self) -> Matrix4<f32> {
        cgmath::perspective(self.fov_y, self.aspect(), self.near, self.far)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection() * self.view()
    }

    /// World-space ray through the pixel `(x, y)`, measured from the
    /// top-left corner of the viewport.
    pub fn ray_through(&self, x: f32, y: f32) -> Option<Ray> {
        let ndc_x = (x / self.width) * 2.0 - 1.0;
        let ndc_y = 1.0 - (y / self.height) * 2.0;
        let inverse = self.view_proj().invert()?;

        let unproject = |z: f32| {
            let p = inverse * Vector4::new(ndc_x, ndc_y, z, 1.0);
            Vector3::new(p.x / p.w, p.y / p.w, p.z / p.w)
        };
        let near = unproject(-1.0);
        let far = unproject(1.0);
        let dir = far - near;
        if dir.magnitude2() == 0.0 {
            return None;
        }
        Some(Ray::new(Point3::new(near.x, near.y, near.z), dir.normalize()))
    }
}
