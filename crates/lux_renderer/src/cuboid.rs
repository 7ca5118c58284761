//! Axis-aligned box primitive.

use crate::material::Material;
use crate::object::{Object, RayCollision};
use lux_math::{DVec3, Interval, Ray};

/// An axis-aligned box with a single material.
#[derive(Debug, Clone)]
pub struct Cuboid<M: Material> {
    min: DVec3,
    max: DVec3,
    material: M,
    inverted: bool,
}

impl<M: Material> Cuboid<M> {
    /// A solid box with outward normals.
    pub fn new(a: DVec3, b: DVec3, material: M) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
            material,
            inverted: false,
        }
    }

    /// A hollow box whose normals point inward, for rooms seen from inside.
    pub fn inverted(a: DVec3, b: DVec3, material: M) -> Self {
        Self {
            inverted: true,
            ..Self::new(a, b, material)
        }
    }

    pub fn min(&self) -> DVec3 {
        self.min
    }

    pub fn max(&self) -> DVec3 {
        self.max
    }

    /// Entry and exit parameters along the ray, with the axis of each.
    fn slabs(&self, ray: &Ray) -> Option<((f64, usize), (f64, usize))> {
        let mut enter = (f64::NEG_INFINITY, 0);
        let mut exit = (f64::INFINITY, 0);
        for axis in 0..3 {
            let origin = ray.origin()[axis];
            let direction = ray.direction()[axis];
            if direction == 0.0 {
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction;
            let t0 = (self.min[axis] - origin) * inv;
            let t1 = (self.max[axis] - origin) * inv;
            let (near, far) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
            if near > enter.0 {
                enter = (near, axis);
            }
            if far < exit.0 {
                exit = (far, axis);
            }
        }
        let span = Interval::new(enter.0, exit.0);
        if span.is_empty() {
            return None;
        }
        Some((enter, exit))
    }
}

impl<M: Material> Object for Cuboid<M> {
    fn cast(&self, ray: &Ray) -> Option<(RayCollision, &dyn Material)> {
        let (enter, exit) = self.slabs(ray)?;
        let (scale, axis) = if Interval::FORWARD.surrounds(enter.0) {
            enter
        } else if Interval::FORWARD.surrounds(exit.0) {
            exit
        } else {
            return None;
        };

        let point = ray.at(scale);
        let center = (self.min + self.max) / 2.0;
        let mut normal = DVec3::ZERO;
        normal[axis] = if point[axis] > center[axis] { 1.0 } else { -1.0 };
        if self.inverted {
            normal = -normal;
        }
        Some((RayCollision::new(scale, normal), &self.material))
    }
}
