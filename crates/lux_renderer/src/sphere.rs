//! Sphere primitive.

use crate::material::Material;
use crate::object::{Object, RayCollision};
use lux_math::{DVec3, Interval, Ray};

/// A sphere with a single material. Normals point outward.
#[derive(Debug, Clone)]
pub struct Sphere<M: Material> {
    center: DVec3,
    radius: f64,
    material: M,
}

impl<M: Material> Sphere<M> {
    /// Create a new sphere.
    pub fn new(center: DVec3, radius: f64, material: M) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn material(&self) -> &M {
        &self.material
    }

    /// Distance to the nearest forward intersection.
    pub(crate) fn intersect(&self, ray: &Ray) -> Option<f64> {
        let oc = self.center - ray.origin();
        let a = ray.direction().length_squared();
        let h = ray.direction().dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 || a == 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        // Find the nearest root in front of the origin
        let mut root = (h - sqrtd) / a;
        if !Interval::FORWARD.surrounds(root) {
            root = (h + sqrtd) / a;
            if !Interval::FORWARD.surrounds(root) {
                return None;
            }
        }
        Some(root)
    }
}

impl<M: Material> Object for Sphere<M> {
    fn cast(&self, ray: &Ray) -> Option<(RayCollision, &dyn Material)> {
        let scale = self.intersect(ray)?;
        let normal = (ray.at(scale) - self.center) / self.radius;
        Some((RayCollision::new(scale, normal), &self.material))
    }
}
