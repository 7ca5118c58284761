//! Light sources.
//!
//! Point lights are shaded explicitly by the recursive tracer. Area lights
//! are ordinary emissive objects that can also be sampled by area, which is
//! what the bidirectional tracer starts its light paths from.

use crate::material::{Color, Lambert, Material};
use crate::object::{Object, RayCollision};
use crate::sampling::uniform_sphere;
use crate::sphere::Sphere;
use lux_math::{DVec3, Ray};
use rand::RngCore;
use std::f64::consts::PI;

/// An infinitesimal light radiating equally in every direction.
#[derive(Debug, Clone)]
pub struct PointLight {
    pub origin: DVec3,
    pub color: Color,
    /// Fall off with the squared distance.
    pub quadratic_dropoff: bool,
}

impl PointLight {
    pub fn new(origin: DVec3, color: Color) -> Self {
        Self {
            origin,
            color,
            quadratic_dropoff: true,
        }
    }

    /// Builder method to toggle distance falloff.
    pub fn with_quadratic_dropoff(mut self, quadratic_dropoff: bool) -> Self {
        self.quadratic_dropoff = quadratic_dropoff;
        self
    }

    /// Light arriving at a surface with `normal`, where `to_light` is the
    /// vector from the surface to this light.
    ///
    /// Multiplying by a BSDF gives the reflected radiance.
    pub fn shade(&self, normal: DVec3, to_light: DVec3) -> Color {
        let dist_squared = to_light.length_squared();
        if dist_squared == 0.0 {
            return Color::ZERO;
        }
        let cos = normal.dot(to_light).abs() / dist_squared.sqrt();
        let mut shade = self.color * (cos / (4.0 * PI));
        if self.quadratic_dropoff {
            shade /= dist_squared;
        }
        shade
    }
}

/// A point drawn uniformly from the surface of an area light.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub point: DVec3,
    pub normal: DVec3,
    pub emission: Color,
}

/// An emissive object that can be sampled uniformly by area.
pub trait AreaLight: Object {
    fn sample_light(&self, rng: &mut dyn RngCore) -> LightSample;

    fn area(&self) -> f64;
}

/// A sphere emitting the same radiance from every point and direction.
#[derive(Debug, Clone)]
pub struct SphereAreaLight {
    sphere: Sphere<Lambert>,
}

impl SphereAreaLight {
    pub fn new(center: DVec3, radius: f64, emission: Color) -> Self {
        Self {
            sphere: Sphere::new(center, radius, Lambert::new(Color::ZERO).with_emission(emission)),
        }
    }

    pub fn center(&self) -> DVec3 {
        self.sphere.center()
    }

    pub fn radius(&self) -> f64 {
        self.sphere.radius()
    }

    pub fn emission(&self) -> Color {
        self.sphere.material().emission()
    }
}

impl Object for SphereAreaLight {
    fn cast(&self, ray: &Ray) -> Option<(RayCollision, &dyn Material)> {
        self.sphere.cast(ray)
    }
}

impl AreaLight for SphereAreaLight {
    fn sample_light(&self, rng: &mut dyn RngCore) -> LightSample {
        let normal = uniform_sphere(rng);
        LightSample {
            point: self.center() + normal * self.radius(),
            normal,
            emission: self.emission(),
        }
    }

    fn area(&self) -> f64 {
        4.0 * PI * self.radius() * self.radius()
    }
}
