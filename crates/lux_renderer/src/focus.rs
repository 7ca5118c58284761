//! Focus points: extra importance-sampling distributions for bounce
//! directions, mixed with material sampling by the recursive tracer.

use crate::sampling::{
    cone_density, power_cosine, power_cosine_density, uniform_cone, uniform_sphere,
};
use lux_math::DVec3;
use rand::RngCore;

/// Rounding allowance when testing whether a direction lies in a cone.
const CONE_SLACK: f64 = 1e-12;

/// A distribution over source directions at a surface point.
///
/// Like materials, densities are relative to the uniform sphere and source
/// directions point along the light's travel, into the surface.
pub trait FocusPoint: Send + Sync {
    fn sample_source(
        &self,
        rng: &mut dyn RngCore,
        point: DVec3,
        normal: DVec3,
        dest: DVec3,
    ) -> DVec3;

    fn source_density(&self, point: DVec3, normal: DVec3, source: DVec3, dest: DVec3) -> f64;
}

/// Samples directions toward a sphere, typically a light.
#[derive(Debug, Clone)]
pub struct SphereFocusPoint {
    pub center: DVec3,
    pub radius: f64,
}

impl SphereFocusPoint {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Axis and `1 - cos` of the cone the sphere subtends from `point`.
    ///
    /// `None` when the point is inside the sphere.
    fn cone(&self, point: DVec3) -> Option<(DVec3, f64)> {
        let to_center = self.center - point;
        let dist_squared = to_center.length_squared();
        let ratio = self.radius * self.radius / dist_squared;
        if !(ratio < 1.0) {
            return None;
        }
        // 1 - sqrt(1 - x) without cancellation for distant spheres
        let one_minus_cos = ratio / (1.0 + (1.0 - ratio).sqrt());
        Some((to_center / dist_squared.sqrt(), one_minus_cos))
    }
}

impl FocusPoint for SphereFocusPoint {
    fn sample_source(
        &self,
        rng: &mut dyn RngCore,
        point: DVec3,
        _normal: DVec3,
        _dest: DVec3,
    ) -> DVec3 {
        match self.cone(point) {
            Some((axis, one_minus_cos)) => -uniform_cone(rng, axis, 1.0 - one_minus_cos),
            None => uniform_sphere(rng),
        }
    }

    fn source_density(&self, point: DVec3, _normal: DVec3, source: DVec3, _dest: DVec3) -> f64 {
        match self.cone(point) {
            Some((axis, one_minus_cos)) => {
                if -source.dot(axis) >= 1.0 - one_minus_cos - CONE_SLACK {
                    cone_density(1.0 - one_minus_cos)
                } else {
                    0.0
                }
            }
            None => 1.0,
        }
    }
}

/// Samples a Phong lobe around the direction toward a target point.
#[derive(Debug, Clone)]
pub struct PhongFocusPoint {
    pub target: DVec3,
    pub alpha: f64,
}

impl PhongFocusPoint {
    pub fn new(target: DVec3, alpha: f64) -> Self {
        Self { target, alpha }
    }

    fn axis(&self, point: DVec3) -> DVec3 {
        (self.target - point).normalize_or_zero()
    }
}

impl FocusPoint for PhongFocusPoint {
    fn sample_source(
        &self,
        rng: &mut dyn RngCore,
        point: DVec3,
        _normal: DVec3,
        _dest: DVec3,
    ) -> DVec3 {
        let axis = self.axis(point);
        if axis == DVec3::ZERO {
            return uniform_sphere(rng);
        }
        -power_cosine(rng, axis, self.alpha)
    }

    fn source_density(&self, point: DVec3, _normal: DVec3, source: DVec3, _dest: DVec3) -> f64 {
        let axis = self.axis(point);
        if axis == DVec3::ZERO {
            return 1.0;
        }
        power_cosine_density(axis, -source, self.alpha)
    }
}
