//! Phong reflection with an optional diffuse term.

use crate::material::{
    lambert_bsdf, lambert_sample_source, lambert_source_density, reflect, Color, Material,
};
use crate::sampling::{gen_f64, power_cosine, power_cosine_density};
use lux_math::DVec3;
use rand::RngCore;

/// Lower bound on the cosine used for flux correction.
const FLUX_CORRECTION_EPSILON: f64 = 1e-5;

/// Phong material: a specular lobe around the mirror direction plus an
/// optional Lambertian term.
#[derive(Debug, Clone)]
pub struct Phong {
    /// Specular exponent. Larger values give a tighter highlight.
    pub alpha: f64,
    pub specular: Color,
    pub diffuse: Color,
    pub ambient: Color,
    pub emission: Color,

    /// Divide the specular lobe by the larger of the two cosines.
    ///
    /// This is an approximation, not an exact normalization. It keeps the
    /// lobe from gaining energy near grazing angles.
    pub flux_correction: bool,
}

impl Default for Phong {
    fn default() -> Self {
        Self {
            alpha: 10.0,
            specular: Color::ONE,
            diffuse: Color::ZERO,
            ambient: Color::ZERO,
            emission: Color::ZERO,
            flux_correction: true,
        }
    }
}

impl Phong {
    /// Create a purely specular material.
    pub fn new(alpha: f64, specular: Color) -> Self {
        Self {
            alpha,
            specular,
            ..Default::default()
        }
    }

    /// Builder method to set the diffuse color.
    pub fn with_diffuse(mut self, diffuse: Color) -> Self {
        self.diffuse = diffuse;
        self
    }

    /// Builder method to set the ambient color.
    pub fn with_ambient(mut self, ambient: Color) -> Self {
        self.ambient = ambient;
        self
    }

    /// Builder method to set the emitted color.
    pub fn with_emission(mut self, emission: Color) -> Self {
        self.emission = emission;
        self
    }

    fn has_diffuse(&self) -> bool {
        self.diffuse != Color::ZERO
    }

    /// Axis of the specular lobe over source directions.
    fn lobe_axis(normal: DVec3, dest: DVec3) -> DVec3 {
        reflect(dest, normal)
    }
}

impl Material for Phong {
    fn bsdf(&self, normal: DVec3, source: DVec3, dest: DVec3) -> Color {
        let dest_dot = dest.dot(normal);
        let source_dot = -source.dot(normal);
        if dest_dot <= 0.0 || source_dot <= 0.0 {
            return Color::ZERO;
        }

        let mut color = lambert_bsdf(self.diffuse, normal, source, dest);

        let reflect_dot = reflect(source, normal).dot(dest);
        if reflect_dot <= 0.0 {
            return color;
        }
        let mut intensity = 2.0 * (self.alpha + 1.0) * reflect_dot.powf(self.alpha);
        if self.flux_correction {
            intensity /= source_dot.max(dest_dot).max(FLUX_CORRECTION_EPSILON);
        }
        color += self.specular * intensity;
        color
    }

    fn sample_source(&self, rng: &mut dyn RngCore, normal: DVec3, dest: DVec3) -> DVec3 {
        if self.has_diffuse() && gen_f64(rng) < 0.5 {
            return lambert_sample_source(rng, normal);
        }
        power_cosine(rng, Self::lobe_axis(normal, dest), self.alpha)
    }

    fn source_density(&self, normal: DVec3, source: DVec3, dest: DVec3) -> f64 {
        let specular = power_cosine_density(Self::lobe_axis(normal, dest), source, self.alpha);
        if !self.has_diffuse() {
            return specular;
        }
        (specular + lambert_source_density(normal, source)) / 2.0
    }

    fn emission(&self) -> Color {
        self.emission
    }

    fn ambient(&self) -> Color {
        self.ambient
    }
}
