//! Material trait for surface scattering.
//!
//! Directions follow one convention everywhere: `source` is the direction
//! incoming light travels (for a reflection it points into the surface) and
//! `dest` is the direction outgoing light travels (away from the surface,
//! toward the viewer). Both range over the full sphere so transmission fits
//! the same contract.
//!
//! Densities are relative to the uniform distribution on the unit sphere,
//! i.e. `4π` times the solid-angle pdf. BSDFs use the same normalization, so
//! a path's throughput is updated by `bsdf * |cos| / density`.

use crate::sampling::cosine_hemisphere;
use lux_math::DVec3;
use rand::RngCore;

/// Color type alias (linear RGB, unclamped)
pub type Color = DVec3;

/// Mean channel value of a color.
#[inline]
pub fn brightness(color: Color) -> f64 {
    color.element_sum() / 3.0
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Mask applied to light arriving along `source` and leaving along `dest`.
    fn bsdf(&self, normal: DVec3, source: DVec3, dest: DVec3) -> Color;

    /// Draw a source direction from a distribution suited to `dest`.
    fn sample_source(&self, rng: &mut dyn RngCore, normal: DVec3, dest: DVec3) -> DVec3;

    /// Density of the distribution used by [`Material::sample_source`].
    fn source_density(&self, normal: DVec3, source: DVec3, dest: DVec3) -> f64;

    /// Draw a destination direction for light arriving along `source`.
    ///
    /// The default follows from reciprocity: reversing a path turns its
    /// destination into a source. Materials whose forward and backward
    /// distributions differ (refraction) override this together with
    /// [`Material::dest_density`].
    fn sample_dest(&self, rng: &mut dyn RngCore, normal: DVec3, source: DVec3) -> DVec3 {
        -self.sample_source(rng, normal, -source)
    }

    /// Density of the distribution used by [`Material::sample_dest`].
    fn dest_density(&self, normal: DVec3, source: DVec3, dest: DVec3) -> f64 {
        self.source_density(normal, -dest, -source)
    }

    /// Light emitted by the surface itself.
    fn emission(&self) -> Color {
        Color::ZERO
    }

    /// Light added at the first visible hit only.
    fn ambient(&self) -> Color {
        Color::ZERO
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Lambert {
    diffuse: Color,
    ambient: Color,
    emission: Color,
}

impl Lambert {
    /// Create a new Lambertian material with the given diffuse reflectance.
    pub fn new(diffuse: Color) -> Self {
        Self {
            diffuse,
            ambient: Color::ZERO,
            emission: Color::ZERO,
        }
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

    pub fn diffuse(&self) -> Color {
        self.diffuse
    }
}

impl Material for Lambert {
    fn bsdf(&self, normal: DVec3, source: DVec3, dest: DVec3) -> Color {
        lambert_bsdf(self.diffuse, normal, source, dest)
    }

    fn sample_source(&self, rng: &mut dyn RngCore, normal: DVec3, _dest: DVec3) -> DVec3 {
        lambert_sample_source(rng, normal)
    }

    fn source_density(&self, normal: DVec3, source: DVec3, _dest: DVec3) -> f64 {
        lambert_source_density(normal, source)
    }

    fn emission(&self) -> Color {
        self.emission
    }

    fn ambient(&self) -> Color {
        self.ambient
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Diffuse lobe shared by Lambert and Phong.
///
/// The factor of 4 is `4π / π`: the cosine-weighted hemisphere normalized
/// against the full-sphere convention.
#[inline]
pub(crate) fn lambert_bsdf(diffuse: Color, normal: DVec3, source: DVec3, dest: DVec3) -> Color {
    if dest.dot(normal) <= 0.0 || source.dot(normal) >= 0.0 {
        return Color::ZERO;
    }
    diffuse * 4.0
}

#[inline]
pub(crate) fn lambert_sample_source(rng: &mut dyn RngCore, normal: DVec3) -> DVec3 {
    -cosine_hemisphere(rng, normal)
}

#[inline]
pub(crate) fn lambert_source_density(normal: DVec3, source: DVec3) -> f64 {
    4.0 * (-normal.dot(source)).max(0.0)
}

/// Mirror a propagation direction about a surface.
#[inline]
pub(crate) fn reflect(v: DVec3, n: DVec3) -> DVec3 {
    v - 2.0 * v.dot(n) * n
}
