//! Henyey-Greenstein phase function for participating media.

use crate::material::{Color, Material};
use crate::sampling::{from_axis, gen_f64, uniform_sphere};
use lux_math::DVec3;
use rand::RngCore;
use std::f64::consts::PI;

/// Largest usable `|g|`. The phase function is singular at ±1.
const MAX_ASYMMETRY: f64 = 0.999;

/// Below this `|g|` the phase function is treated as isotropic.
const ISOTROPIC_EPSILON: f64 = 1e-3;

/// Smallest cosine the BSDF divides by in `ignore_normal` mode.
const MIN_COSINE: f64 = 1e-8;

/// Scattering with the Henyey-Greenstein distribution over the angle
/// between the incoming and outgoing propagation directions.
///
/// Positive `g` scatters forward, negative `g` scatters back.
#[derive(Debug, Clone)]
pub struct HenyeyGreenstein {
    g: f64,
    pub color: Color,

    /// Volumetric mode: the BSDF cancels the `|n·source|` factor the
    /// tracers multiply by, so the surface orientation has no effect.
    pub ignore_normal: bool,

    pub ambient: Color,
    pub emission: Color,
}

impl HenyeyGreenstein {
    pub fn new(g: f64, color: Color) -> Self {
        Self {
            g: g.clamp(-MAX_ASYMMETRY, MAX_ASYMMETRY),
            color,
            ignore_normal: false,
            ambient: Color::ZERO,
            emission: Color::ZERO,
        }
    }

    /// Builder method to enable volumetric mode.
    pub fn with_ignore_normal(mut self, ignore_normal: bool) -> Self {
        self.ignore_normal = ignore_normal;
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

    /// The clamped asymmetry parameter.
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Phase function relative to the uniform sphere.
    fn phase(&self, cos: f64) -> f64 {
        let g = self.g;
        let denom = 1.0 + g * g - 2.0 * g * cos;
        (1.0 - g * g) / (denom * denom.sqrt())
    }

    /// Invert the CDF of the scattering cosine.
    fn sample_cos(&self, u: f64) -> f64 {
        let g = self.g;
        if g.abs() < ISOTROPIC_EPSILON {
            return 2.0 * u - 1.0;
        }
        let t = (1.0 - g * g) / (1.0 - g + 2.0 * g * u);
        ((1.0 + g * g - t * t) / (2.0 * g)).clamp(-1.0, 1.0)
    }
}

impl Material for HenyeyGreenstein {
    fn bsdf(&self, normal: DVec3, source: DVec3, dest: DVec3) -> Color {
        let mut value = self.color * self.phase(source.dot(dest));
        if self.ignore_normal {
            value /= normal.dot(source).abs().max(MIN_COSINE);
        }
        value
    }

    fn sample_source(&self, rng: &mut dyn RngCore, _normal: DVec3, dest: DVec3) -> DVec3 {
        if self.g.abs() < ISOTROPIC_EPSILON {
            return uniform_sphere(rng);
        }
        let cos = self.sample_cos(gen_f64(rng));
        let phi = 2.0 * PI * gen_f64(rng);
        from_axis(dest, cos, phi)
    }

    fn source_density(&self, _normal: DVec3, source: DVec3, dest: DVec3) -> f64 {
        if self.g.abs() < ISOTROPIC_EPSILON {
            return 1.0;
        }
        self.phase(source.dot(dest))
    }

    fn emission(&self) -> Color {
        self.emission
    }

    fn ambient(&self) -> Color {
        self.ambient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{check_dest_sampling, check_nonnegative, check_source_sampling};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_g_is_clamped() {
        assert_eq!(HenyeyGreenstein::new(1.0, Color::ONE).g(), MAX_ASYMMETRY);
        assert_eq!(HenyeyGreenstein::new(-3.0, Color::ONE).g(), -MAX_ASYMMETRY);
        assert_eq!(HenyeyGreenstein::new(0.4, Color::ONE).g(), 0.4);
    }

    #[test]
    fn test_phase_is_normalized() {
        let mut rng = StdRng::seed_from_u64(21);
        let n = 200_000;
        for g in [-0.6, 0.0, 0.3, 0.8] {
            let mat = HenyeyGreenstein::new(g, Color::ONE);
            let mut sum = 0.0;
            for _ in 0..n {
                sum += mat.phase(2.0 * gen_f64(&mut rng) - 1.0);
            }
            // Uniform in cos is uniform on the sphere.
            let mean = sum / n as f64;
            assert!((mean - 1.0).abs() < 0.03, "g={g}: mean phase {mean}");
        }
    }

    #[test]
    fn test_forward_scattering_mean_cosine() {
        // E[cos] of the Henyey-Greenstein distribution equals g.
        let mat = HenyeyGreenstein::new(0.7, Color::ONE);
        let mut rng = StdRng::seed_from_u64(22);
        let dest = DVec3::new(1.0, 2.0, -0.5).normalize();
        let n = 100_000;
        let mut sum = 0.0;
        for _ in 0..n {
            sum += mat.sample_source(&mut rng, DVec3::Z, dest).dot(dest);
        }
        assert!((sum / n as f64 - 0.7).abs() < 0.01);
    }

    #[test]
    fn test_ignore_normal_cancels_cosine() {
        let mat = HenyeyGreenstein::new(0.2, Color::splat(0.5)).with_ignore_normal(true);
        let n = DVec3::Z;
        let source = DVec3::new(0.0, 0.6, -0.8);
        let dest = DVec3::new(0.6, 0.0, 0.8);
        let plain = HenyeyGreenstein::new(0.2, Color::splat(0.5));
        let expected = plain.bsdf(n, source, dest) / 0.8;
        assert!((mat.bsdf(n, source, dest) - expected).length() < 1e-12);
    }

    #[test]
    fn test_henyey_greenstein_sampling_consistency() {
        let mut rng = StdRng::seed_from_u64(23);
        for g in [-0.4, 0.0, 0.5] {
            let mat = HenyeyGreenstein::new(g, Color::new(0.2, 0.5, 0.8));
            check_nonnegative(&mat, &mut rng);
            check_source_sampling(&mat, &mut rng);
            check_dest_sampling(&mat, &mut rng);
        }
    }
}
