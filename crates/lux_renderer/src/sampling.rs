//! Direction sampling primitives shared by materials, focus points and lights.

use lux_math::DVec3;
use rand::{Rng, RngCore};
use std::f64::consts::PI;

/// Uniform float in [0, 1).
#[inline]
pub fn gen_f64(rng: &mut dyn RngCore) -> f64 {
    rng.gen::<f64>()
}

/// Build an orthonormal basis from a unit vector.
pub fn orthonormal_basis(n: DVec3) -> (DVec3, DVec3) {
    let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;

    let tangent = DVec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
    let bitangent = DVec3::new(b, sign + n.y * n.y * a, -n.y);

    (tangent, bitangent)
}

/// A unit vector at polar angle `acos(cos_theta)` from `axis`.
pub fn from_axis(axis: DVec3, cos_theta: f64, phi: f64) -> DVec3 {
    let (tangent, bitangent) = orthonormal_basis(axis);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    (tangent * phi.cos() + bitangent * phi.sin()) * sin_theta + axis * cos_theta
}

/// Cosine-weighted direction on the hemisphere around `axis`.
///
/// Inverse transform on `cos(lat) = sqrt(u)`.
pub fn cosine_hemisphere(rng: &mut dyn RngCore, axis: DVec3) -> DVec3 {
    let cos_theta = gen_f64(rng).sqrt();
    let phi = 2.0 * PI * gen_f64(rng);
    from_axis(axis, cos_theta, phi)
}

/// Uniform direction on the unit sphere.
pub fn uniform_sphere(rng: &mut dyn RngCore) -> DVec3 {
    let z = 2.0 * gen_f64(rng) - 1.0;
    let phi = 2.0 * PI * gen_f64(rng);
    let r = (1.0 - z * z).max(0.0).sqrt();
    DVec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Uniform direction inside the cone `dir·axis >= cos_max`.
pub fn uniform_cone(rng: &mut dyn RngCore, axis: DVec3, cos_max: f64) -> DVec3 {
    let cos_theta = 1.0 - gen_f64(rng) * (1.0 - cos_max);
    let phi = 2.0 * PI * gen_f64(rng);
    from_axis(axis, cos_theta, phi)
}

/// Relative density of [`uniform_cone`] for a direction inside the cone.
#[inline]
pub fn cone_density(cos_max: f64) -> f64 {
    2.0 / (1.0 - cos_max)
}

/// Direction distributed as `cos^alpha` around `axis` (Phong lobe).
pub fn power_cosine(rng: &mut dyn RngCore, axis: DVec3, alpha: f64) -> DVec3 {
    let cos_theta = gen_f64(rng).powf(1.0 / (alpha + 1.0));
    let phi = 2.0 * PI * gen_f64(rng);
    from_axis(axis, cos_theta, phi)
}

/// Relative density of [`power_cosine`].
#[inline]
pub fn power_cosine_density(axis: DVec3, dir: DVec3, alpha: f64) -> f64 {
    let cos = axis.dot(dir);
    if cos <= 0.0 {
        return 0.0;
    }
    2.0 * (alpha + 1.0) * cos.powf(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_orthonormal_basis() {
        for n in [DVec3::Y, DVec3::Z, -DVec3::Z, DVec3::new(1.0, -2.0, 0.5).normalize()] {
            let (t, b) = orthonormal_basis(n);

            assert!(t.dot(n).abs() < 1e-9);
            assert!(b.dot(n).abs() < 1e-9);
            assert!(t.dot(b).abs() < 1e-9);
            assert!((t.length() - 1.0).abs() < 1e-9);
            assert!((b.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cosine_hemisphere_mean() {
        // E[cos] under cosine weighting is 2/3.
        let mut rng = StdRng::seed_from_u64(7);
        let axis = DVec3::new(0.0, 1.0, 1.0).normalize();
        let n = 50_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let d = cosine_hemisphere(&mut rng, axis);
            assert!(d.dot(axis) >= 0.0);
            sum += d.dot(axis);
        }
        assert!((sum / n as f64 - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_uniform_cone_stays_inside() {
        let mut rng = StdRng::seed_from_u64(8);
        let axis = DVec3::X;
        for _ in 0..1000 {
            let d = uniform_cone(&mut rng, axis, 0.9);
            assert!(d.dot(axis) >= 0.9 - 1e-12);
            assert!((d.length() - 1.0).abs() < 1e-9);
        }
        assert!((cone_density(-1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_power_cosine_normalized() {
        let mut rng = StdRng::seed_from_u64(9);
        let axis = DVec3::Z;
        let n = 100_000;

        // The relative density averages to one under uniform sampling.
        let mut density_sum = 0.0;
        for _ in 0..n {
            density_sum += power_cosine_density(axis, uniform_sphere(&mut rng), 4.0);
        }
        assert!((density_sum / n as f64 - 1.0).abs() < 0.03);

        // E[cos] under a cos^4 lobe is 5/6.
        let mut cos_sum = 0.0;
        for _ in 0..n {
            cos_sum += power_cosine(&mut rng, axis, 4.0).dot(axis);
        }
        assert!((cos_sum / n as f64 - 5.0 / 6.0).abs() < 0.01);
    }
}
