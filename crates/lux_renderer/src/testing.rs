//! Statistical checks shared by the material tests.

use crate::material::{brightness, Material};
use crate::sampling::{gen_f64, uniform_sphere};
use lux_math::DVec3;
use rand::RngCore;

const PAIRS: usize = 12;
const FUNCTIONS: usize = 4;
const SAMPLES: usize = 100_000;

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= 0.05 * actual.abs().max(expected.abs()) + 1e-3
}

/// A random smooth positive function on the sphere.
#[derive(Debug, Clone, Copy)]
struct TestFunction {
    axis: DVec3,
    scale: f64,
}

impl TestFunction {
    fn random(rng: &mut dyn RngCore) -> Self {
        Self {
            axis: uniform_sphere(rng),
            scale: gen_f64(rng),
        }
    }

    fn eval(&self, d: DVec3) -> f64 {
        1.5 + self.scale * d.dot(self.axis)
    }
}

fn test_functions(rng: &mut dyn RngCore) -> [TestFunction; FUNCTIONS] {
    std::array::from_fn(|_| TestFunction::random(rng))
}

/// A unit vector `v` with `v·normal >= min_cos`.
fn direction_above(rng: &mut dyn RngCore, normal: DVec3, min_cos: f64) -> DVec3 {
    loop {
        let d = uniform_sphere(rng);
        if d.dot(normal) >= min_cos {
            return d;
        }
    }
}

/// BSDFs and densities are never negative.
pub fn check_nonnegative(material: &dyn Material, rng: &mut dyn RngCore) {
    for _ in 0..10_000 {
        let normal = uniform_sphere(rng);
        let source = uniform_sphere(rng);
        let dest = uniform_sphere(rng);
        let bsdf = material.bsdf(normal, source, dest);
        assert!(bsdf.min_element() >= 0.0, "negative bsdf {bsdf:?}");
        assert!(material.source_density(normal, source, dest) >= 0.0);
        assert!(material.dest_density(normal, source, dest) >= 0.0);
    }
}

/// Compare importance sampling of `weight(dir) * f(dir)` against
/// brute-force uniform sampling, for several test functions at once.
fn check_sampler(
    rng: &mut dyn RngCore,
    label: &str,
    weight: impl Fn(DVec3) -> f64,
    sample: impl Fn(&mut dyn RngCore) -> DVec3,
    density: impl Fn(DVec3) -> f64,
) {
    let functions = test_functions(rng);

    let mut uniform = [0.0; FUNCTIONS];
    for _ in 0..SAMPLES {
        let dir = uniform_sphere(rng);
        let w = weight(dir);
        for (sum, f) in uniform.iter_mut().zip(&functions) {
            *sum += w * f.eval(dir);
        }
    }

    let mut importance = [0.0; FUNCTIONS];
    for _ in 0..SAMPLES {
        let dir = sample(&mut *rng);
        let p = density(dir);
        if p > 0.0 {
            let w = weight(dir) / p;
            for (sum, f) in importance.iter_mut().zip(&functions) {
                *sum += w * f.eval(dir);
            }
        }
    }

    for (importance, uniform) in importance.iter().zip(&uniform) {
        let importance = importance / SAMPLES as f64;
        let uniform = uniform / SAMPLES as f64;
        assert!(
            close(importance, uniform),
            "{label} sampling mismatch: importance={importance} uniform={uniform}"
        );
    }
}

/// Importance sampling through `sample_source`/`source_density` agrees with
/// brute-force uniform sampling of `bsdf * f(source)`.
pub fn check_source_sampling(material: &dyn Material, rng: &mut dyn RngCore) {
    for _ in 0..PAIRS {
        let normal = uniform_sphere(rng);
        let dest = direction_above(rng, normal, 0.3);
        check_sampler(
            rng,
            "source",
            |source| brightness(material.bsdf(normal, source, dest)),
            |rng| material.sample_source(rng, normal, dest),
            |source| material.source_density(normal, source, dest),
        );
    }
}

/// Same check for the `sample_dest`/`dest_density` pair.
pub fn check_dest_sampling(material: &dyn Material, rng: &mut dyn RngCore) {
    for _ in 0..PAIRS {
        let normal = uniform_sphere(rng);
        let source = -direction_above(rng, normal, 0.3);
        check_sampler(
            rng,
            "dest",
            |dest| brightness(material.bsdf(normal, source, dest)),
            |rng| material.sample_dest(rng, normal, source),
            |dest| material.dest_density(normal, source, dest),
        );
    }
}
