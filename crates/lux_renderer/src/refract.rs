//! Refraction with optional Fresnel reflection.
//!
//! Ideal refraction and reflection are delta distributions. Here each lobe
//! is a small disk of tangential components around the ideal direction, so
//! densities stay finite. Snell's law scales tangential components by the
//! ratio of indices, so a disk seen from one side of a transmission maps
//! exactly onto the disk seen from the other side. Sampling from the source
//! or from the destination covers the same pairs.
//!
//! Refracted weights follow the camera's side: `sample_source` carries
//! `refract_color`, while `sample_dest` scales it by the solid angle ratio
//! (`1/η²` going in, `η²` coming out). A passage in and back out carries
//! `refract_color²` either way.

use crate::material::{Color, Material};
use crate::sampling::{gen_f64, orthonormal_basis};
use lux_math::DVec3;
use rand::RngCore;
use std::f64::consts::PI;

/// Angular width of the lobes outside the material, as `1 - cos`.
pub const REFRACT_EPSILON: f64 = 1e-5;

/// Rounding allowance when testing whether a sampled direction lies in a lobe.
const CONE_SLACK: f64 = 1e-12;

/// Tangential radius of a lobe in the medium of index 1.
fn outer_radius() -> f64 {
    (REFRACT_EPSILON * (2.0 - REFRACT_EPSILON)).sqrt()
}

/// Component of `dir` in the surface plane.
fn tangent(dir: DVec3, normal: DVec3) -> DVec3 {
    dir - normal * dir.dot(normal)
}

/// A transparent material.
///
/// The normal points out of the material, into the medium of index 1.
#[derive(Debug, Clone)]
pub struct Refract {
    pub index_of_refraction: f64,
    pub refract_color: Color,

    /// Fresnel reflection color. Zero makes the material purely
    /// transmissive (apart from total internal reflection).
    pub specular_color: Color,

    pub ambient: Color,
    pub emission: Color,
}

/// Directions whose tangential part lies in a disk, on one side of the
/// surface.
#[derive(Debug, Clone, Copy)]
struct Lobe {
    center: DVec3,
    radius: f64,
    /// Sign of `dir·normal` for directions in the lobe.
    side: f64,
    prob: f64,
}

impl Lobe {
    fn contains(&self, normal: DVec3, dir: DVec3) -> bool {
        dir.dot(normal) * self.side > 0.0
            && tangent(dir, normal).distance(self.center) <= self.radius + CONE_SLACK
    }

    /// Selection probability over the disk area, in units of the
    /// uniform-sphere density. Multiplied by `|cos|` it is the lobe's
    /// share of the relative density.
    fn weight(&self) -> f64 {
        self.prob * 4.0 / (self.radius * self.radius)
    }

    /// A uniform point on the disk lifted onto the sphere.
    fn sample(&self, rng: &mut dyn RngCore, normal: DVec3) -> DVec3 {
        let (tangent_x, tangent_y) = orthonormal_basis(normal);
        let r = self.radius * gen_f64(rng).sqrt();
        let phi = 2.0 * PI * gen_f64(rng);
        let mut t = self.center + (tangent_x * phi.cos() + tangent_y * phi.sin()) * r;
        if t.length_squared() >= 1.0 {
            // Past the horizon
            t = self.center;
        }
        t + normal * (self.side * (1.0 - t.length_squared()).max(0.0).sqrt())
    }
}

/// The two lobes available for one fixed direction.
#[derive(Debug, Clone, Copy)]
struct Lobes {
    reflect: Lobe,
    transmit: Option<Lobe>,
}

impl Lobes {
    fn sample(&self, rng: &mut dyn RngCore, normal: DVec3) -> DVec3 {
        match self.transmit {
            Some(lobe) if gen_f64(rng) >= self.reflect.prob => lobe.sample(rng, normal),
            _ => self.reflect.sample(rng, normal),
        }
    }

    /// The lobes holding `dir`. They lie on opposite sides, so at most one.
    fn containing(&self, normal: DVec3, dir: DVec3) -> impl Iterator<Item = &Lobe> {
        std::iter::once(&self.reflect)
            .chain(self.transmit.as_ref())
            .filter(move |lobe| lobe.contains(normal, dir))
    }

    fn density(&self, normal: DVec3, dir: DVec3) -> f64 {
        let cos = dir.dot(normal).abs();
        self.containing(normal, dir).map(|lobe| lobe.weight() * cos).sum()
    }
}

impl Refract {
    /// Create a purely transmissive material.
    pub fn new(index_of_refraction: f64, refract_color: Color) -> Self {
        Self {
            index_of_refraction,
            refract_color,
            specular_color: Color::ZERO,
            ambient: Color::ZERO,
            emission: Color::ZERO,
        }
    }

    /// Builder method to enable Fresnel reflection.
    pub fn with_specular(mut self, specular_color: Color) -> Self {
        self.specular_color = specular_color;
        self
    }

    /// Builder method to set the ambient color.
    pub fn with_ambient(mut self, ambient: Color) -> Self {
        self.ambient = ambient;
        self
    }

    /// Schlick's approximation given the cosine on the outside of the surface.
    fn reflectance(&self, cos_outside: f64) -> f64 {
        if self.specular_color == Color::ZERO {
            return 0.0;
        }
        let r0 = ((self.index_of_refraction - 1.0) / (self.index_of_refraction + 1.0)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cos_outside.clamp(0.0, 1.0)).powi(5)
    }

    /// Lobes paired with the fixed direction `known`, given the ideal
    /// transmitted partner (`None` on total internal reflection).
    fn lobes(
        &self,
        normal: DVec3,
        known: DVec3,
        transmit_axis: Option<DVec3>,
        known_outside: bool,
    ) -> Lobes {
        let outer = outer_radius();
        let inner = outer / self.index_of_refraction;
        let (near, far) = if known_outside {
            (outer, inner)
        } else {
            (inner, outer)
        };
        let side = known.dot(normal).signum();
        let reflect_prob = match transmit_axis {
            None => 1.0,
            Some(axis) => {
                let outside = if known_outside { known } else { axis };
                self.reflectance(outside.dot(normal).abs())
            }
        };
        Lobes {
            reflect: Lobe {
                center: tangent(known, normal),
                radius: near,
                side: -side,
                prob: reflect_prob,
            },
            transmit: transmit_axis.map(|axis| Lobe {
                center: tangent(axis, normal),
                radius: far,
                side,
                prob: 1.0 - reflect_prob,
            }),
        }
    }

    /// Lobes over source directions that scatter into `dest`.
    fn source_lobes(&self, normal: DVec3, dest: DVec3) -> Lobes {
        // Snell's law is reversible: light leaving along `dest` arrived
        // along the reverse refraction of `-dest`.
        let axis = refract(-dest, normal, self.index_of_refraction).map(|d| -d);
        self.lobes(normal, dest, axis, dest.dot(normal) > 0.0)
    }

    /// Lobes over destination directions reachable from `source`.
    fn dest_lobes(&self, normal: DVec3, source: DVec3) -> Lobes {
        let axis = refract(source, normal, self.index_of_refraction);
        self.lobes(normal, source, axis, source.dot(normal) < 0.0)
    }
}

impl Material for Refract {
    fn bsdf(&self, normal: DVec3, source: DVec3, dest: DVec3) -> Color {
        let lobes = self.source_lobes(normal, dest);
        // Total internal reflection keeps all of the transmitted energy.
        let reflect_color = if lobes.transmit.is_none() {
            self.refract_color
        } else {
            self.specular_color
        };
        let mut color = Color::ZERO;
        if lobes.reflect.contains(normal, source) {
            color += reflect_color * lobes.reflect.weight();
        }
        if let Some(lobe) = lobes.transmit.filter(|lobe| lobe.contains(normal, source)) {
            color += self.refract_color * lobe.weight();
        }
        color
    }

    fn sample_source(&self, rng: &mut dyn RngCore, normal: DVec3, dest: DVec3) -> DVec3 {
        self.source_lobes(normal, dest).sample(rng, normal)
    }

    fn source_density(&self, normal: DVec3, source: DVec3, dest: DVec3) -> f64 {
        self.source_lobes(normal, dest).density(normal, source)
    }

    fn sample_dest(&self, rng: &mut dyn RngCore, normal: DVec3, source: DVec3) -> DVec3 {
        self.dest_lobes(normal, source).sample(rng, normal)
    }

    fn dest_density(&self, normal: DVec3, source: DVec3, dest: DVec3) -> f64 {
        self.dest_lobes(normal, source).density(normal, dest)
    }

    fn emission(&self) -> Color {
        self.emission
    }

    fn ambient(&self) -> Color {
        self.ambient
    }
}

/// Refract a propagation direction through a surface whose normal points
/// out of the medium with the given index.
///
/// The tangential component scales by the ratio of indices and the normal
/// component is rebuilt to keep unit length. Returns `None` on total
/// internal reflection.
pub fn refract(dir: DVec3, normal: DVec3, index_of_refraction: f64) -> Option<DVec3> {
    let cos = dir.dot(normal);
    let ratio = if cos < 0.0 {
        1.0 / index_of_refraction
    } else {
        index_of_refraction
    };
    let tangent = (dir - normal * cos) * ratio;
    let sin_squared = tangent.length_squared();
    if !(sin_squared <= 1.0) {
        return None;
    }
    let normal_part = normal * ((1.0 - sin_squared).sqrt() * cos.signum());
    Some((tangent + normal_part).normalize())
}
