//! Unidirectional path tracer with explicit point lights and focus points.

use crate::camera::Camera;
use crate::error::{probability_sum, ConfigError};
use crate::focus::FocusPoint;
use crate::light::PointLight;
use crate::material::{brightness, Color, Material};
use crate::object::Object;
use crate::renderer::{
    ray_variance, render_image, Image, ProgressFn, RaySampler, RenderConfig, RenderStats,
};
use crate::sampling::gen_f64;
use lux_math::{DVec3, Ray};
use rand::RngCore;

/// Tolerance on focus point probabilities summing above one.
const PROB_TOLERANCE: f64 = 1e-9;

/// Traces one path per sample from the camera, bouncing until `max_depth`.
///
/// Each bounce direction comes either from a focus point, chosen with its
/// configured probability, or from the material. The path is weighted by
/// the density of the whole mixture.
pub struct RecursiveRayTracer {
    pub camera: Camera,
    pub config: RenderConfig,
    pub lights: Vec<PointLight>,
    pub focus_points: Vec<Box<dyn FocusPoint>>,
    pub focus_point_probs: Vec<f64>,
    pub progress: Option<ProgressFn>,
}

impl RecursiveRayTracer {
    pub fn new(camera: Camera, config: RenderConfig) -> Self {
        Self {
            camera,
            config,
            lights: Vec::new(),
            focus_points: Vec::new(),
            focus_point_probs: Vec::new(),
            progress: None,
        }
    }

    /// Builder method to add a point light.
    pub fn with_light(mut self, light: PointLight) -> Self {
        self.lights.push(light);
        self
    }

    /// Builder method to add a focus point sampled with probability `prob`.
    pub fn with_focus_point(mut self, focus_point: impl FocusPoint + 'static, prob: f64) -> Self {
        self.focus_points.push(Box::new(focus_point));
        self.focus_point_probs.push(prob);
        self
    }

    /// Builder method to set the progress callback.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        if self.focus_points.len() != self.focus_point_probs.len() {
            return Err(ConfigError::FocusPointMismatch {
                points: self.focus_points.len(),
                probs: self.focus_point_probs.len(),
            });
        }
        match probability_sum(&self.focus_point_probs) {
            Some(sum) if sum <= 1.0 + PROB_TOLERANCE => Ok(()),
            sum => Err(ConfigError::InvalidFocusProbabilities {
                sum: sum.unwrap_or(f64::NAN),
            }),
        }
    }

    /// Render every pixel of `image`.
    pub fn render(
        &self,
        object: &dyn Object,
        image: &mut Image,
    ) -> Result<RenderStats, ConfigError> {
        self.validate()?;
        log::info!(
            "Recursive path tracer: {} point lights, {} focus points",
            self.lights.len(),
            self.focus_points.len()
        );
        render_image(self, &self.camera, &self.config, self.progress.as_ref(), object, image)
    }

    /// Mean single-sample variance over a small grid. See [`ray_variance`].
    pub fn ray_variance(
        &self,
        object: &dyn Object,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<f64, ConfigError> {
        self.validate()?;
        ray_variance(self, &self.camera, &self.config, object, width, height, samples)
    }

    /// Light from the point lights reflected toward `dest`.
    fn direct_light(
        &self,
        object: &dyn Object,
        material: &dyn Material,
        point: DVec3,
        normal: DVec3,
        dest: DVec3,
    ) -> Color {
        let epsilon = self.config.epsilon;
        let mut color = Color::ZERO;
        for light in &self.lights {
            let to_light = light.origin - point;
            let dist = to_light.length();
            if dist <= 2.0 * epsilon {
                continue;
            }
            let dir = to_light / dist;
            let bsdf = material.bsdf(normal, -dir, dest);
            if bsdf == Color::ZERO {
                continue;
            }
            let shadow = Ray::new(point + dir * epsilon, dir);
            let blocked = object
                .cast(&shadow)
                .is_some_and(|(collision, _)| collision.scale < dist - 2.0 * epsilon);
            if !blocked {
                color += light.shade(normal, to_light) * bsdf;
            }
        }
        color
    }

    fn sample_source(
        &self,
        rng: &mut dyn RngCore,
        material: &dyn Material,
        point: DVec3,
        normal: DVec3,
        dest: DVec3,
    ) -> DVec3 {
        let mut u = gen_f64(rng);
        for (focus_point, prob) in self.focus_points.iter().zip(&self.focus_point_probs) {
            if u < *prob {
                return focus_point.sample_source(rng, point, normal, dest);
            }
            u -= prob;
        }
        material.sample_source(rng, normal, dest)
    }

    /// Density of the focus point and material mixture.
    fn source_density(
        &self,
        material: &dyn Material,
        point: DVec3,
        normal: DVec3,
        source: DVec3,
        dest: DVec3,
    ) -> f64 {
        let mut density = 0.0;
        let mut remaining = 1.0;
        for (focus_point, prob) in self.focus_points.iter().zip(&self.focus_point_probs) {
            if *prob > 0.0 {
                density += prob * focus_point.source_density(point, normal, source, dest);
            }
            remaining -= prob;
        }
        if remaining > 0.0 {
            density += remaining * material.source_density(normal, source, dest);
        }
        density
    }
}

impl RaySampler for RecursiveRayTracer {
    fn sample(&self, rng: &mut dyn RngCore, object: &dyn Object, ray: &Ray) -> Color {
        let mut color = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut ray = *ray;

        for depth in 0..=self.config.max_depth {
            let Some((collision, material)) = object.cast(&ray) else {
                break;
            };
            let point = ray.at(collision.scale);
            let normal = collision.normal;
            let dest = -ray.direction().normalize();

            color += throughput * material.emission();
            if depth == 0 {
                color += throughput * material.ambient();
            }
            color += throughput * self.direct_light(object, material, point, normal, dest);

            if depth == self.config.max_depth {
                break;
            }

            let source = self.sample_source(rng, material, point, normal, dest);
            let density = self.source_density(material, point, normal, source, dest);
            if !(density > 0.0) {
                break;
            }
            let cos = normal.dot(source).abs();
            throughput *= material.bsdf(normal, source, dest) * (cos / density);
            if brightness(throughput) <= self.config.cutoff {
                break;
            }
            ray = Ray::new(point - source * self.config.epsilon, -source);
        }
        color
    }
}
