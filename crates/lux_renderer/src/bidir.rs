//! Bidirectional path tracing with multiple importance sampling.
//!
//! Every sample traces one path from the camera and one from the area
//! light, then joins each eye prefix to each light prefix. A joined path of
//! `n` vertices could have been produced by `n` strategies (the eye walking
//! `m` vertices and the light the rest). Its contribution is its intensity
//! divided by the sum of all strategy densities, all expressed relative to
//! pure eye sampling. That sum is a product of many per-bounce factors, so
//! it is accumulated in [`ExpFloat`].
//!
//! The designated light is assumed to be the only emitter in the scene.

use crate::camera::Camera;
use crate::error::ConfigError;
use crate::light::AreaLight;
use crate::material::{brightness, Color, Material};
use crate::object::Object;
use crate::renderer::{
    ray_variance, render_image, Image, ProgressFn, RaySampler, RenderConfig, RenderStats,
};
use crate::sampling::{cosine_hemisphere, gen_f64};
use lux_math::{DVec3, ExpFloat, Ray};
use rand::RngCore;
use std::f64::consts::PI;
use std::sync::Arc;

/// One scattering event on an eye or light path.
///
/// `source` always points along the light's travel, so vertices from either
/// path can be joined in one sequence.
#[derive(Clone, Copy)]
pub struct PathVertex<'a> {
    pub point: DVec3,
    pub normal: DVec3,
    pub source: DVec3,
    pub dest: DVec3,
    pub bsdf: Color,
    pub emission: Color,
    pub source_density: f64,
    pub dest_density: f64,
    /// `None` for the starting point on the light.
    pub material: Option<&'a dyn Material>,
}

impl<'a> PathVertex<'a> {
    fn hit(point: DVec3, normal: DVec3, material: &'a dyn Material) -> Self {
        Self {
            point,
            normal,
            source: DVec3::ZERO,
            dest: DVec3::ZERO,
            bsdf: Color::ZERO,
            emission: material.emission(),
            source_density: 0.0,
            dest_density: 0.0,
            material: Some(material),
        }
    }
}

/// Vertices hit by a path from the camera, nearest first.
pub struct EyePath<'a> {
    pub origin: DVec3,
    pub vertices: Vec<PathVertex<'a>>,
}

/// Vertices of a path starting on the light, the light point first.
pub struct LightPath<'a> {
    /// Area density of the starting point.
    pub start_density: f64,
    pub vertices: Vec<PathVertex<'a>>,
}

/// Segment between consecutive vertices `k` and `k + 1` of a joined path.
struct Edge {
    /// Direction of travel, from vertex `k + 1` to vertex `k`.
    dir: DVec3,
    dist_squared: f64,
    /// `|cos|` at vertex `k`.
    cos: f64,
    /// `|cos|` at vertex `k + 1`.
    cos_next: f64,
}

pub struct BidirPathTracer {
    pub camera: Camera,
    pub config: RenderConfig,
    pub light: Arc<dyn AreaLight>,
    /// Joined paths dimmer than this survive with probability
    /// `brightness / roulette_delta`. Zero disables roulette.
    pub roulette_delta: f64,
    pub progress: Option<ProgressFn>,
}

impl BidirPathTracer {
    pub fn new(camera: Camera, config: RenderConfig, light: Arc<dyn AreaLight>) -> Self {
        Self {
            camera,
            config,
            light,
            roulette_delta: 0.0,
            progress: None,
        }
    }

    /// Builder method to enable roulette.
    pub fn with_roulette_delta(mut self, roulette_delta: f64) -> Self {
        self.roulette_delta = roulette_delta;
        self
    }

    /// Builder method to set the progress callback.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        if !self.roulette_delta.is_finite() || self.roulette_delta < 0.0 {
            return Err(ConfigError::InvalidRouletteDelta(self.roulette_delta));
        }
        Ok(())
    }

    /// Render every pixel of `image`.
    pub fn render(
        &self,
        object: &dyn Object,
        image: &mut Image,
    ) -> Result<RenderStats, ConfigError> {
        self.validate()?;
        log::info!(
            "Bidirectional path tracer: light area {:.3}, roulette delta {}",
            self.light.area(),
            self.roulette_delta
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

    /// Follow a camera ray for up to `max_depth + 1` hits.
    pub fn trace_eye_path<'a>(
        &self,
        rng: &mut dyn RngCore,
        object: &'a dyn Object,
        ray: &Ray,
    ) -> EyePath<'a> {
        let max_vertices = self.config.max_depth as usize + 1;
        let mut vertices = Vec::with_capacity(max_vertices);
        let origin = ray.origin();
        let mut throughput = Color::ONE;
        let mut ray = *ray;

        while let Some((collision, material)) = object.cast(&ray) {
            let point = ray.at(collision.scale);
            let normal = collision.normal;
            let mut vertex = PathVertex::hit(point, normal, material);
            vertex.dest = -ray.direction().normalize();
            if vertices.len() + 1 == max_vertices {
                vertices.push(vertex);
                break;
            }

            let source = material.sample_source(rng, normal, vertex.dest);
            vertex.source = source;
            vertex.source_density = material.source_density(normal, source, vertex.dest);
            vertex.dest_density = material.dest_density(normal, source, vertex.dest);
            vertex.bsdf = material.bsdf(normal, source, vertex.dest);
            vertices.push(vertex);

            if !(vertex.source_density > 0.0) {
                break;
            }
            throughput *= vertex.bsdf * (normal.dot(source).abs() / vertex.source_density);
            if brightness(throughput) <= self.config.cutoff {
                break;
            }
            ray = Ray::new(point - source * self.config.epsilon, -source);
        }

        EyePath { origin, vertices }
    }

    /// Start on the light and follow the emitted light for up to
    /// `max_depth` vertices, the light point included.
    pub fn trace_light_path<'a>(
        &self,
        rng: &mut dyn RngCore,
        object: &'a dyn Object,
    ) -> LightPath<'a> {
        let start_density = 1.0 / self.light.area();
        let max_vertices = self.config.max_depth as usize;
        let mut vertices = Vec::with_capacity(max_vertices);
        if max_vertices == 0 {
            return LightPath {
                start_density,
                vertices,
            };
        }

        let sample = self.light.sample_light(rng);
        let dest = cosine_hemisphere(rng, sample.normal);
        vertices.push(PathVertex {
            point: sample.point,
            normal: sample.normal,
            source: DVec3::ZERO,
            dest,
            bsdf: Color::ZERO,
            emission: sample.emission,
            source_density: 0.0,
            dest_density: emitted_density(sample.normal, dest),
            material: None,
        });

        let mut throughput = Color::ONE;
        let mut ray = Ray::new(sample.point + dest * self.config.epsilon, dest);
        while vertices.len() < max_vertices {
            let Some((collision, material)) = object.cast(&ray) else {
                break;
            };
            let point = ray.at(collision.scale);
            let normal = collision.normal;
            let mut vertex = PathVertex::hit(point, normal, material);
            vertex.source = ray.direction().normalize();
            if vertices.len() + 1 == max_vertices {
                vertices.push(vertex);
                break;
            }

            let dest = material.sample_dest(rng, normal, vertex.source);
            vertex.dest = dest;
            vertex.dest_density = material.dest_density(normal, vertex.source, dest);
            vertex.source_density = material.source_density(normal, vertex.source, dest);
            vertex.bsdf = material.bsdf(normal, vertex.source, dest);
            vertices.push(vertex);

            if !(vertex.dest_density > 0.0) {
                break;
            }
            throughput *= vertex.bsdf * (normal.dot(dest).abs() / vertex.dest_density);
            if brightness(throughput) <= self.config.cutoff {
                break;
            }
            ray = Ray::new(point + dest * self.config.epsilon, dest);
        }

        LightPath {
            start_density,
            vertices,
        }
    }

    /// Sum the contributions of every eye and light prefix pair.
    pub fn combine(
        &self,
        rng: &mut dyn RngCore,
        object: &dyn Object,
        eye: &EyePath,
        light: &LightPath,
    ) -> Color {
        let Some(first) = eye.vertices.first() else {
            return Color::ZERO;
        };
        let mut color = first.material.map_or(Color::ZERO, |m| m.ambient());

        let max_vertices = self.config.max_depth as usize + 1;
        for i in 1..=eye.vertices.len() {
            for j in 0..=light.vertices.len() {
                if i + j > max_vertices {
                    break;
                }
                if let Some(contribution) = self.candidate(rng, object, eye, light, i, j) {
                    color += contribution;
                }
            }
        }
        color
    }

    /// Contribution of the first `i` eye vertices joined to the first `j`
    /// light vertices, or `None` if it carries no light or is occluded.
    fn candidate(
        &self,
        rng: &mut dyn RngCore,
        object: &dyn Object,
        eye: &EyePath,
        light: &LightPath,
        i: usize,
        j: usize,
    ) -> Option<Color> {
        let path: Vec<&PathVertex> = eye.vertices[..i]
            .iter()
            .chain(light.vertices[..j].iter().rev())
            .collect();
        let n = path.len();
        let emission = path[n - 1].emission;
        if emission == Color::ZERO {
            return None;
        }

        let mut edges = Vec::with_capacity(n - 1);
        for k in 0..n - 1 {
            let diff = path[k].point - path[k + 1].point;
            let dist_squared = diff.length_squared();
            if !(dist_squared > 0.0) {
                return None;
            }
            let dir = diff / dist_squared.sqrt();
            edges.push(Edge {
                dir,
                dist_squared,
                cos: path[k].normal.dot(dir).abs(),
                cos_next: path[k + 1].normal.dot(dir).abs(),
            });
        }
        let dest = |k: usize| if k == 0 { path[0].dest } else { edges[k - 1].dir };

        let mut intensity = emission;
        let mut eye_densities = Vec::with_capacity(n);
        let mut light_densities = vec![0.0; n];
        for k in 0..n - 1 {
            let material = path[k].material?;
            let (normal, source) = (path[k].normal, edges[k].dir);
            intensity *= material.bsdf(normal, source, dest(k)) * edges[k].cos;
            eye_densities.push(material.source_density(normal, source, dest(k)));
            if k > 0 {
                light_densities[k] = material.dest_density(normal, source, dest(k));
            }
        }
        if intensity == Color::ZERO {
            return None;
        }
        if n > 1 {
            light_densities[n - 1] = emitted_density(path[n - 1].normal, edges[n - 2].dir);
        }

        let density =
            strategy_density_sum(&edges, &eye_densities, &light_densities, light.start_density);
        if density.is_zero() || !density.is_finite() {
            return None;
        }
        let scale = |c: f64| (ExpFloat::new(c) / density).to_f64();
        let mut contribution =
            Color::new(scale(intensity.x), scale(intensity.y), scale(intensity.z));

        if self.roulette_delta > 0.0 {
            let value = brightness(contribution);
            if value < self.roulette_delta {
                let keep = value / self.roulette_delta;
                if gen_f64(rng) >= keep {
                    return None;
                }
                contribution /= keep;
            }
        }

        if j > 0 && self.occluded(object, path[i - 1].point, path[i].point) {
            return None;
        }
        Some(contribution)
    }

    /// Whether anything lies strictly between two path vertices.
    fn occluded(&self, object: &dyn Object, from: DVec3, to: DVec3) -> bool {
        let epsilon = self.config.epsilon;
        let diff = to - from;
        let dist = diff.length();
        let dir = diff / dist;
        let ray = Ray::new(from + dir * epsilon, dir);
        object
            .cast(&ray)
            .is_some_and(|(collision, _)| collision.scale < dist - 2.0 * epsilon)
    }
}

impl RaySampler for BidirPathTracer {
    fn sample(&self, rng: &mut dyn RngCore, object: &dyn Object, ray: &Ray) -> Color {
        let eye = self.trace_eye_path(rng, object, ray);
        if eye.vertices.is_empty() {
            return Color::ZERO;
        }
        let light = self.trace_light_path(rng, object);
        self.combine(rng, object, &eye, &light)
    }
}

/// Density of the cosine-weighted emission direction on the light.
fn emitted_density(normal: DVec3, dest: DVec3) -> f64 {
    4.0 * normal.dot(dest).max(0.0)
}

/// Sum over every strategy of the density of generating this path,
/// relative to sampling it entirely from the eye.
///
/// Strategy `m` samples vertices `0..=m` from the eye and the rest from the
/// light. The eye part is the product of the eye densities before `m`. The
/// light part starts with the area density of the light point, converts the
/// join at edge `m` from area to solid angle with `4π·d²/cos`, and scales
/// each light-sampled bounce by its density and the ratio of the cosines at
/// either end of its edge.
fn strategy_density_sum(
    edges: &[Edge],
    eye_densities: &[f64],
    light_densities: &[f64],
    start_density: f64,
) -> ExpFloat {
    let n = edges.len() + 1;
    let mut total = ExpFloat::ZERO;
    let mut eye_prefix = ExpFloat::ONE;
    for m in 0..n {
        let strategy = if m == n - 1 {
            eye_prefix
        } else {
            let join = 4.0 * PI * edges[m].dist_squared / edges[m].cos_next;
            let mut p = eye_prefix * start_density * join;
            for k in m + 1..n - 1 {
                p = p * (light_densities[k + 1] * edges[k].cos / edges[k].cos_next);
            }
            p
        };
        total = total + strategy;
        if m < n - 1 {
            eye_prefix = eye_prefix * eye_densities[m];
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuboid::Cuboid;
    use crate::focus::SphereFocusPoint;
    use crate::light::SphereAreaLight;
    use crate::material::Lambert;
    use crate::object::ObjectList;
    use crate::recursive::RecursiveRayTracer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn room() -> (ObjectList, Arc<SphereAreaLight>) {
        let center = DVec3::new(0.0, -19.0, 5.0);
        let light = Arc::new(SphereAreaLight::new(center, 1.0, Color::splat(100.0)));
        let scene = ObjectList::new()
            .with(Cuboid::inverted(
                DVec3::new(-10.0, -20.0, 0.0),
                DVec3::new(10.0, 10.0, 10.0),
                Lambert::new(Color::splat(0.3)).with_ambient(Color::splat(0.05)),
            ))
            .with(light.clone());
        (scene, light)
    }

    fn lit_floor() -> (ObjectList, Arc<SphereAreaLight>) {
        let center = DVec3::new(0.0, 0.0, 4.0);
        let light = Arc::new(SphereAreaLight::new(center, 1.0, Color::splat(10.0)));
        let scene = ObjectList::new()
            .with(Cuboid::new(
                DVec3::new(-50.0, -50.0, -1.0),
                DVec3::new(50.0, 50.0, 0.0),
                Lambert::new(Color::splat(0.5)),
            ))
            .with(light.clone());
        (scene, light)
    }

    #[test]
    fn test_validation_errors() {
        let (_, light) = room();
        let tracer = BidirPathTracer::new(Camera::default(), RenderConfig::default(), light.clone())
            .with_roulette_delta(-1.0);
        assert_eq!(tracer.validate(), Err(ConfigError::InvalidRouletteDelta(-1.0)));

        let tracer = tracer.with_roulette_delta(f64::INFINITY);
        assert!(tracer.validate().is_err());

        let tracer = tracer.with_roulette_delta(0.01);
        assert!(tracer.validate().is_ok());
    }

    #[test]
    fn test_path_lengths_and_directions() {
        let (scene, light) = room();
        let config = RenderConfig {
            max_depth: 2,
            ..Default::default()
        };
        let tracer = BidirPathTracer::new(Camera::default(), config, light);
        let mut rng = StdRng::seed_from_u64(71);
        let ray = Ray::new(DVec3::new(0.0, 0.0, 5.0), DVec3::new(0.3, 1.0, -0.2));

        for _ in 0..200 {
            let eye = tracer.trace_eye_path(&mut rng, &scene, &ray);
            assert_eq!(eye.origin, ray.origin);
            assert!(!eye.vertices.is_empty() && eye.vertices.len() <= 3);
            for pair in eye.vertices.windows(2) {
                // The next vertex was reached by travelling against the sampled source
                assert!((pair[1].dest - pair[0].source).length() < 1e-9);
            }

            let light_path = tracer.trace_light_path(&mut rng, &scene);
            assert!((light_path.start_density - 1.0 / (4.0 * PI)).abs() < 1e-12);
            assert!(!light_path.vertices.is_empty() && light_path.vertices.len() <= 2);
            assert!(light_path.vertices[0].material.is_none());
            assert_eq!(light_path.vertices[0].emission, Color::splat(100.0));
            for pair in light_path.vertices.windows(2) {
                let travel = (pair[1].point - pair[0].point).normalize();
                assert!((pair[1].source - travel).length() < 1e-9);
                assert!((pair[0].dest - travel).length() < 1e-9);
            }
        }
    }

    #[test]
    fn test_light_path_cutoff_follows_albedo() {
        // Lambert light bounces carry exactly the albedo: 0.5, then 0.25,
        // which falls under the cutoff after the second hit.
        let light = Arc::new(SphereAreaLight::new(DVec3::new(0.0, 0.0, 5.0), 1.0, Color::ONE));
        let scene = ObjectList::new().with(Cuboid::inverted(
            DVec3::new(-10.0, -10.0, 0.0),
            DVec3::new(10.0, 10.0, 10.0),
            Lambert::new(Color::splat(0.5)),
        ));
        let config = RenderConfig {
            max_depth: 10,
            cutoff: 0.3,
            ..Default::default()
        };
        let tracer = BidirPathTracer::new(Camera::default(), config, light);
        let mut rng = StdRng::seed_from_u64(74);

        for _ in 0..500 {
            let path = tracer.trace_light_path(&mut rng, &scene);
            assert_eq!(path.vertices.len(), 3);
        }
    }

    #[test]
    fn test_max_depth_zero_sees_emission_and_ambient() {
        let (scene, light) = room();
        let config = RenderConfig {
            max_depth: 0,
            ..Default::default()
        };
        let tracer = BidirPathTracer::new(Camera::default(), config, light);
        let mut rng = StdRng::seed_from_u64(72);

        assert!(tracer.trace_light_path(&mut rng, &scene).vertices.is_empty());

        let wall = Ray::new(DVec3::new(0.0, 0.0, 5.0), DVec3::Y);
        assert_eq!(tracer.sample(&mut rng, &scene, &wall), Color::splat(0.05));

        let at_light = Ray::new(DVec3::new(0.0, 0.0, 5.0), -DVec3::Y);
        assert_eq!(tracer.sample(&mut rng, &scene, &at_light), Color::splat(100.0));

        let outside = Ray::new(DVec3::new(0.0, 0.0, 50.0), DVec3::Z);
        assert_eq!(tracer.sample(&mut rng, &scene, &outside), Color::ZERO);
    }

    #[test]
    fn test_direct_light_matches_closed_form() {
        // A sphere of radiance L subtending half-angle a above a Lambertian
        // point reflects albedo * L * sin²(a).
        let expected = 0.5 * 10.0 / 16.0;
        let (scene, light) = lit_floor();
        let config = RenderConfig {
            max_depth: 1,
            cutoff: 0.0,
            ..Default::default()
        };
        let ray = Ray::new(DVec3::new(2.0, 0.0, 1.0), DVec3::new(-2.0, 0.0, -1.0));
        let samples = 20_000;

        let bidir = BidirPathTracer::new(Camera::default(), config.clone(), light.clone());
        let mut rng = StdRng::seed_from_u64(73);
        let mut sum = Color::ZERO;
        for _ in 0..samples {
            sum += bidir.sample(&mut rng, &scene, &ray);
        }
        let mean = sum / samples as f64;
        assert!((mean.x - expected).abs() < 0.03 * expected, "bidir {mean} vs {expected}");

        let recursive = RecursiveRayTracer::new(Camera::default(), config)
            .with_focus_point(SphereFocusPoint::new(light.center(), light.radius()), 0.5);
        let mut sum = Color::ZERO;
        for _ in 0..samples {
            sum += recursive.sample(&mut rng, &scene, &ray);
        }
        let mean = sum / samples as f64;
        assert!((mean.x - expected).abs() < 0.03 * expected, "recursive {mean} vs {expected}");
    }

    #[test]
    fn test_agrees_with_recursive_tracer() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (scene, light) = room();
        let config = RenderConfig {
            num_samples: 15_000,
            max_depth: 3,
            antialias: 0.0,
            cutoff: 0.0,
            ..Default::default()
        };
        let camera = Camera::look_at(DVec3::new(0.0, 0.0, 5.0), DVec3::new(0.0, 10.0, 5.0), 90.0);

        let recursive = RecursiveRayTracer::new(camera.clone(), config.clone())
            .with_focus_point(SphereFocusPoint::new(light.center(), light.radius()), 0.3);
        let bidir = BidirPathTracer::new(camera, config, light).with_roulette_delta(1e-3);

        let mut expected = Image::new(4, 4);
        let mut actual = Image::new(4, 4);
        recursive.render(&scene, &mut expected).unwrap();
        bidir.render(&scene, &mut actual).unwrap();

        for y in 0..4 {
            for x in 0..4 {
                let a = expected.get(x, y);
                let b = actual.get(x, y);
                assert!(a.x > 0.05, "pixel ({x}, {y}) too dark: {a}");
                assert!((a - b).length() < 0.02, "pixel ({x}, {y}): recursive {a} vs bidir {b}");
            }
        }
    }
}
