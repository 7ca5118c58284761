//! Parallel sampling driver shared by both tracers.
//!
//! Pixels are distributed over rayon's worker pool. Each worker owns an
//! entropy-seeded `StdRng` and every pixel slot is written by exactly one
//! worker. Per-pixel estimates are running means, optionally stopped early
//! once the standard deviation of the mean is small enough.

use crate::camera::Camera;
use crate::error::ConfigError;
use crate::material::Color;
use crate::object::Object;
use crate::sampling::gen_f64;
use lux_math::Ray;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Progress callback receiving the fraction of pixels done and the mean
/// number of samples taken per finished pixel.
pub type ProgressFn = Box<dyn Fn(f64, f64) + Send + Sync>;

/// Sampling configuration shared by both tracers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Maximum samples per pixel
    pub num_samples: u32,
    /// Samples taken before adaptive stopping is considered. Zero disables it.
    pub min_samples: u32,
    /// Stop once every channel's standard deviation of the mean is below this
    pub max_stddev: f64,
    /// Stop once every channel is this many standard deviations above 1
    pub oversaturated_stddevs: f64,
    /// Sub-pixel jitter as a fraction of a pixel
    pub antialias: f64,
    /// Maximum number of bounces after the first hit
    pub max_depth: u32,
    /// Paths whose throughput brightness falls to this value end early
    pub cutoff: f64,
    /// Offset applied to bounce rays to avoid self-intersection
    pub epsilon: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            num_samples: 64,
            min_samples: 0,
            max_stddev: 0.0,
            oversaturated_stddevs: 3.0,
            antialias: 1.0,
            max_depth: 5,
            cutoff: 1e-4,
            epsilon: 1e-6,
        }
    }
}

impl RenderConfig {
    /// Check the sample counts before any rendering starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_samples == 0 {
            return Err(ConfigError::ZeroSamples);
        }
        if self.min_samples > self.num_samples {
            return Err(ConfigError::MinSamplesExceedsTotal {
                min: self.min_samples,
                num: self.num_samples,
            });
        }
        if self.min_samples == 0 && self.max_stddev > 0.0 {
            log::warn!("max_stddev is set but min_samples is 0; adaptive sampling is disabled");
        }
        Ok(())
    }

    fn adaptive(&self) -> bool {
        self.min_samples > 0
    }
}

/// Width by height buffer of linear colors.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl Image {
    /// Create a new image filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; (width as usize) * (height as usize)],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} image",
            self.width,
            self.height
        );
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Get the pixel at (x, y). Panics outside the image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    /// Set the pixel at (x, y). Panics outside the image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let index = self.index(x, y);
        self.pixels[index] = color;
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| color_to_rgba(*c)).collect()
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
fn linear_to_gamma(linear: f64) -> f64 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let channel = |c: f64| (255.0 * linear_to_gamma(c).clamp(0.0, 1.0)) as u8;
    [channel(color.x), channel(color.y), channel(color.z), 255]
}

/// One Monte Carlo estimate of the light arriving along a camera ray.
pub trait RaySampler: Send + Sync {
    fn sample(&self, rng: &mut dyn RngCore, object: &dyn Object, ray: &Ray) -> Color;
}

/// Totals reported by a finished render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub pixels: u64,
    pub total_samples: u64,
}

impl RenderStats {
    pub fn mean_samples(&self) -> f64 {
        if self.pixels == 0 {
            return 0.0;
        }
        self.total_samples as f64 / self.pixels as f64
    }
}

/// Per-channel running sums for a single pixel.
#[derive(Debug, Default, Clone, Copy)]
struct Accumulator {
    count: u32,
    sum: Color,
    sum_squared: Color,
}

impl Accumulator {
    fn add(&mut self, color: Color) {
        self.count += 1;
        self.sum += color;
        self.sum_squared += color * color;
    }

    fn mean(&self) -> Color {
        if self.count == 0 {
            return Color::ZERO;
        }
        self.sum / self.count as f64
    }

    /// Sample variance with Bessel's correction, clamped at zero.
    fn variance(&self) -> Color {
        if self.count < 2 {
            return Color::ZERO;
        }
        let n = self.count as f64;
        ((self.sum_squared - self.sum * self.sum / n) / (n - 1.0)).max(Color::ZERO)
    }

    /// Standard deviation of the running mean.
    fn mean_stddev(&self) -> Color {
        let variance = self.variance() / self.count as f64;
        Color::new(variance.x.sqrt(), variance.y.sqrt(), variance.z.sqrt())
    }

    fn converged(&self, config: &RenderConfig) -> bool {
        if self.count < config.min_samples.max(2) {
            return false;
        }
        let stddev = self.mean_stddev();
        if stddev.max_element() < config.max_stddev {
            return true;
        }
        let lower = self.mean() - stddev * config.oversaturated_stddevs;
        lower.min_element() > 1.0
    }
}

/// Jittered camera ray through pixel `(x, y)`.
fn pixel_ray(
    rng: &mut dyn RngCore,
    camera: &Camera,
    config: &RenderConfig,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Ray {
    let jitter_x = config.antialias * (gen_f64(rng) - 0.5);
    let jitter_y = config.antialias * (gen_f64(rng) - 0.5);
    camera.ray(
        x as f64 + 0.5 + jitter_x,
        y as f64 + 0.5 + jitter_y,
        width,
        height,
    )
}

/// Estimate one pixel, returning the mean and the number of samples taken.
#[allow(clippy::too_many_arguments)]
fn sample_pixel(
    sampler: &dyn RaySampler,
    camera: &Camera,
    config: &RenderConfig,
    object: &dyn Object,
    rng: &mut dyn RngCore,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> (Color, u32) {
    let mut acc = Accumulator::default();
    while acc.count < config.num_samples {
        let ray = pixel_ray(rng, camera, config, x, y, width, height);
        acc.add(sampler.sample(rng, object, &ray));
        if config.adaptive() && acc.converged(config) {
            break;
        }
    }
    (acc.mean(), acc.count)
}

/// Render `image` in parallel with `sampler`.
pub fn render_image(
    sampler: &dyn RaySampler,
    camera: &Camera,
    config: &RenderConfig,
    progress: Option<&ProgressFn>,
    object: &dyn Object,
    image: &mut Image,
) -> Result<RenderStats, ConfigError> {
    config.validate()?;
    let (width, height) = (image.width, image.height);
    let total = image.pixels.len();
    log::info!(
        "Rendering {}x{} with up to {} samples per pixel (max depth {})",
        width,
        height,
        config.num_samples,
        config.max_depth
    );
    log::debug!("Render config: {:?}", config);

    let start = Instant::now();
    let done = AtomicUsize::new(0);
    let samples = AtomicU64::new(0);
    let report_every = (total / 100).max(1);

    image
        .pixels
        .par_iter_mut()
        .enumerate()
        .for_each_init(StdRng::from_entropy, |rng, (index, pixel)| {
            let x = (index % width as usize) as u32;
            let y = (index / width as usize) as u32;
            let (color, taken) =
                sample_pixel(sampler, camera, config, object, rng, x, y, width, height);
            *pixel = color;

            samples.fetch_add(taken as u64, Ordering::SeqCst);
            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(progress) = progress {
                if finished % report_every == 0 || finished == total {
                    let taken = samples.load(Ordering::SeqCst);
                    progress(finished as f64 / total as f64, taken as f64 / finished as f64);
                }
            }
        });

    let stats = RenderStats {
        pixels: total as u64,
        total_samples: samples.load(Ordering::SeqCst),
    };
    log::info!(
        "Render finished in {:.2?} ({:.1} samples per pixel)",
        start.elapsed(),
        stats.mean_samples()
    );
    Ok(stats)
}

/// Mean single-sample variance per channel over a `width` by `height` grid.
///
/// Rendering the same scene with different importance-sampling setups and
/// comparing the result shows which setup converges faster.
pub fn ray_variance(
    sampler: &dyn RaySampler,
    camera: &Camera,
    config: &RenderConfig,
    object: &dyn Object,
    width: u32,
    height: u32,
    samples: u32,
) -> Result<f64, ConfigError> {
    if samples == 0 {
        return Err(ConfigError::ZeroSamples);
    }
    let pixels = (width as usize) * (height as usize);
    if pixels == 0 {
        return Ok(0.0);
    }
    let total: f64 = (0..pixels)
        .into_par_iter()
        .map_init(StdRng::from_entropy, |rng, index| {
            let x = (index % width as usize) as u32;
            let y = (index / width as usize) as u32;
            let mut acc = Accumulator::default();
            for _ in 0..samples {
                let ray = pixel_ray(rng, camera, config, x, y, width, height);
                acc.add(sampler.sample(rng, object, &ray));
            }
            acc.variance().element_sum() / 3.0
        })
        .sum();
    let variance = total / pixels as f64;
    log::debug!("Ray variance over {}x{} grid: {}", width, height, variance);
    Ok(variance)
}
