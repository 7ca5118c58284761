//! Lux renderer - Monte Carlo light transport
//!
//! Materials, a unidirectional path tracer with focus-point importance
//! sampling, a bidirectional path tracer with multiple importance sampling,
//! and the parallel driver that turns ray samples into an image.
//!
//! Scenes are consumed through the [`Object`] trait only; the sphere and box
//! primitives here are enough for area lights and simple test rooms.

mod bidir;
mod camera;
mod cuboid;
mod error;
mod focus;
mod henyey_greenstein;
mod joined;
mod light;
mod material;
mod object;
mod phong;
mod recursive;
mod refract;
mod renderer;
mod sampling;
mod sphere;

#[cfg(test)]
mod testing;

pub use bidir::{BidirPathTracer, EyePath, LightPath, PathVertex};
pub use camera::Camera;
pub use cuboid::Cuboid;
pub use error::ConfigError;
pub use focus::{FocusPoint, PhongFocusPoint, SphereFocusPoint};
pub use henyey_greenstein::HenyeyGreenstein;
pub use joined::Joined;
pub use light::{AreaLight, LightSample, PointLight, SphereAreaLight};
pub use material::{brightness, Color, Lambert, Material};
pub use object::{Object, ObjectList, RayCollision};
pub use phong::Phong;
pub use recursive::RecursiveRayTracer;
pub use refract::{refract, Refract, REFRACT_EPSILON};
pub use renderer::{
    color_to_rgba, ray_variance, render_image, Image, ProgressFn, RaySampler, RenderConfig,
    RenderStats,
};
pub use sphere::Sphere;

/// Re-export the math types the public API uses
pub use lux_math::{DVec3, ExpFloat, Interval, Ray};
