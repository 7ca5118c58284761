//! The ray-intersection contract between the tracers and a scene.

use crate::material::Material;
use lux_math::{DVec3, Ray};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Where a ray hit an object.
#[derive(Clone)]
pub struct RayCollision {
    /// Distance along the ray in units of its direction vector.
    pub scale: f64,
    /// Geometric normal of the surface. Not flipped toward the ray.
    pub normal: DVec3,
    /// Object-specific data the tracers carry through untouched.
    pub extra: Option<Arc<dyn Any + Send + Sync>>,
}

impl RayCollision {
    pub fn new(scale: f64, normal: DVec3) -> Self {
        Self {
            scale,
            normal,
            extra: None,
        }
    }

    /// Builder method to attach object-specific data.
    pub fn with_extra(mut self, extra: Arc<dyn Any + Send + Sync>) -> Self {
        self.extra = Some(extra);
        self
    }
}

impl fmt::Debug for RayCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RayCollision")
            .field("scale", &self.scale)
            .field("normal", &self.normal)
            .field("extra", &self.extra.is_some())
            .finish()
    }
}

/// Something a ray can hit.
pub trait Object: Send + Sync {
    /// The closest intersection with a positive scale, if any.
    fn cast(&self, ray: &Ray) -> Option<(RayCollision, &dyn Material)>;
}

impl<T: Object + ?Sized> Object for Arc<T> {
    fn cast(&self, ray: &Ray) -> Option<(RayCollision, &dyn Material)> {
        (**self).cast(ray)
    }
}

impl<T: Object + ?Sized> Object for Box<T> {
    fn cast(&self, ray: &Ray) -> Option<(RayCollision, &dyn Material)> {
        (**self).cast(ray)
    }
}

/// A list of objects, hit at the closest collision among them.
#[derive(Default)]
pub struct ObjectList {
    objects: Vec<Box<dyn Object>>,
}

impl ObjectList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the list.
    pub fn add(&mut self, object: impl Object + 'static) {
        self.objects.push(Box::new(object));
    }

    /// Builder variant of [`ObjectList::add`].
    pub fn with(mut self, object: impl Object + 'static) -> Self {
        self.add(object);
        self
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Object for ObjectList {
    fn cast(&self, ray: &Ray) -> Option<(RayCollision, &dyn Material)> {
        let mut closest: Option<(RayCollision, &dyn Material)> = None;
        for object in &self.objects {
            if let Some((collision, material)) = object.cast(ray) {
                let closer = closest
                    .as_ref()
                    .map_or(true, |(best, _)| collision.scale < best.scale);
                if closer {
                    closest = Some((collision, material));
                }
            }
        }
        closest
    }
}
