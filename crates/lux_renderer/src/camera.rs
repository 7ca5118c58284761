//! Pinhole camera.

use lux_math::{DVec3, Ray};

/// A pinhole camera mapping continuous pixel coordinates to ray directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub origin: DVec3,
    forward: DVec3,
    screen_x: DVec3,
    screen_y: DVec3,
    field_of_view: f64, // Degrees, across the larger image dimension
}

impl Camera {
    /// Camera at `origin` looking at `target`, with +Z up.
    pub fn look_at(origin: DVec3, target: DVec3, field_of_view: f64) -> Self {
        let mut camera = Self {
            origin,
            forward: (target - origin).normalize(),
            screen_x: DVec3::X,
            screen_y: DVec3::NEG_Y,
            field_of_view,
        };
        camera.set_up(DVec3::Z);
        camera
    }

    /// Builder method to choose the up vector.
    pub fn with_up(mut self, up: DVec3) -> Self {
        self.set_up(up);
        self
    }

    fn set_up(&mut self, up: DVec3) {
        // Image x grows to the right and image y grows downward
        let mut right = self.forward.cross(up);
        if right.length_squared() < 1e-12 {
            // Looking straight along `up`
            right = self.forward.cross(self.forward.any_orthonormal_vector());
        }
        self.screen_x = right.normalize();
        self.screen_y = self.forward.cross(self.screen_x);
    }

    pub fn forward(&self) -> DVec3 {
        self.forward
    }

    pub fn field_of_view(&self) -> f64 {
        self.field_of_view
    }

    /// Distance from the origin to the image plane spanning `[-1, 1]`.
    fn plane_distance(&self) -> f64 {
        1.0 / (self.field_of_view.to_radians() / 2.0).tan()
    }

    /// Unit direction through the continuous pixel position `(x, y)`.
    ///
    /// The larger image dimension spans the full field of view. The other
    /// axis is shrunk to keep pixels square.
    pub fn direction(&self, x: f64, y: f64, width: u32, height: u32) -> DVec3 {
        let width = width as f64;
        let height = height as f64;
        let mut u = 2.0 * x / width - 1.0;
        let mut v = 2.0 * y / height - 1.0;
        if width > height {
            v *= height / width;
        } else {
            u *= width / height;
        }
        (self.forward * self.plane_distance() + self.screen_x * u + self.screen_y * v).normalize()
    }

    /// Ray from the camera through `(x, y)`.
    pub fn ray(&self, x: f64, y: f64, width: u32, height: u32) -> Ray {
        Ray::new(self.origin, self.direction(x, y, width, height))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(DVec3::ZERO, DVec3::Y, 90.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_center_is_forward() {
        let camera = Camera::look_at(DVec3::new(1.0, 2.0, 3.0), DVec3::new(1.0, 12.0, 3.0), 60.0);
        let d = camera.direction(50.0, 25.0, 100, 50);
        assert!((d - DVec3::Y).length() < 1e-12);
        assert_eq!(camera.forward(), DVec3::Y);
    }

    #[test]
    fn test_camera_screen_axes() {
        // Looking along +Y with +Z up, image right is +X and image down is -Z
        let camera = Camera::default();
        let right = camera.direction(100.0, 50.0, 100, 100);
        let bottom = camera.direction(50.0, 100.0, 100, 100);
        assert!(right.x > 0.0 && right.z.abs() < 1e-12);
        assert!(bottom.z < 0.0 && bottom.x.abs() < 1e-12);
    }

    #[test]
    fn test_camera_field_of_view() {
        let camera = Camera::default();
        // The edge of the wider axis is 45 degrees off-center at a 90 degree FOV.
        let edge = camera.direction(200.0, 50.0, 200, 100);
        assert!((edge.dot(DVec3::Y) - (0.5f64).sqrt()).abs() < 1e-12);

        // The narrow axis is shrunk by the aspect ratio.
        let top = camera.direction(100.0, 0.0, 200, 100);
        assert!((top.z / top.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_camera_with_up() {
        let camera = Camera::look_at(DVec3::ZERO, DVec3::Z, 90.0).with_up(DVec3::Y);
        let ray = camera.ray(1.0, 0.5, 1, 1);
        assert_eq!(ray.origin, DVec3::ZERO);
        // Looking along +Z with +Y up puts image right at -X
        assert!(ray.direction.x < 0.0);
    }

    #[test]
    fn test_camera_looking_along_up() {
        for target in [DVec3::new(0.0, 0.0, -10.0), DVec3::new(0.0, 0.0, 10.0)] {
            let camera = Camera::look_at(DVec3::ZERO, target, 60.0);
            let forward = camera.forward();
            for (x, y) in [(0.0, 0.0), (4.0, 1.0), (2.0, 2.0)] {
                let d = camera.direction(x, y, 4, 4);
                assert!(d.is_finite());
                assert!((d.length() - 1.0).abs() < 1e-12);
                assert!(d.dot(forward) > 0.0);
            }
            let center = camera.direction(2.0, 2.0, 4, 4);
            assert!((center - forward).length() < 1e-12);
        }
    }
}
