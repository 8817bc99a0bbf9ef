//! Orbit camera, viewport rectangle and NDC <-> pixel mapping.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::config::CameraConfig;

/// Screen-space rectangle of the rendering surface, in CSS/client pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// Client pixel coordinates -> normalized device coordinates (`y` up).
    pub fn client_to_ndc(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            (x - self.left) / self.width * 2.0 - 1.0,
            -((y - self.top) / self.height) * 2.0 + 1.0,
        )
    }

    /// NDC -> client pixel coordinates.
    pub fn ndc_to_client(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            (ndc.x + 1.0) / 2.0 * self.width + self.left,
            (1.0 - ndc.y) / 2.0 * self.height + self.top,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    /// Distance along the ray to the first hit with a sphere, if any hit lies ahead.
    pub fn intersect_sphere(&self, center: Vec3, radius: f32) -> Option<f32> {
        let oc = self.origin - center;
        let b = oc.dot(self.direction);
        let c = oc.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_d = disc.sqrt();
        let near = -b - sqrt_d;
        if near >= 0.0 {
            return Some(near);
        }
        // Origin inside the sphere.
        let far = -b + sqrt_d;
        (far >= 0.0).then_some(far)
    }
}

/// Perspective camera orbiting the origin. Right-handed; looks at the globe center.
#[derive(Debug, Clone)]
pub struct Camera {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
    /// Rotation about the world y axis (radians).
    pub yaw: f32,
    /// Elevation above the equator (radians), kept inside (-pi/2, pi/2).
    pub pitch: f32,
    /// Bumped whenever anything affecting the view-projection changes.
    pub version: u64,
}

impl Camera {
    const PITCH_LIMIT: f32 = 1.55;

    pub fn new(cfg: &CameraConfig, aspect: f32) -> Self {
        Self {
            fov_y: cfg.fov_y_degrees.to_radians(),
            aspect,
            near: cfg.near,
            far: cfg.far,
            distance: cfg.distance,
            yaw: 0.0,
            pitch: 0.0,
            version: 0,
        }
    }

    /// Eye position. With zero yaw/pitch the camera sits on +z.
    pub fn position(&self) -> Vec3 {
        let (sp, cp) = self.pitch.sin_cos();
        let (sy, cy) = self.yaw.sin_cos();
        Vec3::new(sy * cp, sp, cy * cp) * self.distance
    }

    #[inline]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), Vec3::ZERO, Vec3::Y)
    }

    #[inline]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(1e-6), self.near, self.far)
    }

    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if (aspect - self.aspect).abs() > f32::EPSILON {
            self.aspect = aspect;
            self.version += 1;
        }
    }

    /// Orbit by the given angles. Pitch is clamped short of the poles.
    pub fn orbit(&mut self, d_yaw: f32, d_pitch: f32) {
        if d_yaw == 0.0 && d_pitch == 0.0 {
            return;
        }
        self.yaw += d_yaw;
        self.pitch = (self.pitch + d_pitch).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        self.version += 1;
    }

    /// World point -> NDC (x, y in [-1,1] when visible; z is depth). `None` on the eye plane.
    pub fn project(&self, world: Vec3) -> Option<Vec3> {
        let clip = self.view_projection() * world.extend(1.0);
        if clip.w.abs() <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        ndc.is_finite().then_some(ndc)
    }

    /// Ray from the eye through an NDC point, by unprojecting it onto the near and far planes.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Option<Ray> {
        let inv = self.view_projection().inverse();
        let near = unproject(inv, ndc.extend(0.0))?;
        let far = unproject(inv, ndc.extend(1.0))?;
        let dir = far - near;
        if dir.length_squared() <= f32::EPSILON {
            return None;
        }
        Some(Ray {
            origin: near,
            direction: dir.normalize(),
        })
    }
}

fn unproject(inverse_view_proj: Mat4, ndc: Vec3) -> Option<Vec3> {
    let world: Vec4 = inverse_view_proj * ndc.extend(1.0);
    if world.w.abs() <= f32::EPSILON {
        return None;
    }
    let p = world.truncate() / world.w;
    p.is_finite().then_some(p)
}

/// Drag-to-orbit controls with exponential damping. Zoom and pan are disabled.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    damping: f32,
    rotate_speed: f32,
    velocity: Vec2,
}

impl OrbitControls {
    const REST: f32 = 1e-5;

    pub fn new(cfg: &CameraConfig) -> Self {
        Self {
            damping: cfg.damping,
            rotate_speed: cfg.rotate_speed,
            velocity: Vec2::ZERO,
        }
    }

    /// Accumulate a pointer drag in pixels.
    pub fn drag(&mut self, dx: f32, dy: f32) {
        self.velocity += Vec2::new(-dx, dy) * self.rotate_speed;
    }

    /// Apply one damped step to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if self.velocity.length_squared() < Self::REST * Self::REST {
            self.velocity = Vec2::ZERO;
            return false;
        }
        let step = self.velocity * self.damping;
        camera.orbit(step.x, step.y);
        self.velocity -= step;
        true
    }

    pub fn is_resting(&self) -> bool {
        self.velocity == Vec2::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(&CameraConfig::default(), 220.0 / 200.0)
    }

    #[test]
    fn origin_projects_to_center() {
        let ndc = camera().project(Vec3::ZERO).unwrap();
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    }

    #[test]
    fn center_ray_points_at_origin() {
        let cam = camera();
        let ray = cam.ray_from_ndc(Vec2::ZERO).unwrap();
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-3);
        assert!(ray.origin.z > 199.0 && ray.origin.z < 200.0);
    }

    #[test]
    fn ndc_pixel_mapping_roundtrip() {
        let vp = Viewport::new(10.0, 20.0, 220.0, 200.0);
        assert_eq!(vp.ndc_to_client(Vec2::new(-1.0, 1.0)), Vec2::new(10.0, 20.0));
        assert_eq!(vp.ndc_to_client(Vec2::new(1.0, -1.0)), Vec2::new(230.0, 220.0));
        let ndc = vp.client_to_ndc(120.0, 120.0);
        assert!(ndc.length() < 1e-6);
    }

    #[test]
    fn sphere_intersection() {
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 10.0),
            direction: Vec3::NEG_Z,
        };
        assert_eq!(ray.intersect_sphere(Vec3::ZERO, 2.0), Some(8.0));
        assert_eq!(ray.intersect_sphere(Vec3::new(5.0, 0.0, 0.0), 2.0), None);
        // Behind the origin.
        assert_eq!(ray.intersect_sphere(Vec3::new(0.0, 0.0, 20.0), 2.0), None);
    }

    #[test]
    fn orbit_damps_to_rest() {
        let mut cam = camera();
        let mut controls = OrbitControls::new(&CameraConfig::default());
        controls.drag(40.0, 0.0);
        let v0 = cam.version;
        assert!(controls.update(&mut cam));
        assert!(cam.version > v0);
        assert!(cam.yaw < 0.0);
        for _ in 0..1000 {
            controls.update(&mut cam);
        }
        assert!(controls.is_resting());
        // Total rotation converges to the dragged amount.
        assert!((cam.yaw + 40.0 * 0.005).abs() < 1e-3);
        assert!((cam.position().length() - 200.0).abs() < 1e-2);
    }
}
