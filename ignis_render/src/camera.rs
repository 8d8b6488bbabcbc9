use glamx::{Mat4, Vec3};
use ignis_device::wgpu::Color;
use ignis_device::{ClearFlags, ClearOptions, Rect, RenderTarget};
use ignis_utils::Frustum;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    /// Vertical field of view in radians.
    Perspective { fov_y: f32, near: f32, far: f32 },
    /// Full vertical extent of the view volume.
    Orthographic { height: f32, near: f32, far: f32 },
}

impl Projection {
    pub fn near(&self) -> f32 {
        match *self {
            Projection::Perspective { near, .. } | Projection::Orthographic { near, .. } => near,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => far,
        }
    }

    fn matrix(&self, aspect: f32) -> Mat4 {
        match *self {
            Projection::Perspective { fov_y, near, far } => {
                Mat4::perspective_rh(fov_y, aspect, near, far)
            }
            Projection::Orthographic { height, near, far } => {
                let half_h = height * 0.5;
                let half_w = half_h * aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far)
            }
        }
    }
}

/// A viewpoint with its projection, target and viewport.
///
/// The projection matrix is cached and only rebuilt after a projection parameter or
/// the aspect ratio changed. View, view-projection and frustum are refreshed by
/// [`Camera::update`] once per frame.
#[derive(Debug, Clone)]
pub struct Camera {
    projection: Projection,
    /// `None` follows the viewport's aspect ratio.
    aspect: Option<f32>,
    transform: Mat4,
    /// Normalized `(x, y, width, height)` of the target.
    rect: [f32; 4],
    clear: ClearOptions,
    target: Option<RenderTarget>,
    depth_prepass: bool,

    projection_dirty: bool,
    cached_aspect: f32,
    projection_matrix: Mat4,
    view: Mat4,
    view_projection: Mat4,
    frustum: Frustum,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(60f32.to_radians(), 0.1, 1000.0)
    }
}

impl Camera {
    pub fn perspective(fov_y: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Perspective { fov_y, near, far })
    }

    pub fn orthographic(height: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Orthographic { height, near, far })
    }

    pub fn new(projection: Projection) -> Self {
        Self {
            projection,
            aspect: None,
            transform: Mat4::IDENTITY,
            rect: [0.0, 0.0, 1.0, 1.0],
            clear: ClearOptions {
                color: Color::BLACK,
                ..ClearOptions::default()
            },
            target: None,
            depth_prepass: false,
            projection_dirty: true,
            cached_aspect: 1.0,
            projection_matrix: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            frustum: Frustum::from_matrix(&Mat4::IDENTITY),
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        if self.projection != projection {
            self.projection = projection;
            self.projection_dirty = true;
        }
    }

    pub fn set_aspect(&mut self, aspect: Option<f32>) {
        if self.aspect != aspect {
            self.aspect = aspect;
            self.projection_dirty = true;
        }
    }

    pub fn near(&self) -> f32 {
        self.projection.near()
    }

    pub fn far(&self) -> f32 {
        self.projection.far()
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.transform = Mat4::look_at_rh(eye, target, up).inverse();
    }

    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    /// Unit vector the camera looks along.
    pub fn forward(&self) -> Vec3 {
        (-self.transform.z_axis.truncate()).normalize_or_zero()
    }

    pub fn set_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.rect = [x, y, width, height];
    }

    pub fn clear_options(&self) -> &ClearOptions {
        &self.clear
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear.color = color;
    }

    pub fn set_clear_flags(&mut self, flags: ClearFlags) {
        self.clear.flags = flags;
    }

    pub fn target(&self) -> Option<&RenderTarget> {
        self.target.as_ref()
    }

    /// `None` renders to the backbuffer.
    pub fn set_target(&mut self, target: Option<RenderTarget>) {
        self.target = target;
    }

    pub fn depth_prepass(&self) -> bool {
        self.depth_prepass
    }

    /// Requests a depth-only pass into an auxiliary depth texture before shading.
    pub fn set_depth_prepass(&mut self, enabled: bool) {
        self.depth_prepass = enabled;
    }

    /// Pixel viewport on a target of the given size.
    pub fn viewport(&self, width: u32, height: u32) -> Rect {
        let [x, y, w, h] = self.rect;
        Rect::from_normalized(x, y, w, h, width, height).clamped(width, height)
    }

    pub fn projection_matrix(&mut self, aspect: f32) -> Mat4 {
        let aspect = self.aspect.unwrap_or(aspect);
        if self.projection_dirty || self.cached_aspect != aspect {
            self.projection_matrix = self.projection.matrix(aspect);
            self.cached_aspect = aspect;
            self.projection_dirty = false;
        }
        self.projection_matrix
    }

    /// Refreshes view, view-projection and frustum for a viewport of the given aspect ratio.
    pub fn update(&mut self, aspect: f32) {
        let projection = self.projection_matrix(aspect);
        self.view = self.transform.inverse();
        self.view_projection = projection * self.view;
        self.frustum = Frustum::from_matrix(&self.view_projection);
    }

    pub fn aspect(&self) -> f32 {
        self.cached_aspect
    }

    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// World-space corners of the view volume cut at `distance`, near face first.
    ///
    /// Uses the aspect ratio of the last [`Camera::update`].
    pub fn frustum_corners(&self, distance: f32) -> [Vec3; 8] {
        let near = self.near();
        let far = distance.min(self.far());
        let aspect = self.cached_aspect;

        let half_extents = |depth: f32| match self.projection {
            Projection::Perspective { fov_y, .. } => {
                let half_h = (fov_y * 0.5).tan() * depth;
                (half_h * aspect, half_h)
            }
            Projection::Orthographic { height, .. } => (height * 0.5 * aspect, height * 0.5),
        };

        let mut corners = [Vec3::ZERO; 8];
        for (slice, depth) in [near, far].into_iter().enumerate() {
            let (hw, hh) = half_extents(depth);
            let local = [
                Vec3::new(-hw, -hh, -depth),
                Vec3::new(hw, -hh, -depth),
                Vec3::new(hw, hh, -depth),
                Vec3::new(-hw, hh, -depth),
            ];
            for (i, point) in local.into_iter().enumerate() {
                corners[slice * 4 + i] = self.transform.transform_point3(point);
            }
        }
        corners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_is_cached_until_changed() {
        let mut camera = Camera::default();
        let first = camera.projection_matrix(1.5);
        assert!(!camera.projection_dirty);
        assert_eq!(camera.projection_matrix(1.5), first);

        camera.set_projection(Projection::Perspective {
            fov_y: 1.0,
            near: 0.1,
            far: 10.0,
        });
        assert!(camera.projection_dirty);
        assert_ne!(camera.projection_matrix(1.5), first);
    }

    #[test]
    fn aspect_change_rebuilds_projection() {
        let mut camera = Camera::default();
        let wide = camera.projection_matrix(2.0);
        let square = camera.projection_matrix(1.0);
        assert_ne!(wide, square);

        camera.set_aspect(Some(2.0));
        assert_eq!(camera.projection_matrix(1.0), wide);
    }

    #[test]
    fn corners_project_onto_the_view_volume() {
        let mut camera = Camera::perspective(1.0, 0.5, 50.0);
        camera.look_at(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y);
        camera.update(1.25);

        for corner in camera.frustum_corners(50.0) {
            let ndc = camera.view_projection().project_point3(corner);
            assert!(ndc.x.abs() < 1.0 + 1e-3);
            assert!(ndc.y.abs() < 1.0 + 1e-3);
            assert!(ndc.z > -1e-3 && ndc.z < 1.0 + 1e-3);
        }
    }

    #[test]
    fn viewport_is_floored_to_pixels() {
        let mut camera = Camera::default();
        camera.set_rect(0.25, 0.0, 0.5, 0.5);
        assert_eq!(camera.viewport(101, 51), Rect::new(25, 0, 50, 25));
    }
}
