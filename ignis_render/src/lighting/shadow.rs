use glamx::{Mat4, Vec3, Vec4};
use ignis_device::wgpu::{CompareFunction, FilterMode, TextureFormat};
use ignis_device::{
    DepthAttachment, Device, DeviceError, RenderTarget, RenderTargetDescriptor, Texture,
    TextureDescriptor, TextureKey,
};
use ignis_shadergen::{LightKind, ShadowMode};
use ignis_utils::BoundingBox;
use std::f32::consts::FRAC_PI_2;
use tracing::debug;

/// Cube face directions and up vectors, in cube-map face order.
pub const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Pulls the fitted camera back by this fraction of the fitted depth.
const DIRECTIONAL_BACKOFF: f32 = 0.25;
const MIN_EXTENT: f32 = 1e-4;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShadowCamera {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl ShadowCamera {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Maps world positions to shadow map texture space, depth in `[0, 1]`.
    pub fn shadow_matrix(&self) -> Mat4 {
        scale_bias() * self.view_projection()
    }
}

/// Maps clip space `[-1, 1]` to texture space `[0, 1]` with v pointing down.
pub fn scale_bias() -> Mat4 {
    Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -0.5, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.5, 0.5, 0.0, 1.0),
    )
}

/// Fits an orthographic camera looking along `direction` tightly around the given
/// world-space frustum corners.
///
/// Returns `None` for a zero direction or a fit without extent.
pub fn fit_directional(corners: &[Vec3; 8], direction: Vec3) -> Option<ShadowCamera> {
    let direction = direction.try_normalize()?;
    let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
    let up = if direction.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };

    let look = Mat4::look_at_rh(center, center + direction, up);
    let local = corners.map(|c| look.transform_point3(c));
    let bounds = BoundingBox::from_points(&local);
    let size = bounds.size();
    if size.x < MIN_EXTENT || size.y < MIN_EXTENT || size.z < MIN_EXTENT {
        return None;
    }

    let world = look.inverse();
    let right = world.x_axis.truncate();
    let camera_up = world.y_axis.truncate();
    let back = world.z_axis.truncate();
    let offset = bounds.center();
    let position = center
        + right * offset.x
        + camera_up * offset.y
        + back * (bounds.max.z + DIRECTIONAL_BACKOFF * size.z);

    let view = Mat4::look_at_rh(position, position + direction, camera_up);
    let (half_w, half_h) = (size.x * 0.5, size.y * 0.5);
    let far = size.z * (1.0 + 2.0 * DIRECTIONAL_BACKOFF);
    let projection = Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, 0.0, far);

    Some(ShadowCamera {
        position,
        view,
        projection,
    })
}

fn near_far(range: f32, min_near: f32) -> (f32, f32) {
    let near = (range / 1000.0).max(min_near);
    (near, range.max(near + 0.01))
}

/// Perspective camera at a spot light covering its outer cone.
pub fn spot_camera(
    position: Vec3,
    direction: Vec3,
    up: Vec3,
    outer_angle: f32,
    range: f32,
    min_near: f32,
) -> ShadowCamera {
    let fov_y = (2.0 * outer_angle).clamp(0.0175, 3.12);
    let (near, far) = near_far(range, min_near);
    ShadowCamera {
        position,
        view: Mat4::look_at_rh(position, position + direction, up),
        projection: Mat4::perspective_rh(fov_y, 1.0, near, far),
    }
}

/// One of the six 90 degree cameras of a point light.
///
/// Clip-space Y is flipped so the rendered face follows cube-map addressing, which
/// also flips triangle winding.
pub fn point_face_camera(position: Vec3, face: usize, range: f32, min_near: f32) -> ShadowCamera {
    let (direction, up) = CUBE_FACES[face.min(5)];
    let (near, far) = near_far(range, min_near);
    let flip_y = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
    ShadowCamera {
        position,
        view: Mat4::look_at_rh(position, position + direction, up),
        projection: flip_y * Mat4::perspective_rh(FRAC_PI_2, 1.0, near, far),
    }
}

/// GPU resources a light renders its shadow into.
#[derive(Debug)]
pub struct ShadowMap {
    resolution: u32,
    mode: ShadowMode,
    texture: Texture,
    /// One target per cube face for point lights, otherwise a single one.
    targets: Vec<RenderTarget>,
}

impl ShadowMap {
    /// Depth textures are used where supported, except for point lights which always
    /// pack distance into an RGBA8 cube map.
    pub fn create(
        device: &mut Device,
        label: &str,
        kind: LightKind,
        resolution: u32,
    ) -> Result<Self, DeviceError> {
        let mode = match kind {
            LightKind::Point => ShadowMode::Packed,
            _ if device.capabilities().depth_textures => ShadowMode::Depth,
            _ => ShadowMode::Packed,
        };

        let mut desc = TextureDescriptor::new(
            format!("{label} Shadow Map"),
            resolution,
            resolution,
            TextureFormat::Rgba8Unorm,
        );
        desc.renderable = true;
        desc.filter = FilterMode::Nearest;
        desc.cubemap = kind == LightKind::Point;
        if mode == ShadowMode::Depth {
            desc.format = TextureFormat::Depth32Float;
            desc.filter = FilterMode::Linear;
            desc.compare = Some(CompareFunction::LessEqual);
        }
        let texture = device.create_texture(desc)?;

        let mut targets = Vec::with_capacity(texture.descriptor().faces() as usize);
        for face in 0..texture.descriptor().faces() {
            let (color, depth) = match mode {
                ShadowMode::Depth => (None, DepthAttachment::Texture(texture.key())),
                ShadowMode::Packed => (Some(texture.key()), DepthAttachment::Buffer),
            };
            let desc = RenderTargetDescriptor {
                label: format!("{label} Shadow Target {face}"),
                color,
                face,
                depth,
                width: resolution,
                height: resolution,
            };
            match device.create_render_target(&desc) {
                Ok(target) => targets.push(target),
                Err(e) => {
                    for target in targets {
                        device.destroy_render_target(target);
                    }
                    device.destroy_texture(texture);
                    return Err(e);
                }
            }
        }

        debug!("Created {mode:?} shadow map {label:?} at {resolution}px");
        Ok(Self {
            resolution,
            mode,
            texture,
            targets,
        })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn mode(&self) -> ShadowMode {
        self.mode
    }

    pub fn texture(&self) -> TextureKey {
        self.texture.key()
    }

    pub fn targets(&self) -> &[RenderTarget] {
        &self.targets
    }

    pub fn destroy(self, device: &mut Device) {
        for target in self.targets {
            device.destroy_render_target(target);
        }
        device.destroy_texture(self.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_device::Capabilities;
    use ignis_device::backend::HeadlessContext;

    #[test]
    fn scale_bias_maps_clip_corners_to_texture_corners() {
        let m = scale_bias();
        assert_eq!(
            m.transform_point3(Vec3::new(-1.0, 1.0, 0.25)),
            Vec3::new(0.0, 0.0, 0.25)
        );
        assert_eq!(
            m.transform_point3(Vec3::new(1.0, -1.0, 1.0)),
            Vec3::new(1.0, 1.0, 1.0)
        );
    }

    #[test]
    fn straight_down_light_uses_a_stable_up_vector() {
        let corners = BoundingBox::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0)).corners();
        let camera = fit_directional(&corners, Vec3::NEG_Y).unwrap();
        assert!(camera.view.is_finite());
        assert!(camera.projection.is_finite());
    }

    #[test]
    fn flat_corners_do_not_fit() {
        let corners = [Vec3::ONE; 8];
        assert!(fit_directional(&corners, Vec3::NEG_Z).is_none());
        assert!(fit_directional(&corners, Vec3::ZERO).is_none());
    }

    #[test]
    fn spot_near_plane_has_a_floor() {
        let camera = spot_camera(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, 0.5, 1.0, 0.01);
        // a point just beyond the floored near plane is inside the depth range
        let depth = camera
            .view_projection()
            .project_point3(Vec3::new(0.0, 0.0, -0.011))
            .z;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn point_faces_look_along_their_axis() {
        for (face, (direction, _)) in CUBE_FACES.iter().enumerate() {
            let camera = point_face_camera(Vec3::ONE, face, 10.0, 0.01);
            let clip = camera.view_projection().project_point3(Vec3::ONE + *direction * 5.0);
            assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
            assert!((0.0..1.0).contains(&clip.z));
        }
    }

    #[test]
    fn point_maps_get_six_packed_faces() {
        let (context, _log) = HeadlessContext::new();
        let mut device = Device::new(Box::new(context));
        let map = ShadowMap::create(&mut device, "Lamp", LightKind::Point, 64).unwrap();

        assert_eq!(map.mode(), ShadowMode::Packed);
        assert_eq!(map.targets().len(), 6);
        assert!(map.targets().iter().all(|t| t.color() == Some(map.texture())));
    }

    #[test]
    fn spot_maps_follow_depth_texture_support() {
        let caps = Capabilities {
            depth_textures: false,
            ..Capabilities::default()
        };
        let (context, _log) = HeadlessContext::with_capabilities(caps);
        let mut device = Device::new(Box::new(context));
        let map = ShadowMap::create(&mut device, "Torch", LightKind::Spot, 64).unwrap();
        assert_eq!(map.mode(), ShadowMode::Packed);

        let (context, _log) = HeadlessContext::new();
        let mut device = Device::new(Box::new(context));
        let map = ShadowMap::create(&mut device, "Torch", LightKind::Spot, 64).unwrap();
        assert_eq!(map.mode(), ShadowMode::Depth);
        assert_eq!(map.targets()[0].depth_texture(), Some(map.texture()));
    }
}
