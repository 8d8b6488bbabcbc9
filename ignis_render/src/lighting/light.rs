use crate::lighting::shadow::ShadowMap;
use glamx::{Mat4, Vec3};
use ignis_device::{Device, DeviceError};
use ignis_shadergen::{LightKind, LightOptions};
use tracing::warn;

/// A light source. Direction is the transform's `-Z` axis, position its translation.
#[derive(Debug)]
pub struct Light {
    pub name: String,
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub enabled: bool,
    pub cast_shadows: bool,
    pub shadow_resolution: u32,
    /// Subtracted from the receiver depth before comparing against the shadow map.
    pub shadow_bias: f32,
    /// How far from the camera directional shadows reach. `None` uses the renderer default.
    pub shadow_distance: Option<f32>,
    /// Radians from the light axis to the full-intensity edge.
    pub inner_cone_angle: f32,
    /// Radians from the light axis to where light falls off to zero.
    pub outer_cone_angle: f32,
    pub range: f32,
    pub transform: Mat4,

    pub(crate) shadow: Option<ShadowMap>,
    /// Resolution at which creating the shadow map failed.
    pub(crate) shadow_failed: Option<u32>,
    pub(crate) shadow_matrix: Mat4,
    pub(crate) shadow_rendered: bool,
}

impl Light {
    pub fn new(name: impl Into<String>, kind: LightKind) -> Self {
        Self {
            name: name.into(),
            kind,
            color: Vec3::ONE,
            intensity: 1.0,
            enabled: true,
            cast_shadows: false,
            shadow_resolution: 1024,
            shadow_bias: 0.002,
            shadow_distance: None,
            inner_cone_angle: 40f32.to_radians(),
            outer_cone_angle: 45f32.to_radians(),
            range: 10.0,
            transform: Mat4::IDENTITY,
            shadow: None,
            shadow_failed: None,
            shadow_matrix: Mat4::IDENTITY,
            shadow_rendered: false,
        }
    }

    pub fn directional(name: impl Into<String>, direction: Vec3) -> Self {
        let mut light = Self::new(name, LightKind::Directional);
        light.look_along(Vec3::ZERO, direction);
        light
    }

    pub fn point(name: impl Into<String>, position: Vec3, range: f32) -> Self {
        let mut light = Self::new(name, LightKind::Point);
        light.transform = Mat4::from_translation(position);
        light.range = range;
        light
    }

    pub fn spot(name: impl Into<String>, position: Vec3, direction: Vec3, range: f32) -> Self {
        let mut light = Self::new(name, LightKind::Spot);
        light.look_along(position, direction);
        light.range = range;
        light
    }

    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    pub fn with_shadows(mut self, resolution: u32) -> Self {
        self.cast_shadows = true;
        self.shadow_resolution = resolution;
        self
    }

    pub fn with_cone(mut self, inner: f32, outer: f32) -> Self {
        self.inner_cone_angle = inner.min(outer);
        self.outer_cone_angle = outer;
        self
    }

    /// Places the light at `position` pointing along `direction`.
    pub fn look_along(&mut self, position: Vec3, direction: Vec3) {
        let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        let up = if direction.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        self.transform = Mat4::look_at_rh(position, position + direction, up).inverse();
    }

    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    pub fn direction(&self) -> Vec3 {
        (-self.transform.z_axis.truncate()).try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    pub fn up(&self) -> Vec3 {
        self.transform.y_axis.truncate().try_normalize().unwrap_or(Vec3::Y)
    }

    /// Color premultiplied by intensity, as the shaders consume it.
    pub fn final_color(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Whether this frame renders a shadow map for the light.
    pub fn wants_shadow(&self) -> bool {
        self.enabled
            && self.cast_shadows
            && self.shadow_resolution > 0
            && self.shadow_failed != Some(self.shadow_resolution)
    }

    /// Shader layout of the light in the current frame.
    pub fn options(&self) -> LightOptions {
        LightOptions {
            kind: self.kind,
            shadow: self
                .shadow
                .as_ref()
                .filter(|_| self.shadow_rendered)
                .map(ShadowMap::mode),
        }
    }

    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow.as_ref()
    }

    /// Texture-space shadow matrix of the last rendered directional or spot shadow.
    pub fn shadow_matrix(&self) -> &Mat4 {
        &self.shadow_matrix
    }

    /// Creates the shadow map on first use and whenever the resolution changed.
    ///
    /// A failed creation disables shadows for this light until its resolution changes.
    pub(crate) fn ensure_shadow_map(
        &mut self,
        device: &mut Device,
        graveyard: &mut Vec<ShadowMap>,
    ) -> Option<&ShadowMap> {
        if self
            .shadow
            .as_ref()
            .is_some_and(|map| map.resolution() != self.shadow_resolution)
        {
            graveyard.extend(self.shadow.take());
        }

        if self.shadow.is_none() {
            match ShadowMap::create(device, &self.name, self.kind, self.shadow_resolution) {
                Ok(map) => {
                    self.shadow_failed = None;
                    self.shadow = Some(map);
                }
                Err(e) => {
                    self.report_shadow_failure(e);
                    return None;
                }
            }
        }
        self.shadow.as_ref()
    }

    fn report_shadow_failure(&mut self, error: DeviceError) {
        warn!("Light {:?} renders without shadows: {error}", self.name);
        self.shadow_failed = Some(self.shadow_resolution);
    }

    /// Hands the shadow map over for release at the start of the next frame.
    pub(crate) fn release_shadow(&mut self, graveyard: &mut Vec<ShadowMap>) {
        graveyard.extend(self.shadow.take());
        self.shadow_rendered = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_device::backend::HeadlessContext;

    #[test]
    fn spot_points_along_its_direction() {
        let light = Light::spot("spot", Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, -1.0, 0.0), 20.0);
        let expected = Vec3::new(1.0, -1.0, 0.0).normalize();
        assert!(light.direction().abs_diff_eq(expected, 1e-5));
        assert!(light.position().abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-5));
    }

    #[test]
    fn failed_shadow_map_is_remembered_per_resolution() {
        let (context, _log) = HeadlessContext::new();
        let mut device = Device::new(Box::new(context.failing_render_targets()));
        let mut graveyard = Vec::new();
        let mut light = Light::directional("sun", Vec3::NEG_Y).with_shadows(512);

        assert!(light.ensure_shadow_map(&mut device, &mut graveyard).is_none());
        assert!(!light.wants_shadow());

        light.shadow_resolution = 256;
        assert!(light.wants_shadow());
    }

    #[test]
    fn resolution_change_recreates_the_map() {
        let (context, _log) = HeadlessContext::new();
        let mut device = Device::new(Box::new(context));
        let mut graveyard = Vec::new();
        let mut light = Light::point("lamp", Vec3::ZERO, 5.0).with_shadows(64);

        assert!(light.ensure_shadow_map(&mut device, &mut graveyard).is_some());
        light.shadow_resolution = 128;
        let resolution = light
            .ensure_shadow_map(&mut device, &mut graveyard)
            .map(ShadowMap::resolution);

        assert_eq!(resolution, Some(128));
        assert_eq!(graveyard.len(), 1);
    }
}
