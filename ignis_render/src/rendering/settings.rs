use bon::Builder;
use ignis_utils::RenderArgs;

/// Switches the forward renderer reads every frame.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct RendererSettings {
    #[builder(default = true)]
    pub shadows: bool,
    #[builder(default = true)]
    pub frustum_culling: bool,
    /// Honors cameras requesting a depth pre-pass.
    #[builder(default = true)]
    pub depth_prepass: bool,
    /// Reach of directional shadows for lights without their own distance.
    #[builder(default = 40.0)]
    pub shadow_distance: f32,
    /// Palette size of skinned programs when bones cannot live in a float texture.
    #[builder(default = 64)]
    pub max_uniform_bones: u32,
    /// Lower bound of spot and point shadow near planes.
    #[builder(default = 0.01)]
    pub min_shadow_near: f32,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RendererSettings {
    pub fn from_args(args: &RenderArgs) -> Self {
        let defaults = Self::default();
        Self::builder()
            .shadows(!args.no_shadows)
            .frustum_culling(!args.no_frustum_culling)
            .depth_prepass(!args.no_depth_prepass)
            .shadow_distance(args.shadow_distance.unwrap_or(defaults.shadow_distance))
            .max_uniform_bones(args.max_uniform_bones.unwrap_or(defaults.max_uniform_bones))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_override_defaults() {
        let args = RenderArgs {
            no_shadows: true,
            shadow_distance: Some(12.0),
            ..RenderArgs::default()
        };
        let settings = RendererSettings::from_args(&args);

        assert!(!settings.shadows);
        assert!(settings.frustum_culling);
        assert_eq!(settings.shadow_distance, 12.0);
        assert_eq!(settings.max_uniform_bones, 64);
    }
}
