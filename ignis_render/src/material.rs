use glamx::{Vec3, Vec4};
use ignis_device::wgpu::CompareFunction;
use ignis_device::{
    BlendEquation, BlendFunction, CullMode, Device, ProgramId, ScopeSpace, TextureKey,
    UniformValue,
};
use ignis_shadergen::{
    BasicOptions, BlendType, LightOptions, MapOptions, OutputOptions, PhongOptions,
    ProgramLibrary, ProgramOptions, SkinMode,
};
use tracing::trace;

/// Everything outside a material that its program depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderContext {
    /// Light layout in uniform order, directional lights first.
    pub lights: Vec<LightOptions>,
    pub output: OutputOptions,
    /// Palette source used by skinned variants.
    pub skin: SkinMode,
}

impl Default for ShaderContext {
    fn default() -> Self {
        Self {
            lights: Vec::new(),
            output: OutputOptions::default(),
            skin: SkinMode::Texture,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialMap {
    pub texture: TextureKey,
    pub options: MapOptions,
}

impl MaterialMap {
    pub fn new(texture: TextureKey) -> Self {
        Self {
            texture,
            options: MapOptions::default(),
        }
    }
}

/// Unlit color.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicMaterial {
    pub color: Vec4,
    pub color_map: Option<TextureKey>,
}

impl Default for BasicMaterial {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            color_map: None,
        }
    }
}

/// Lambert diffuse with a Blinn-Phong highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct PhongMaterial {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub emissive: Vec3,
    pub opacity: f32,
    pub diffuse_map: Option<MaterialMap>,
    pub specular_map: Option<MaterialMap>,
    pub emissive_map: Option<MaterialMap>,
    pub opacity_map: Option<MaterialMap>,
}

impl Default for PhongMaterial {
    fn default() -> Self {
        Self {
            ambient: Vec3::splat(0.7),
            diffuse: Vec3::splat(0.7),
            specular: Vec3::ZERO,
            shininess: 25.0,
            emissive: Vec3::ZERO,
            opacity: 1.0,
            diffuse_map: None,
            specular_map: None,
            emissive_map: None,
            opacity_map: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shading {
    Basic(BasicMaterial),
    Phong(PhongMaterial),
}

/// Surface description of draw calls: the option set selecting a program plus the
/// parameters pushed into scope before drawing.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    shading: Shading,
    pub blend_type: BlendType,
    /// Fragments with opacity below this value are discarded.
    pub alpha_test: Option<f32>,
    pub vertex_colors: bool,
    pub cull_mode: CullMode,
    pub depth_test: bool,
    pub depth_write: bool,
    parameters: Vec<(String, UniformValue)>,

    pub(crate) id: u32,
    dirty: bool,
    /// Unskinned and skinned programs.
    variants: [Option<ProgramId>; 2],
}

impl Material {
    pub fn new(name: impl Into<String>, shading: Shading) -> Self {
        Self {
            name: name.into(),
            shading,
            blend_type: BlendType::None,
            alpha_test: None,
            vertex_colors: false,
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
            parameters: Vec::new(),
            id: 0,
            dirty: true,
            variants: [None; 2],
        }
    }

    pub fn basic(name: impl Into<String>, color: Vec4) -> Self {
        Self::new(
            name,
            Shading::Basic(BasicMaterial {
                color,
                color_map: None,
            }),
        )
    }

    pub fn phong(name: impl Into<String>, phong: PhongMaterial) -> Self {
        Self::new(name, Shading::Phong(phong))
    }

    /// Blended materials stop writing depth.
    pub fn with_blend(mut self, blend_type: BlendType) -> Self {
        self.blend_type = blend_type;
        self.depth_write = !blend_type.is_blended();
        self
    }

    pub fn shading(&self) -> &Shading {
        &self.shading
    }

    /// Mutable access marks the program for regeneration.
    pub fn shading_mut(&mut self) -> &mut Shading {
        self.dirty = true;
        &mut self.shading
    }

    /// Sort id packed into draw call keys, assigned when added to a scene.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Sets an extra named parameter pushed into scope with the material.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        match self.parameters.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.parameters.push((name.to_string(), value)),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&UniformValue> {
        self.parameters
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn program_options(&self, context: &ShaderContext, skinned: bool) -> ProgramOptions {
        let skin = skinned.then_some(context.skin);
        match &self.shading {
            Shading::Basic(basic) => BasicOptions {
                diffuse_map: basic.color_map.is_some(),
                vertex_colors: self.vertex_colors,
                alpha_test: self.alpha_test.is_some(),
                skin,
                output: context.output,
            }
            .into(),
            Shading::Phong(phong) => PhongOptions {
                lights: context.lights.clone(),
                diffuse_map: phong.diffuse_map.map(|m| m.options),
                specular_map: phong.specular_map.map(|m| m.options),
                emissive_map: phong.emissive_map.map(|m| m.options),
                opacity_map: phong.opacity_map.map(|m| m.options),
                vertex_colors: self.vertex_colors,
                alpha_test: self.alpha_test.is_some(),
                skin,
                output: context.output,
                blend_type: self.blend_type,
            }
            .into(),
        }
    }

    /// Returns the program for this material, regenerating it first if the material is dirty.
    pub fn program(
        &mut self,
        device: &mut Device,
        library: &mut ProgramLibrary,
        context: &ShaderContext,
        skinned: bool,
    ) -> ProgramId {
        if self.dirty {
            trace!("Updating shaders of material {:?}", self.name);
            self.variants = [None; 2];
            self.dirty = false;
        }

        let slot = &mut self.variants[skinned as usize];
        if let Some(program) = *slot {
            return program;
        }

        let options = self.program_options(context, skinned);
        let program = library.get_program(device, &options);
        self.variants[skinned as usize] = Some(program);
        program
    }

    /// Texture masking shadow and depth passes, if alpha testing uses one.
    pub fn opacity_texture(&self) -> Option<TextureKey> {
        self.alpha_test?;
        match &self.shading {
            Shading::Basic(basic) => basic.color_map,
            Shading::Phong(phong) => phong
                .opacity_map
                .or(phong.diffuse_map)
                .map(|map| map.texture),
        }
    }

    /// Applies blending, depth and culling state.
    pub fn apply_state(&self, device: &mut Device) {
        match self.blend_type {
            BlendType::None => device.set_blending(false),
            BlendType::Normal => {
                device.set_blending(true);
                device.set_blend_function(BlendFunction::ALPHA);
                device.set_blend_equation(BlendEquation::ADD);
            }
            BlendType::Additive => {
                device.set_blending(true);
                device.set_blend_function(BlendFunction::ADDITIVE);
                device.set_blend_equation(BlendEquation::ADD);
            }
            BlendType::Subtractive => {
                device.set_blending(true);
                device.set_blend_function(BlendFunction::ADDITIVE);
                device.set_blend_equation(BlendEquation::REVERSE_SUBTRACT);
            }
        }
        device.set_depth_test(self.depth_test);
        device.set_depth_func(CompareFunction::LessEqual);
        device.set_depth_write(self.depth_write);
        device.set_cull_mode(self.cull_mode);
    }

    /// Pushes every parameter into scope. Unchanged values still bump their revision.
    pub fn set_parameters(&self, scope: &mut ScopeSpace) {
        match &self.shading {
            Shading::Basic(basic) => {
                scope.set("material_color", basic.color);
                if let Some(texture) = basic.color_map {
                    scope.set("texture_diffuseMap", texture);
                }
            }
            Shading::Phong(phong) => {
                scope.set("material_ambient", phong.ambient);
                scope.set("material_diffuse", phong.diffuse);
                scope.set("material_specular", phong.specular);
                scope.set("material_shininess", phong.shininess);
                scope.set("material_emissive", phong.emissive);
                scope.set("material_opacity", phong.opacity);
                let maps = [
                    ("texture_diffuseMap", &phong.diffuse_map),
                    ("texture_specularMap", &phong.specular_map),
                    ("texture_emissiveMap", &phong.emissive_map),
                    ("texture_opacityMap", &phong.opacity_map),
                ];
                for (name, map) in maps {
                    if let Some(map) = map {
                        scope.set(name, map.texture);
                    }
                }
            }
        }

        if let Some(alpha_ref) = self.alpha_test {
            scope.set("alpha_ref", alpha_ref);
        }
        for (name, value) in &self.parameters {
            scope.set(name, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_shadergen::LightKind;

    fn lit_context() -> ShaderContext {
        ShaderContext {
            lights: vec![LightOptions {
                kind: LightKind::Point,
                shadow: None,
            }],
            ..ShaderContext::default()
        }
    }

    #[test]
    fn phong_options_follow_the_light_layout() {
        let material = Material::phong("lit", PhongMaterial::default());
        let ProgramOptions::Phong(options) = material.program_options(&lit_context(), true) else {
            panic!("phong material produced other options");
        };

        assert_eq!(options.lights.len(), 1);
        assert_eq!(options.skin, Some(SkinMode::Texture));
    }

    #[test]
    fn blend_type_keeps_the_program_key() {
        let opaque = Material::phong("a", PhongMaterial::default());
        let blended = Material::phong("b", PhongMaterial::default()).with_blend(BlendType::Normal);

        let context = lit_context();
        assert_eq!(
            opaque.program_options(&context, false).generate_key(),
            blended.program_options(&context, false).generate_key()
        );
        assert!(!blended.depth_write);
    }

    #[test]
    fn parameters_are_replaced_by_name() {
        let mut material = Material::basic("flat", Vec4::ONE);
        material.set_parameter("tint", 1.0f32);
        material.set_parameter("tint", 2.0f32);

        assert_eq!(material.parameter("tint"), Some(&UniformValue::Float(2.0)));
        assert_eq!(material.parameters.len(), 1);
    }

    #[test]
    fn opacity_texture_requires_alpha_test() {
        let texture = TextureKey::default();
        let mut material = Material::new(
            "masked",
            Shading::Basic(BasicMaterial {
                color: Vec4::ONE,
                color_map: Some(texture),
            }),
        );
        assert_eq!(material.opacity_texture(), None);

        material.alpha_test = Some(0.5);
        assert_eq!(material.opacity_texture(), Some(texture));
    }
}
