use crate::builder::ProgramBuilder;
use crate::options::SkinMode;
use ignis_device::{Capabilities, Semantic, ShaderDefinition};

/// Flat id color for object picking.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PickOptions {
    pub skin: Option<SkinMode>,
}

impl PickOptions {
    pub fn write_key(&self, out: &mut String) {
        if let Some(skin) = &self.skin {
            skin.write_key(out);
        }
    }

    pub fn create_shader_definition(&self, caps: &Capabilities) -> ShaderDefinition {
        let mut b = ProgramBuilder::new("pick");
        b.uniform("matrix_viewProjection", "mat4x4<f32>")
            .uniform("pick_color", "vec4<f32>")
            .input("vertex_position", "vec3<f32>", Semantic::Position);

        b.skinned_model(super::supported_skin(self.skin, caps, 64));
        b.vertex_line("out.position = u.matrix_viewProjection * model * vec4<f32>(in.vertex_position, 1.0);")
            .fragment_line("return u.pick_color;");

        b.build()
    }
}
