use crate::builder::ProgramBuilder;
use crate::options::{OutputOptions, SkinMode};
use ignis_device::{Capabilities, Semantic, ShaderDefinition};

/// Unlit color, optionally multiplied by a texture and vertex colors.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct BasicOptions {
    pub diffuse_map: bool,
    pub vertex_colors: bool,
    pub alpha_test: bool,
    pub skin: Option<SkinMode>,
    pub output: OutputOptions,
}

impl BasicOptions {
    pub fn write_key(&self, out: &mut String) {
        if self.diffuse_map {
            out.push_str("|map");
        }
        if self.vertex_colors {
            out.push_str("|vc");
        }
        if self.alpha_test {
            out.push_str("|at");
        }
        if let Some(skin) = &self.skin {
            skin.write_key(out);
        }
        self.output.write_key(out);
    }

    pub fn create_shader_definition(&self, caps: &Capabilities) -> ShaderDefinition {
        let mut b = ProgramBuilder::new("basic");
        b.uniform("matrix_viewProjection", "mat4x4<f32>")
            .uniform("material_color", "vec4<f32>")
            .input("vertex_position", "vec3<f32>", Semantic::Position)
            .varying("world_position", "vec3<f32>");

        b.skinned_model(super::supported_skin(self.skin, caps, 64));
        b.vertex_line("let world = model * vec4<f32>(in.vertex_position, 1.0);")
            .vertex_line("out.position = u.matrix_viewProjection * world;")
            .vertex_line("out.world_position = world.xyz;");

        if self.diffuse_map {
            b.input("vertex_texCoord0", "vec2<f32>", Semantic::TexCoord0)
                .varying("uv0", "vec2<f32>")
                .vertex_line("out.uv0 = in.vertex_texCoord0;")
                .sample_map("diffuseMap", &Default::default());
        }
        if self.vertex_colors {
            b.input("vertex_color", "vec4<f32>", Semantic::Color)
                .varying("color", "vec4<f32>")
                .vertex_line("out.color = in.vertex_color;");
        }

        b.fragment_line("var base = u.material_color;");
        if self.diffuse_map {
            b.fragment_line("base *= map_diffuseMap;");
        }
        if self.vertex_colors {
            b.fragment_line("base *= in.color;");
        }
        if self.alpha_test {
            b.uniform("alpha_ref", "f32")
                .fragment_line("if (base.a < u.alpha_ref) {")
                .fragment_line("    discard;")
                .fragment_line("}");
        }
        b.fragment_line("var color = base.rgb;")
            .output(&self.output)
            .fragment_line("return vec4<f32>(color, base.a);");

        b.build()
    }
}
