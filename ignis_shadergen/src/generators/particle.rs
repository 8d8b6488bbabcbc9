use crate::builder::ProgramBuilder;
use crate::options::OutputOptions;
use ignis_device::{Capabilities, Semantic, ShaderDefinition};

/// Camera-facing quads expanded in the vertex stage.
///
/// Each vertex carries the particle center as its position, the quad corner as
/// `texCoord0` and `(size, rotation, alpha, _)` in `attr0`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ParticleOptions {
    pub color_map: bool,
    pub alpha_test: bool,
    pub output: OutputOptions,
}

impl ParticleOptions {
    pub fn write_key(&self, out: &mut String) {
        if self.color_map {
            out.push_str("|map");
        }
        if self.alpha_test {
            out.push_str("|at");
        }
        self.output.write_key(out);
    }

    pub fn create_shader_definition(&self, _caps: &Capabilities) -> ShaderDefinition {
        let mut b = ProgramBuilder::new("particle");
        b.uniform("matrix_viewProjection", "mat4x4<f32>")
            .uniform("matrix_view", "mat4x4<f32>")
            .input("vertex_position", "vec3<f32>", Semantic::Position)
            .input("vertex_texCoord0", "vec2<f32>", Semantic::TexCoord0)
            .input("vertex_color", "vec4<f32>", Semantic::Color)
            .input("vertex_attr0", "vec4<f32>", Semantic::Attr0)
            .varying("world_position", "vec3<f32>")
            .varying("uv0", "vec2<f32>")
            .varying("color", "vec4<f32>");

        b.vertex_line("let right = vec3<f32>(u.matrix_view[0].x, u.matrix_view[1].x, u.matrix_view[2].x);")
            .vertex_line("let up = vec3<f32>(u.matrix_view[0].y, u.matrix_view[1].y, u.matrix_view[2].y);")
            .vertex_line("let corner = in.vertex_texCoord0 * 2.0 - vec2<f32>(1.0);")
            .vertex_line("let s = sin(in.vertex_attr0.y);")
            .vertex_line("let c = cos(in.vertex_attr0.y);")
            .vertex_line("let offset = vec2<f32>(corner.x * c - corner.y * s, corner.x * s + corner.y * c) * in.vertex_attr0.x;")
            .vertex_line("let world = vec4<f32>(in.vertex_position + right * offset.x + up * offset.y, 1.0);")
            .vertex_line("out.position = u.matrix_viewProjection * world;")
            .vertex_line("out.world_position = world.xyz;")
            .vertex_line("out.uv0 = in.vertex_texCoord0;")
            .vertex_line("out.color = vec4<f32>(in.vertex_color.rgb, in.vertex_color.a * in.vertex_attr0.z);");

        if self.color_map {
            b.sample_map("colorMap", &Default::default());
        }
        b.fragment_line("var base = in.color;");
        if self.color_map {
            b.fragment_line("base *= map_colorMap;");
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
