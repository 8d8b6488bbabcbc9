use crate::builder::{ProgramBuilder, TextureType};
use crate::chunks;
use crate::options::{Encoding, FogMode, Gamma, OutputOptions, Tonemap};
use ignis_device::{Capabilities, Semantic, ShaderDefinition};
use std::fmt::Write;

/// A unit cube around the camera sampling a cube map, pinned to the far plane.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SkyboxOptions {
    pub encoding: Encoding,
    pub tonemap: Tonemap,
    pub gamma: Gamma,
}

impl SkyboxOptions {
    pub fn write_key(&self, out: &mut String) {
        let _ = write!(
            out,
            "|{:?}|tm:{:?}|gamma:{:?}",
            self.encoding, self.tonemap, self.gamma
        );
    }

    pub fn create_shader_definition(&self, _caps: &Capabilities) -> ShaderDefinition {
        let mut b = ProgramBuilder::new("skybox");
        b.uniform("matrix_viewProjection", "mat4x4<f32>")
            .uniform("view_position", "vec3<f32>")
            .texture("cubeMap", TextureType::FloatCube)
            .function(chunks::DECODE)
            .input("vertex_position", "vec3<f32>", Semantic::Position)
            .varying("direction", "vec3<f32>");

        b.vertex_line("out.direction = in.vertex_position;")
            .vertex_line("let clip = u.matrix_viewProjection * vec4<f32>(u.view_position + in.vertex_position, 1.0);")
            .vertex_line("out.position = clip.xyww;");

        b.fragment_line("let sampled = textureSample(texture_cubeMap, sampler_cubeMap, normalize(in.direction));")
            .fragment_line(&format!("var color = {}(sampled);", self.encoding.decode_fn()))
            .output(&OutputOptions {
                fog: FogMode::None,
                tonemap: self.tonemap,
                gamma: self.gamma,
            })
            .fragment_line("return vec4<f32>(color, 1.0);");

        b.build()
    }
}
