use crate::chunks::{self, Token, substitute};
use crate::options::{FogMode, Gamma, MapOptions, OutputOptions, SkinMode, Tonemap};
use ignis_device::{Semantic, ShaderDefinition};
use std::fmt::Write;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TextureType {
    Float2d,
    FloatCube,
    Depth2d,
}

impl TextureType {
    fn declaration(self) -> (&'static str, &'static str) {
        match self {
            TextureType::Float2d => ("texture_2d<f32>", "sampler"),
            TextureType::FloatCube => ("texture_cube<f32>", "sampler"),
            TextureType::Depth2d => ("texture_depth_2d", "sampler_comparison"),
        }
    }
}

/// Assembles one WGSL module following the device's binding convention.
#[derive(Debug, Default)]
pub(crate) struct ProgramBuilder {
    name: String,
    uniforms: Vec<(String, String)>,
    textures: Vec<(String, TextureType)>,
    inputs: Vec<(&'static str, &'static str, Semantic)>,
    varyings: Vec<(&'static str, &'static str)>,
    functions: Vec<&'static str>,
    pub vertex: String,
    pub fragment: String,
}

impl ProgramBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn uniform(&mut self, name: impl Into<String>, ty: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.uniforms.iter().any(|(n, _)| *n == name) {
            self.uniforms.push((name, ty.into()));
        }
        self
    }

    /// Declares `texture_<name>` with its sampler `sampler_<name>`.
    pub fn texture(&mut self, name: impl Into<String>, ty: TextureType) -> &mut Self {
        self.textures.push((name.into(), ty));
        self
    }

    pub fn input(&mut self, name: &'static str, ty: &'static str, semantic: Semantic) -> &mut Self {
        self.inputs.push((name, ty, semantic));
        self
    }

    pub fn varying(&mut self, name: &'static str, ty: &'static str) -> &mut Self {
        self.varyings.push((name, ty));
        self
    }

    /// Adds a module-scope function chunk once.
    pub fn function(&mut self, chunk: &'static str) -> &mut Self {
        if !self.functions.contains(&chunk) {
            self.functions.push(chunk);
        }
        self
    }

    pub fn vertex_line(&mut self, line: &str) -> &mut Self {
        let _ = writeln!(self.vertex, "    {line}");
        self
    }

    pub fn fragment_line(&mut self, line: &str) -> &mut Self {
        let _ = writeln!(self.fragment, "    {line}");
        self
    }

    pub fn fragment_chunk(&mut self, chunk: &str, tokens: &[(Token, &str)]) -> &mut Self {
        self.fragment.push_str(&substitute(chunk, tokens));
        self
    }

    /// Declares a sampled map and emits its `map_<name>` fetch at the current position.
    pub fn sample_map(&mut self, name: &str, map: &MapOptions) -> &mut Self {
        self.texture(name, TextureType::Float2d);
        self.fragment_chunk(
            chunks::SAMPLE_MAP,
            &[(Token::Name, name), (Token::Uv, map.uv.index())],
        )
    }

    /// Emits `color_<name>` decoded from an already sampled map.
    pub fn color_map(&mut self, name: &str, map: &MapOptions) -> &mut Self {
        self.function(chunks::DECODE);
        self.fragment_chunk(
            chunks::COLOR_MAP,
            &[(Token::Name, name), (Token::Decode, map.encoding.decode_fn())],
        )
    }

    /// Emits `value_<name>` from one channel of an already sampled map.
    pub fn scalar_map(&mut self, name: &str, map: &MapOptions) -> &mut Self {
        self.fragment_chunk(
            chunks::SCALAR_MAP,
            &[(Token::Name, name), (Token::Ch, map.channel.swizzle())],
        )
    }

    /// Declares skinning inputs and emits `let model = ...;` into the vertex body.
    pub fn skinned_model(&mut self, skin: Option<SkinMode>) -> &mut Self {
        match skin {
            None => {
                self.uniform("matrix_model", "mat4x4<f32>");
                self.vertex_line("let model = u.matrix_model;")
            }
            Some(mode) => {
                match mode {
                    SkinMode::Texture => {
                        self.texture("poseMap", TextureType::Float2d);
                        self.function(chunks::SKIN_TEXTURE);
                    }
                    SkinMode::Uniform { bones } => {
                        self.uniform("matrix_pose", format!("array<mat4x4<f32>, {}>", bones.max(1)));
                        self.function(chunks::SKIN_UNIFORM);
                    }
                }
                self.input("vertex_boneWeights", "vec4<f32>", Semantic::BlendWeight);
                self.input("vertex_boneIndices", "vec4<u32>", Semantic::BlendIndices);
                self.vertex_line(
                    "let model = skin_matrix(in.vertex_boneIndices, in.vertex_boneWeights);",
                )
            }
        }
    }

    /// Applies fog, tonemapping and gamma to `color` in the fragment body.
    ///
    /// Fog reads the `world_position` varying.
    pub fn output(&mut self, output: &OutputOptions) -> &mut Self {
        let depth = "distance(u.view_position, in.world_position)";
        match output.fog {
            FogMode::None => {}
            FogMode::Linear => {
                self.fog_uniforms();
                self.uniform("fog_start", "f32").uniform("fog_end", "f32");
                self.fragment_line(&format!(
                    "color = fog_linear(color, {depth}, u.fog_color, u.fog_start, u.fog_end);"
                ));
            }
            FogMode::Exp | FogMode::Exp2 => {
                self.fog_uniforms();
                self.uniform("fog_density", "f32");
                let function = if output.fog == FogMode::Exp {
                    "fog_exp"
                } else {
                    "fog_exp2"
                };
                self.fragment_line(&format!(
                    "color = {function}(color, {depth}, u.fog_color, u.fog_density);"
                ));
            }
        }

        self.function(chunks::TONEMAP);
        self.uniform("exposure", "f32");
        match output.tonemap {
            Tonemap::Linear => self.fragment_line("color = tonemap_linear(color, u.exposure);"),
            Tonemap::Filmic => self.fragment_line("color = tonemap_filmic(color, u.exposure);"),
        };
        if output.gamma == Gamma::Srgb {
            self.fragment_line("color = gamma_correct(color);");
        }
        self
    }

    fn fog_uniforms(&mut self) {
        self.function(chunks::FOG);
        self.uniform("view_position", "vec3<f32>");
        self.uniform("fog_color", "vec3<f32>");
    }

    pub fn build(self) -> ShaderDefinition {
        let mut source = String::new();

        source.push_str("struct Uniforms {\n");
        for (name, ty) in &self.uniforms {
            let _ = writeln!(source, "    {name}: {ty},");
        }
        source.push_str("}\n\n@group(0) @binding(0) var<uniform> u: Uniforms;\n");

        for (i, (name, ty)) in self.textures.iter().enumerate() {
            let (texture, sampler) = ty.declaration();
            let binding = i * 2;
            let _ = writeln!(
                source,
                "@group(1) @binding({binding}) var texture_{name}: {texture};"
            );
            let _ = writeln!(
                source,
                "@group(1) @binding({}) var sampler_{name}: {sampler};",
                binding + 1
            );
        }

        source.push_str("\nstruct VertexInput {\n");
        for (location, (name, ty, _)) in self.inputs.iter().enumerate() {
            let _ = writeln!(source, "    @location({location}) {name}: {ty},");
        }
        source.push_str("}\n\nstruct VertexOutput {\n    @builtin(position) position: vec4<f32>,\n");
        for (location, (name, ty)) in self.varyings.iter().enumerate() {
            let _ = writeln!(source, "    @location({location}) {name}: {ty},");
        }
        source.push_str("}\n\n");

        for function in &self.functions {
            source.push_str(function);
            source.push('\n');
        }

        let _ = write!(
            source,
            "@vertex\nfn vs_main(in: VertexInput) -> VertexOutput {{\n    var out: VertexOutput;\n{}    return out;\n}}\n\n",
            self.vertex
        );
        let _ = write!(
            source,
            "@fragment\nfn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {{\n{}}}\n",
            self.fragment
        );

        self.inputs.iter().fold(
            ShaderDefinition::new(self.name.clone(), source),
            |definition, (name, _, semantic)| definition.with_attribute(*name, *semantic),
        )
    }
}
