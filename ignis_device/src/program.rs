//! WGSL program compilation and reflection.
//!
//! Programs follow a fixed binding convention:
//! - loose uniforms are members of one struct bound at `@group(0) @binding(0)`
//! - textures live in `@group(1)`, each followed by its sampler at `binding + 1`
//! - depth textures pair with a `sampler_comparison`
//!
//! Vertex inputs are matched to [`Semantic`]s by name, so attribute locations are free
//! to differ between programs.

use crate::buffer::Semantic;
use crate::context::{ProgramKey, TextureBindingInfo, TextureSampleKind};
use crate::scope::ScopeId;
use crate::uniform::UniformType;
use crate::version::Version;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, ArraySize, Binding, ImageClass, ImageDimension, Module, ScalarKind};
use naga::{Handle, ShaderStage, Type, TypeInner, VectorSize};
use snafu::{OptionExt, Snafu, ensure};
use std::fmt::Write;
use wgpu::TextureViewDimension;

pub const UNIFORM_GROUP: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum ShaderCompileError {
    #[snafu(display("Failed to parse WGSL:\n{message}"))]
    Parse { message: String },

    #[snafu(display("WGSL failed validation:\n{message}"))]
    Validation { message: String },

    #[snafu(display("{stage} entry point {name:?} is missing"))]
    MissingEntryPoint { name: String, stage: &'static str },

    #[snafu(display("Vertex attribute {name:?} has no semantic mapping"))]
    UnmappedAttribute { name: String },

    #[snafu(display("Uniform block {name:?} must be bound at @group(0) @binding(0)"))]
    MisplacedUniformBlock { name: String },

    #[snafu(display("Uniform {name:?} has a type that cannot be committed"))]
    UnsupportedUniform { name: String },

    #[snafu(display("Texture {name:?} must live in @group(1) with a matching sampler at the next binding"))]
    MisplacedTexture { name: String },
}

type Result<T, E = ShaderCompileError> = std::result::Result<T, E>;

/// Generated program source plus the attribute name to semantic map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDefinition {
    pub name: String,
    pub source: String,
    pub attributes: Vec<(String, Semantic)>,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl ShaderDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            attributes: Vec::new(),
            vertex_entry: "vs_main".to_string(),
            fragment_entry: "fs_main".to_string(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, semantic: Semantic) -> Self {
        self.attributes.push((name.into(), semantic));
        self
    }

    fn semantic(&self, name: &str) -> Option<Semantic> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, semantic)| *semantic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInput {
    pub name: String,
    pub semantic: Semantic,
    pub location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub ty: UniformType,
    pub offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    pub attributes: Vec<AttributeInput>,
    pub uniforms: Vec<UniformInfo>,
    pub uniform_block_size: u32,
    pub textures: Vec<TextureBindingInfo>,
}

/// Parses, validates and reflects a program.
pub fn compile(definition: &ShaderDefinition) -> Result<ProgramReflection> {
    let source = &definition.source;
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderCompileError::Parse {
        message: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| ShaderCompileError::Validation {
            message: e.emit_to_string(source),
        })?;

    let mut reflection = ProgramReflection {
        attributes: reflect_attributes(definition, &module)?,
        ..ProgramReflection::default()
    };

    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Fragment && ep.name == definition.fragment_entry)
        .context(MissingEntryPointErr {
            name: definition.fragment_entry.as_str(),
            stage: "Fragment",
        })?;

    reflect_globals(&module, &mut reflection)?;

    Ok(reflection)
}

fn reflect_attributes(definition: &ShaderDefinition, module: &Module) -> Result<Vec<AttributeInput>> {
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Vertex && ep.name == definition.vertex_entry)
        .context(MissingEntryPointErr {
            name: definition.vertex_entry.as_str(),
            stage: "Vertex",
        })?;

    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        match &argument.binding {
            Some(Binding::Location { location, .. }) => {
                let name = argument.name.clone().unwrap_or_default();
                inputs.push((name, *location));
            }
            Some(Binding::BuiltIn(_)) => {}
            None => {
                let TypeInner::Struct { members, .. } = &module.types[argument.ty].inner else {
                    continue;
                };
                for member in members {
                    if let Some(Binding::Location { location, .. }) = member.binding {
                        inputs.push((member.name.clone().unwrap_or_default(), location));
                    }
                }
            }
        }
    }

    inputs
        .into_iter()
        .map(|(name, location)| {
            let semantic = definition
                .semantic(&name)
                .context(UnmappedAttributeErr { name: name.as_str() })?;
            Ok(AttributeInput {
                name,
                semantic,
                location,
            })
        })
        .collect()
}

fn reflect_globals(module: &Module, reflection: &mut ProgramReflection) -> Result<()> {
    let mut samplers = Vec::new();

    for (_, global) in module.global_variables.iter() {
        let name = global.name.clone().unwrap_or_default();
        let binding = global.binding.as_ref();

        match global.space {
            AddressSpace::Uniform => {
                ensure!(
                    binding.is_some_and(|b| b.group == UNIFORM_GROUP && b.binding == 0),
                    MisplacedUniformBlockErr { name }
                );
                let ty = &module.types[global.ty].inner;
                reflection.uniform_block_size = ty.size(module.to_ctx());

                let TypeInner::Struct { members, .. } = ty else {
                    return UnsupportedUniformErr { name }.fail();
                };
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    let ty = uniform_type(module, member.ty).context(UnsupportedUniformErr {
                        name: member_name.as_str(),
                    })?;
                    reflection.uniforms.push(UniformInfo {
                        name: member_name,
                        ty,
                        offset: member.offset,
                    });
                }
            }
            AddressSpace::Handle => {
                let Some(binding) = binding else {
                    return MisplacedTextureErr { name }.fail();
                };
                ensure!(binding.group == TEXTURE_GROUP, MisplacedTextureErr { name });

                match &module.types[global.ty].inner {
                    TypeInner::Sampler { comparison } => {
                        samplers.push((binding.binding, *comparison));
                    }
                    TypeInner::BindingArray { base, size } => {
                        let count = match size {
                            ArraySize::Constant(count) => Some(count.get()),
                            _ => None,
                        };
                        let info = texture_info(module, *base, &name, binding.binding, count)?;
                        reflection.textures.push(info);
                    }
                    _ => {
                        let info = texture_info(module, global.ty, &name, binding.binding, None)?;
                        reflection.textures.push(info);
                    }
                }
            }
            _ => {}
        }
    }

    for texture in &reflection.textures {
        let wants_comparison = texture.sample == TextureSampleKind::Depth;
        ensure!(
            samplers.contains(&(texture.binding + 1, wants_comparison)),
            MisplacedTextureErr {
                name: texture.name.as_str()
            }
        );
    }

    Ok(())
}

fn texture_info(
    module: &Module,
    ty: Handle<Type>,
    name: &str,
    binding: u32,
    count: Option<u32>,
) -> Result<TextureBindingInfo> {
    let TypeInner::Image {
        dim,
        arrayed,
        class,
    } = &module.types[ty].inner
    else {
        return MisplacedTextureErr { name }.fail();
    };

    let dimension = match (dim, arrayed) {
        (ImageDimension::D1, _) => TextureViewDimension::D1,
        (ImageDimension::D2, false) => TextureViewDimension::D2,
        (ImageDimension::D2, true) => TextureViewDimension::D2Array,
        (ImageDimension::D3, _) => TextureViewDimension::D3,
        (ImageDimension::Cube, false) => TextureViewDimension::Cube,
        (ImageDimension::Cube, true) => TextureViewDimension::CubeArray,
    };

    let sample = match class {
        ImageClass::Sampled {
            kind: ScalarKind::Float,
            multi: false,
        } => TextureSampleKind::Float,
        ImageClass::Depth { multi: false } => TextureSampleKind::Depth,
        _ => return MisplacedTextureErr { name }.fail(),
    };

    Ok(TextureBindingInfo {
        name: name.to_string(),
        binding,
        dimension,
        sample,
        count,
    })
}

fn uniform_type(module: &Module, ty: Handle<Type>) -> Option<UniformType> {
    let float = |kind: ScalarKind| kind == ScalarKind::Float;

    match &module.types[ty].inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float => Some(UniformType::Float),
            ScalarKind::Sint => Some(UniformType::Int),
            ScalarKind::Uint => Some(UniformType::Uint),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if float(scalar.kind) => Some(match size {
            VectorSize::Bi => UniformType::Vec2,
            VectorSize::Tri => UniformType::Vec3,
            VectorSize::Quad => UniformType::Vec4,
        }),
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            ..
        } => Some(UniformType::Mat3),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(UniformType::Mat4),
        TypeInner::Array {
            base,
            size: ArraySize::Constant(len),
            ..
        } => match &module.types[*base].inner {
            TypeInner::Vector {
                size: VectorSize::Quad,
                scalar,
            } if float(scalar.kind) => Some(UniformType::Vec4Array(len.get())),
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                ..
            } => Some(UniformType::Mat4Array(len.get())),
            _ => None,
        },
        _ => None,
    }
}

/// Prefixes every line with its 1-based number, used when logging failed programs.
pub fn numbered_source(source: &str) -> String {
    let width = source.lines().count().max(1).to_string().len();
    let mut out = String::with_capacity(source.len() + source.lines().count() * (width + 3));
    for (i, line) in source.lines().enumerate() {
        let _ = writeln!(out, "{:>width$}: {line}", i + 1);
    }
    out
}

#[derive(Debug)]
pub(crate) struct UniformInput {
    pub(crate) info: UniformInfo,
    pub(crate) scope_id: ScopeId,
    pub(crate) committed: Version,
    pub(crate) mismatch_reported: bool,
}

#[derive(Debug)]
pub(crate) struct SamplerInput {
    pub(crate) info: TextureBindingInfo,
    pub(crate) scope_id: ScopeId,
    pub(crate) units: Vec<u32>,
}

/// A compiled program and its reflected inputs.
///
/// A program whose compilation failed is kept around as a non-functional program so
/// the failure is reported once and callers simply draw nothing with it.
#[derive(Debug)]
pub struct Program {
    name: String,
    hardware: Option<ProgramKey>,
    attributes: Vec<AttributeInput>,
    pub(crate) uniforms: Vec<UniformInput>,
    pub(crate) samplers: Vec<SamplerInput>,
}

impl Program {
    pub(crate) fn new(
        name: String,
        hardware: ProgramKey,
        attributes: Vec<AttributeInput>,
        uniforms: Vec<UniformInput>,
        samplers: Vec<SamplerInput>,
    ) -> Self {
        Self {
            name,
            hardware: Some(hardware),
            attributes,
            uniforms,
            samplers,
        }
    }

    pub(crate) fn broken(name: String) -> Self {
        Self {
            name,
            hardware: None,
            attributes: Vec::new(),
            uniforms: Vec::new(),
            samplers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        self.hardware.is_some()
    }

    pub fn hardware(&self) -> Option<ProgramKey> {
        self.hardware
    }

    pub fn attributes(&self) -> &[AttributeInput] {
        &self.attributes
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.iter().map(|u| u.info.name.as_str())
    }

    pub fn sampler_names(&self) -> impl Iterator<Item = &str> {
        self.samplers.iter().map(|s| s.info.name.as_str())
    }

    pub(crate) fn inputs_mut(&mut self) -> (&str, &mut [SamplerInput], &mut [UniformInput]) {
        (&self.name, &mut self.samplers, &mut self.uniforms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"
struct Uniforms {
    matrix_model: mat4x4<f32>,
    matrix_normal: mat3x3<f32>,
    tint: vec3<f32>,
    opacity: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var texture_diffuseMap: texture_2d<f32>;
@group(1) @binding(1) var sampler_diffuseMap: sampler;
@group(1) @binding(2) var texture_shadowMap: texture_depth_2d;
@group(1) @binding(3) var sampler_shadowMap: sampler_comparison;

struct VertexInput {
    @location(0) vertex_position: vec3<f32>,
    @location(1) vertex_texCoord0: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = u.matrix_model * vec4<f32>(in.vertex_position, 1.0);
    out.uv = in.vertex_texCoord0;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(texture_diffuseMap, sampler_diffuseMap, in.uv);
    let lit = textureSampleCompareLevel(texture_shadowMap, sampler_shadowMap, in.uv, 0.5);
    return vec4<f32>(color.rgb * u.tint * lit, u.opacity);
}
"#;

    fn definition() -> ShaderDefinition {
        ShaderDefinition::new("triangle", TRIANGLE)
            .with_attribute("vertex_position", Semantic::Position)
            .with_attribute("vertex_texCoord0", Semantic::TexCoord0)
    }

    #[test]
    fn reflects_attributes_uniforms_and_textures() {
        let reflection = compile(&definition()).unwrap();

        assert_eq!(
            reflection.attributes,
            vec![
                AttributeInput {
                    name: "vertex_position".into(),
                    semantic: Semantic::Position,
                    location: 0
                },
                AttributeInput {
                    name: "vertex_texCoord0".into(),
                    semantic: Semantic::TexCoord0,
                    location: 1
                },
            ]
        );

        let uniforms: Vec<_> = reflection
            .uniforms
            .iter()
            .map(|u| (u.name.as_str(), u.ty, u.offset))
            .collect();
        assert_eq!(
            uniforms,
            vec![
                ("matrix_model", UniformType::Mat4, 0),
                ("matrix_normal", UniformType::Mat3, 64),
                ("tint", UniformType::Vec3, 112),
                ("opacity", UniformType::Float, 124),
            ]
        );
        assert_eq!(reflection.uniform_block_size, 128);

        assert_eq!(reflection.textures.len(), 2);
        assert_eq!(reflection.textures[0].name, "texture_diffuseMap");
        assert_eq!(reflection.textures[0].sample, TextureSampleKind::Float);
        assert_eq!(reflection.textures[1].binding, 2);
        assert_eq!(reflection.textures[1].sample, TextureSampleKind::Depth);
    }

    #[test]
    fn parse_errors_are_reported() {
        let broken = ShaderDefinition::new("broken", "fn vs_main( {");
        let err = compile(&broken).unwrap_err();
        assert!(matches!(err, ShaderCompileError::Parse { .. }), "{err}");
    }

    #[test]
    fn unmapped_attributes_are_rejected() {
        let mut def = definition();
        def.attributes.retain(|(_, semantic)| *semantic != Semantic::TexCoord0);

        let err = compile(&def).unwrap_err();
        assert!(
            matches!(&err, ShaderCompileError::UnmappedAttribute { name } if name == "vertex_texCoord0"),
            "{err}"
        );
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let mut def = definition();
        def.fragment_entry = "main".to_string();
        let err = compile(&def).unwrap_err();
        assert!(matches!(err, ShaderCompileError::MissingEntryPoint { .. }), "{err}");
    }

    #[test]
    fn numbered_listing() {
        assert_eq!(numbered_source("a\nb"), "1: a\n2: b\n");
        let listing = numbered_source(&"x\n".repeat(12));
        assert!(listing.starts_with(" 1: x\n"));
        assert!(listing.ends_with("12: x\n"));
    }
}
