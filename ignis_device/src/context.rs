//! The seam between the device's state tracking and actual hardware.
//!
//! A [`GraphicsContext`] is dumb on purpose: it applies whatever it is told.
//! Redundancy elision happens in [`crate::Device`] before anything reaches a context.

use crate::state::{BlendEquation, BlendFunction, ClearFlags, CullMode, Primitive, Rect};
use crate::uniform::{UniformType, UniformValue};
use slotmap::new_key_type;
use snafu::Snafu;
use wgpu::{
    AddressMode, Color, ColorWrites, CompareFunction, FilterMode, IndexFormat, TextureFormat,
    TextureViewDimension, VertexFormat,
};

new_key_type! {
    pub struct BufferKey;
    pub struct TextureKey;
    pub struct TargetKey;
    pub struct ProgramKey;
}

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum ContextError {
    #[snafu(display("Could not find a suitable graphics adapter: {source}"))]
    RequestAdapter { source: wgpu::RequestAdapterError },

    #[snafu(display("Unable to get a graphics device: {source}"))]
    RequestDevice { source: wgpu::RequestDeviceError },

    #[snafu(display("Render target {label:?} is incomplete: {reason}"))]
    IncompleteTarget { label: String, reason: String },

    #[snafu(display("Texture {label:?} of {width}x{height} exceeds the maximum size of {max}"))]
    TextureTooLarge {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },

    #[snafu(display("Unknown {kind} handle"))]
    UnknownHandle { kind: &'static str },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContextEvent {
    Lost,
    Restored,
}

/// What the hardware behind a context can do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Depth textures can be sampled with comparison, so shadow passes may skip color.
    pub depth_textures: bool,
    /// 32-bit float textures are filterable, enabling texture bone palettes.
    pub float_textures: bool,
    pub texture_arrays: bool,
    pub max_texture_units: u32,
    pub max_texture_size: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            depth_textures: true,
            float_textures: true,
            texture_arrays: false,
            max_texture_units: 16,
            max_texture_size: 8192,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mip_level_count: u32,
    pub cubemap: bool,
    /// May be used as a render-target attachment.
    pub renderable: bool,
    pub filter: FilterMode,
    pub address_mode: AddressMode,
    /// Sampled through a comparison sampler, used by shadow depth maps.
    pub compare: Option<CompareFunction>,
}

impl TextureDescriptor {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            mip_level_count: 1,
            cubemap: false,
            renderable: false,
            filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
            compare: None,
        }
    }

    pub fn faces(&self) -> u32 {
        if self.cubemap { 6 } else { 1 }
    }

    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DepthAttachment {
    None,
    /// A depth buffer owned by the target, never sampled.
    Buffer,
    Texture(TextureKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    pub label: String,
    pub color: Option<TextureKey>,
    /// Cube face of the color texture to render into.
    pub face: u32,
    pub depth: DepthAttachment,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureSampleKind {
    Float,
    /// Bound with a comparison sampler.
    Depth,
}

/// A texture declared by a program together with its paired sampler at `binding + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureBindingInfo {
    pub name: String,
    pub binding: u32,
    pub dimension: TextureViewDimension,
    pub sample: TextureSampleKind,
    /// Element count for texture arrays.
    pub count: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ProgramSource<'a> {
    pub name: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub uniform_block_size: u32,
    pub textures: &'a [TextureBindingInfo],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttributeBinding {
    pub buffer: BufferKey,
    pub format: VertexFormat,
    pub offset: u64,
    pub stride: u64,
}

/// A reflected uniform handed to [`GraphicsContext::commit_uniform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot<'a> {
    pub name: &'a str,
    pub ty: UniformType,
    pub offset: u32,
}

pub trait GraphicsContext {
    fn name(&self) -> &str;
    fn capabilities(&self) -> Capabilities;
    /// Size of the default render target bound by `bind_render_target(None)`.
    fn backbuffer_size(&self) -> (u32, u32);
    fn poll_event(&mut self) -> Option<ContextEvent>;

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferKey, ContextError>;
    fn write_buffer(&mut self, buffer: BufferKey, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferKey);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureKey, ContextError>;
    fn write_texture(&mut self, texture: TextureKey, level: u32, face: u32, data: &[u8]);
    fn destroy_texture(&mut self, texture: TextureKey);

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> Result<TargetKey, ContextError>;
    fn destroy_render_target(&mut self, target: TargetKey);

    fn create_program(&mut self, program: &ProgramSource) -> Result<ProgramKey, ContextError>;
    fn destroy_program(&mut self, program: ProgramKey);

    fn apply_depth_test(&mut self, enabled: bool);
    fn apply_depth_write(&mut self, enabled: bool);
    fn apply_depth_func(&mut self, func: CompareFunction);
    fn apply_blending(&mut self, enabled: bool);
    fn apply_blend_function(&mut self, function: BlendFunction);
    fn apply_blend_equation(&mut self, equation: BlendEquation);
    fn apply_cull_mode(&mut self, mode: CullMode);
    fn apply_color_write(&mut self, mask: ColorWrites);
    fn apply_clear_color(&mut self, color: Color);
    fn apply_clear_depth(&mut self, depth: f32);
    fn apply_viewport(&mut self, rect: Rect);
    fn apply_scissor(&mut self, rect: Rect);

    /// `None` binds the context's default backbuffer.
    fn bind_render_target(&mut self, target: Option<TargetKey>);
    fn bind_program(&mut self, program: ProgramKey);
    fn bind_vertex_attribute(&mut self, location: u32, attribute: &VertexAttributeBinding);
    fn bind_index_buffer(&mut self, buffer: Option<(BufferKey, IndexFormat)>);
    fn bind_texture(&mut self, unit: u32, texture: TextureKey);

    fn commit_uniform(&mut self, program: ProgramKey, slot: &UniformSlot, value: &UniformValue);
    /// Points a program's texture binding at texture units.
    fn commit_sampler(&mut self, program: ProgramKey, binding: u32, units: &[u32]);

    fn clear(&mut self, flags: ClearFlags);
    fn draw(&mut self, primitive: &Primitive);
    /// Submits everything recorded so far.
    fn flush(&mut self);
}
