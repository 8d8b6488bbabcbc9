//! GPU state device for the Ignis renderer.
//!
//! The [`Device`] sits on top of a [`GraphicsContext`] and tracks everything it has
//! applied, so redundant state changes and uniform uploads never reach the hardware.

pub mod backend;
mod buffer;
mod context;
mod device;
pub mod program;
mod scope;
mod state;
mod texture;
mod uniform;
mod version;

pub use buffer::{IndexBuffer, Semantic, VertexBuffer, VertexElement, VertexFormat, index_size};
pub use context::{
    BufferDescriptor, BufferKey, BufferKind, Capabilities, ContextError, ContextEvent,
    DepthAttachment, GraphicsContext, ProgramKey, ProgramSource, RenderTargetDescriptor,
    TargetKey, TextureBindingInfo, TextureDescriptor, TextureKey, TextureSampleKind,
    UniformSlot, VertexAttributeBinding,
};
pub use device::{Device, DeviceError, DeviceEvent, DeviceStats, ProgramId};
pub use program::{Program, ShaderCompileError, ShaderDefinition};
pub use scope::{ScopeId, ScopeSpace, ScopeVariable};
pub use state::{
    BlendEquation, BlendFunction, ClearFlags, ClearOptions, CullMode, Primitive, Rect,
    RenderState,
};
pub use texture::{RenderTarget, Texture};
pub use uniform::{UniformType, UniformValue};
pub use version::{Version, VersionCounter, VersionedObject};

pub use wgpu;
