//! Forward renderer for the Ignis device.
//!
//! A [`Scene`] holds meshes, materials, lights and draw calls. The [`ForwardRenderer`]
//! draws it from a [`Camera`] in one lit pass, after rendering a shadow map for every
//! shadow casting light and an optional depth-only pre-pass.

pub mod camera;
pub mod draw_call;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod rendering;
pub mod scene;

pub use camera::{Camera, Projection};
pub use draw_call::{DrawCall, DrawCommand, DrawKind, Layer, MeshInstance, Skin};
pub use lighting::{Light, ShadowMap};
pub use material::{
    BasicMaterial, Material, MaterialMap, PhongMaterial, ShaderContext, Shading,
};
pub use mesh::{Mesh, Vertex3D};
pub use rendering::{ForwardRenderer, RenderStats, RendererSettings};
pub use scene::{LightKey, MaterialKey, MeshKey, Model, ModelKey, Scene, SceneLook};

pub use ignis_device;
pub use ignis_shadergen;
