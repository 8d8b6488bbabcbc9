//! Program generation for the Ignis renderer.
//!
//! Each generator turns a typed option set into WGSL by concatenating [`chunks`] with
//! token substitution. The [`ProgramLibrary`] caches compiled programs by option key.

mod builder;
pub mod chunks;
pub mod generators;
mod library;
mod options;

pub use generators::{
    BasicOptions, DepthOptions, Generator, ParticleOptions, PhongOptions, PickOptions,
    ProgramOptions, SkyboxOptions, UnknownGenerator,
};
pub use library::ProgramLibrary;
pub use options::{
    BlendType, Channel, Encoding, FogMode, Gamma, LightKind, LightOptions, MapOptions,
    OutputOptions, ShadowMode, SkinMode, Tonemap, UvSet,
};
