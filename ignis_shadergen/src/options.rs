//! Option types shared between generators.
//!
//! Every type here writes the part of a cache key it is responsible for. A field that
//! does not change generated source must not be written.

use std::fmt::Write;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LightKind {
    #[default]
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub fn key(self) -> char {
        match self {
            LightKind::Directional => 'd',
            LightKind::Point => 'p',
            LightKind::Spot => 's',
        }
    }
}

/// How a light's shadow map is stored and sampled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShadowMode {
    /// A depth texture read with a comparison sampler.
    Depth,
    /// Depth packed into an RGBA8 color texture.
    Packed,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LightOptions {
    pub kind: LightKind,
    /// Point lights always sample a packed cube map, whatever the mode.
    pub shadow: Option<ShadowMode>,
}

impl LightOptions {
    pub fn write_key(&self, out: &mut String) {
        out.push(self.kind.key());
        out.push(match self.shadow {
            None => '-',
            Some(ShadowMode::Depth) => 'D',
            Some(ShadowMode::Packed) => 'P',
        });
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UvSet {
    #[default]
    Uv0,
    Uv1,
}

impl UvSet {
    pub fn index(self) -> &'static str {
        match self {
            UvSet::Uv0 => "0",
            UvSet::Uv1 => "1",
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    R,
    G,
    B,
    #[default]
    A,
}

impl Channel {
    pub fn swizzle(self) -> &'static str {
        match self {
            Channel::R => "r",
            Channel::G => "g",
            Channel::B => "b",
            Channel::A => "a",
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Linear,
    Gamma,
    Rgbm,
}

impl Encoding {
    pub fn decode_fn(self) -> &'static str {
        match self {
            Encoding::Linear => "decode_linear",
            Encoding::Gamma => "decode_gamma",
            Encoding::Rgbm => "decode_rgbm",
        }
    }
}

/// Sampling options of one material map.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MapOptions {
    pub uv: UvSet,
    /// Used by single-channel maps.
    pub channel: Channel,
    /// Used by color maps.
    pub encoding: Encoding,
}

impl MapOptions {
    /// Key of a map decoded as color. The channel is never read.
    pub fn write_color_key(&self, out: &mut String) {
        let _ = write!(out, "{}{:?}", self.uv.index(), self.encoding);
    }

    /// Key of a map read as a single channel. The encoding is never read.
    pub fn write_scalar_key(&self, out: &mut String) {
        let _ = write!(out, "{}{}", self.uv.index(), self.channel.swizzle());
    }
}

pub(crate) fn write_map_key(
    out: &mut String,
    name: &str,
    map: &Option<MapOptions>,
    write: fn(&MapOptions, &mut String),
) {
    if let Some(map) = map {
        out.push('|');
        out.push_str(name);
        out.push(':');
        write(map, out);
    }
}

/// Where skinned vertices read their bone matrices from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SkinMode {
    /// RGBA32F palette texture, needs filterable float textures.
    Texture,
    /// A bounded `matrix_pose` uniform array.
    Uniform { bones: u32 },
}

impl SkinMode {
    pub fn write_key(&self, out: &mut String) {
        match self {
            SkinMode::Texture => out.push_str("|skin:tex"),
            SkinMode::Uniform { bones } => {
                let _ = write!(out, "|skin:{bones}");
            }
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FogMode {
    #[default]
    None,
    Linear,
    Exp,
    Exp2,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Tonemap {
    #[default]
    Linear,
    Filmic,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Gamma {
    /// Output is written linear, for sRGB targets.
    #[default]
    None,
    Srgb,
}

/// Frame-level look shared by every lit program.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OutputOptions {
    pub fog: FogMode,
    pub tonemap: Tonemap,
    pub gamma: Gamma,
}

impl OutputOptions {
    pub fn write_key(&self, out: &mut String) {
        let _ = write!(
            out,
            "|fog:{:?}|tm:{:?}|gamma:{:?}",
            self.fog, self.tonemap, self.gamma
        );
    }
}

/// Blend mode of a material. Only changes fixed-function state, never program source.
///
/// Discriminants are the values packed into draw call sort keys.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum BlendType {
    Subtractive = 0,
    Additive = 1,
    Normal = 2,
    #[default]
    None = 3,
}

impl BlendType {
    pub fn is_blended(self) -> bool {
        self != BlendType::None
    }
}
