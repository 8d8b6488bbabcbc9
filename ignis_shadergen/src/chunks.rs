//! Named WGSL fragments and the token substitution used to specialize them.
//!
//! Function chunks are pasted once at module scope. Statement chunks are pasted into
//! entry point bodies after their tokens are replaced.

pub const DECODE: &str = include_str!("chunks/decode.wgsl");
pub const PACK_DEPTH: &str = include_str!("chunks/pack_depth.wgsl");
pub const LIGHTING: &str = include_str!("chunks/lighting.wgsl");
pub const SHADOW_DEPTH: &str = include_str!("chunks/shadow_depth.wgsl");
pub const SHADOW_PACKED: &str = include_str!("chunks/shadow_packed.wgsl");
pub const SHADOW_POINT: &str = include_str!("chunks/shadow_point.wgsl");
pub const TONEMAP: &str = include_str!("chunks/tonemap.wgsl");
pub const FOG: &str = include_str!("chunks/fog.wgsl");
pub const SKIN_TEXTURE: &str = include_str!("chunks/skin_texture.wgsl");
pub const SKIN_UNIFORM: &str = include_str!("chunks/skin_uniform.wgsl");

pub const SAMPLE_MAP: &str = include_str!("chunks/sample_map.wgsl");
pub const COLOR_MAP: &str = include_str!("chunks/color_map.wgsl");
pub const SCALAR_MAP: &str = include_str!("chunks/scalar_map.wgsl");

pub const LIGHT_DIRECTIONAL: &str = include_str!("chunks/light_directional.wgsl");
pub const LIGHT_POINT: &str = include_str!("chunks/light_point.wgsl");
pub const LIGHT_SPOT: &str = include_str!("chunks/light_spot.wgsl");
pub const LIGHT_SHADOW_DEPTH: &str = include_str!("chunks/light_shadow_depth.wgsl");
pub const LIGHT_SHADOW_PACKED: &str = include_str!("chunks/light_shadow_packed.wgsl");
pub const LIGHT_SHADOW_POINT: &str = include_str!("chunks/light_shadow_point.wgsl");
pub const LIGHT_END: &str = include_str!("chunks/light_end.wgsl");

/// Placeholders recognized inside chunks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Texture coordinate set index, `0` or `1`.
    Uv,
    /// Channel swizzle such as `r` or `a`.
    Ch,
    /// Name of a `decode_*` function.
    Decode,
    /// Map name such as `diffuseMap`.
    Name,
    /// Uniform prefix of one light such as `light0`.
    Light,
}

impl Token {
    pub const fn as_str(self) -> &'static str {
        match self {
            Token::Uv => "$UV",
            Token::Ch => "$CH",
            Token::Decode => "$DECODE",
            Token::Name => "$NAME",
            Token::Light => "$LIGHT",
        }
    }
}

/// Replaces every token occurrence in `chunk`.
pub fn substitute(chunk: &str, tokens: &[(Token, &str)]) -> String {
    tokens
        .iter()
        .fold(chunk.to_string(), |out, (token, value)| {
            out.replace(token.as_str(), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_replaced_everywhere() {
        let out = substitute(
            SAMPLE_MAP,
            &[(Token::Name, "diffuseMap"), (Token::Uv, "1")],
        );
        assert_eq!(
            out.trim(),
            "let map_diffuseMap = textureSample(texture_diffuseMap, sampler_diffuseMap, in.uv1);"
        );
    }

    #[test]
    fn light_prefix_builds_uniform_names() {
        let out = substitute(LIGHT_SHADOW_POINT, &[(Token::Light, "light2")]);
        assert!(out.contains("texture_light2_shadowMap"));
        assert!(out.contains("u.light2_position"));
        assert!(!out.contains('$'));
    }
}
