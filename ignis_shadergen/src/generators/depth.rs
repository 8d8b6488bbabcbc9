use crate::builder::ProgramBuilder;
use crate::chunks;
use crate::options::SkinMode;
use ignis_device::{Capabilities, Semantic, ShaderDefinition};

/// Depth-only rendering for shadow maps and depth pre-passes.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DepthOptions {
    pub skin: Option<SkinMode>,
    /// Discards fragments whose opacity map alpha is below `alpha_ref`.
    pub opacity_map: bool,
    /// Writes packed `distance / light_radius` for cube shadow maps.
    pub point: bool,
    /// Writes packed window depth into color instead of relying on a depth texture.
    pub pack_depth: bool,
}

impl DepthOptions {
    pub fn write_key(&self, out: &mut String) {
        if let Some(skin) = &self.skin {
            skin.write_key(out);
        }
        if self.opacity_map {
            out.push_str("|om");
        }
        if self.point {
            out.push_str("|pt");
        }
        if self.pack_depth {
            out.push_str("|pk");
        }
    }

    pub fn create_shader_definition(&self, caps: &Capabilities) -> ShaderDefinition {
        let mut b = ProgramBuilder::new("depth");
        b.uniform("matrix_viewProjection", "mat4x4<f32>")
            .input("vertex_position", "vec3<f32>", Semantic::Position)
            .varying("world_position", "vec3<f32>");

        b.skinned_model(super::supported_skin(self.skin, caps, 64));
        b.vertex_line("let world = model * vec4<f32>(in.vertex_position, 1.0);")
            .vertex_line("out.position = u.matrix_viewProjection * world;")
            .vertex_line("out.world_position = world.xyz;");

        if self.opacity_map {
            let map = Default::default();
            b.input("vertex_texCoord0", "vec2<f32>", Semantic::TexCoord0)
                .varying("uv0", "vec2<f32>")
                .vertex_line("out.uv0 = in.vertex_texCoord0;")
                .uniform("alpha_ref", "f32")
                .sample_map("opacityMap", &map)
                .scalar_map("opacityMap", &map)
                .fragment_line("if (value_opacityMap < u.alpha_ref) {")
                .fragment_line("    discard;")
                .fragment_line("}");
        }

        if self.point {
            b.function(chunks::PACK_DEPTH)
                .uniform("view_position", "vec3<f32>")
                .uniform("light_radius", "f32")
                .fragment_line(
                    "let depth = distance(in.world_position, u.view_position) / u.light_radius;",
                )
                .fragment_line("return pack_float(min(depth, 0.9999));");
        } else if self.pack_depth {
            b.function(chunks::PACK_DEPTH)
                .fragment_line("return pack_float(min(in.position.z, 0.9999));");
        } else {
            b.fragment_line("return vec4<f32>(1.0);");
        }

        b.build()
    }

    /// The variants a renderer draws shadow casters with.
    pub fn shadow_variants(skin: SkinMode, depth_textures: bool) -> Vec<DepthOptions> {
        let mut variants = Vec::with_capacity(8);
        for skinned in [false, true] {
            for opacity_map in [false, true] {
                for point in [false, true] {
                    variants.push(DepthOptions {
                        skin: skinned.then_some(skin),
                        opacity_map,
                        point,
                        pack_depth: !point && !depth_textures,
                    });
                }
            }
        }
        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn shadow_variants_have_distinct_keys() {
        let variants = DepthOptions::shadow_variants(SkinMode::Texture, true);
        let keys: HashSet<String> = variants
            .iter()
            .map(|v| {
                let mut key = String::new();
                v.write_key(&mut key);
                key
            })
            .collect();
        assert_eq!(variants.len(), 8);
        assert_eq!(keys.len(), 8);
    }

    #[test]
    fn packing_follows_depth_texture_support() {
        let without = DepthOptions::shadow_variants(SkinMode::Texture, false);
        assert!(without.iter().all(|v| v.pack_depth != v.point));
        let with = DepthOptions::shadow_variants(SkinMode::Texture, true);
        assert!(with.iter().all(|v| !v.pack_depth));
    }
}
