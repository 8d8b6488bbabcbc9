use crate::builder::{ProgramBuilder, TextureType};
use crate::chunks::{self, Token};
use crate::options::{
    BlendType, LightKind, LightOptions, MapOptions, OutputOptions, ShadowMode, SkinMode, UvSet,
    write_map_key,
};
use ignis_device::{Capabilities, Semantic, ShaderDefinition};

/// Forward Lambert and Blinn-Phong shading with every light unrolled.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct PhongOptions {
    pub lights: Vec<LightOptions>,
    pub diffuse_map: Option<MapOptions>,
    pub specular_map: Option<MapOptions>,
    pub emissive_map: Option<MapOptions>,
    pub opacity_map: Option<MapOptions>,
    pub vertex_colors: bool,
    pub alpha_test: bool,
    pub skin: Option<SkinMode>,
    pub output: OutputOptions,
    /// Selects fixed-function blending only. Not part of the key.
    pub blend_type: BlendType,
}

impl PhongOptions {
    pub fn write_key(&self, out: &mut String) {
        out.push_str("|lights:");
        for light in &self.lights {
            light.write_key(out);
        }
        write_map_key(out, "diffuse", &self.diffuse_map, MapOptions::write_color_key);
        write_map_key(out, "specular", &self.specular_map, MapOptions::write_color_key);
        write_map_key(out, "emissive", &self.emissive_map, MapOptions::write_color_key);
        write_map_key(out, "opacity", &self.opacity_map, MapOptions::write_scalar_key);
        if self.vertex_colors {
            out.push_str("|vc");
        }
        if self.alpha_test {
            out.push_str("|at");
        }
        if let Some(skin) = &self.skin {
            skin.write_key(out);
        }
        self.output.write_key(out);
    }

    fn maps(&self) -> impl Iterator<Item = &MapOptions> {
        [
            &self.diffuse_map,
            &self.specular_map,
            &self.emissive_map,
            &self.opacity_map,
        ]
        .into_iter()
        .flatten()
    }

    pub fn create_shader_definition(&self, caps: &Capabilities) -> ShaderDefinition {
        let mut b = ProgramBuilder::new("phong");
        b.uniform("matrix_viewProjection", "mat4x4<f32>")
            .uniform("view_position", "vec3<f32>")
            .uniform("material_ambient", "vec3<f32>")
            .uniform("material_diffuse", "vec3<f32>")
            .uniform("material_specular", "vec3<f32>")
            .uniform("material_shininess", "f32")
            .uniform("material_emissive", "vec3<f32>")
            .uniform("material_opacity", "f32")
            .uniform("light_globalAmbient", "vec3<f32>")
            .function(chunks::LIGHTING)
            .input("vertex_position", "vec3<f32>", Semantic::Position)
            .input("vertex_normal", "vec3<f32>", Semantic::Normal)
            .varying("world_position", "vec3<f32>")
            .varying("world_normal", "vec3<f32>");

        let skin = super::supported_skin(self.skin, caps, 64);
        b.skinned_model(skin);
        if skin.is_some() {
            b.vertex_line("let normal_matrix = mat3x3<f32>(model[0].xyz, model[1].xyz, model[2].xyz);");
        } else {
            b.uniform("matrix_normal", "mat3x3<f32>")
                .vertex_line("let normal_matrix = u.matrix_normal;");
        }
        b.vertex_line("let world = model * vec4<f32>(in.vertex_position, 1.0);")
            .vertex_line("out.position = u.matrix_viewProjection * world;")
            .vertex_line("out.world_position = world.xyz;")
            .vertex_line("out.world_normal = normal_matrix * in.vertex_normal;");

        if self.maps().any(|m| m.uv == UvSet::Uv0) {
            b.input("vertex_texCoord0", "vec2<f32>", Semantic::TexCoord0)
                .varying("uv0", "vec2<f32>")
                .vertex_line("out.uv0 = in.vertex_texCoord0;");
        }
        if self.maps().any(|m| m.uv == UvSet::Uv1) {
            b.input("vertex_texCoord1", "vec2<f32>", Semantic::TexCoord1)
                .varying("uv1", "vec2<f32>")
                .vertex_line("out.uv1 = in.vertex_texCoord1;");
        }
        if self.vertex_colors {
            b.input("vertex_color", "vec4<f32>", Semantic::Color)
                .varying("color", "vec4<f32>")
                .vertex_line("out.color = in.vertex_color;");
        }

        // implicit-lod sampling must happen before anything can discard
        let maps = [
            ("diffuseMap", &self.diffuse_map),
            ("specularMap", &self.specular_map),
            ("emissiveMap", &self.emissive_map),
            ("opacityMap", &self.opacity_map),
        ];
        for (name, map) in maps {
            if let Some(map) = map {
                b.sample_map(name, map);
            }
        }

        b.fragment_line("var diffuse_color = u.material_diffuse;");
        if let Some(map) = &self.diffuse_map {
            b.color_map("diffuseMap", map)
                .fragment_line("diffuse_color *= color_diffuseMap;");
        }
        b.fragment_line("var opacity = u.material_opacity;");
        if let Some(map) = &self.opacity_map {
            b.scalar_map("opacityMap", map)
                .fragment_line("opacity *= value_opacityMap;");
        }
        if self.vertex_colors {
            b.fragment_line("diffuse_color *= in.color.rgb;")
                .fragment_line("opacity *= in.color.a;");
        }
        if self.alpha_test {
            b.uniform("alpha_ref", "f32")
                .fragment_line("if (opacity < u.alpha_ref) {")
                .fragment_line("    discard;")
                .fragment_line("}");
        }

        b.fragment_line("let normal = normalize(in.world_normal);")
            .fragment_line("let to_view = normalize(u.view_position - in.world_position);")
            .fragment_line("var diffuse_light = u.light_globalAmbient * u.material_ambient;")
            .fragment_line("var specular_light = vec3<f32>(0.0);");

        for (i, light) in self.lights.iter().enumerate() {
            add_light(&mut b, i, light);
        }

        b.fragment_line("var specular_color = u.material_specular;");
        if let Some(map) = &self.specular_map {
            b.color_map("specularMap", map)
                .fragment_line("specular_color *= color_specularMap;");
        }
        b.fragment_line("var emissive = u.material_emissive;");
        if let Some(map) = &self.emissive_map {
            b.color_map("emissiveMap", map)
                .fragment_line("emissive *= color_emissiveMap;");
        }

        b.fragment_line(
            "var color = diffuse_color * diffuse_light + specular_color * specular_light + emissive;",
        )
        .output(&self.output)
        .fragment_line("return vec4<f32>(color, opacity);");

        b.build()
    }
}

fn add_light(b: &mut ProgramBuilder, index: usize, light: &LightOptions) {
    let prefix = format!("light{index}");
    let uniform = |b: &mut ProgramBuilder, name: &str, ty: &str| {
        b.uniform(format!("{prefix}_{name}"), ty);
    };

    uniform(b, "color", "vec3<f32>");
    let begin = match light.kind {
        LightKind::Directional => {
            uniform(b, "direction", "vec3<f32>");
            chunks::LIGHT_DIRECTIONAL
        }
        LightKind::Point => {
            uniform(b, "position", "vec3<f32>");
            uniform(b, "radius", "f32");
            chunks::LIGHT_POINT
        }
        LightKind::Spot => {
            uniform(b, "position", "vec3<f32>");
            uniform(b, "direction", "vec3<f32>");
            uniform(b, "radius", "f32");
            uniform(b, "innerConeAngle", "f32");
            uniform(b, "outerConeAngle", "f32");
            chunks::LIGHT_SPOT
        }
    };

    let tokens = [(Token::Light, prefix.as_str())];
    b.fragment_chunk(begin, &tokens);

    if let Some(mode) = light.shadow {
        uniform(b, "shadowParams", "vec4<f32>");
        let shadow_map = format!("{prefix}_shadowMap");
        let call = match (light.kind, mode) {
            (LightKind::Point, _) => {
                b.texture(shadow_map, TextureType::FloatCube)
                    .function(chunks::PACK_DEPTH)
                    .function(chunks::SHADOW_POINT);
                chunks::LIGHT_SHADOW_POINT
            }
            (_, ShadowMode::Depth) => {
                uniform(b, "shadowMatrix", "mat4x4<f32>");
                b.texture(shadow_map, TextureType::Depth2d)
                    .function(chunks::SHADOW_DEPTH);
                chunks::LIGHT_SHADOW_DEPTH
            }
            (_, ShadowMode::Packed) => {
                uniform(b, "shadowMatrix", "mat4x4<f32>");
                b.texture(shadow_map, TextureType::Float2d)
                    .function(chunks::PACK_DEPTH)
                    .function(chunks::SHADOW_PACKED);
                chunks::LIGHT_SHADOW_PACKED
            }
        };
        b.fragment_chunk(call, &tokens);
    }

    b.fragment_chunk(chunks::LIGHT_END, &tokens);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProgramOptions;
    use crate::options::{Channel, Encoding};

    fn key(options: &PhongOptions) -> String {
        ProgramOptions::Phong(options.clone()).generate_key()
    }

    #[test]
    fn blend_type_does_not_split_the_key() {
        let opaque = PhongOptions::default();
        let blended = PhongOptions {
            blend_type: BlendType::Normal,
            ..PhongOptions::default()
        };
        assert_eq!(key(&opaque), key(&blended));
    }

    #[test]
    fn light_layout_and_maps_split_the_key() {
        let one = PhongOptions {
            lights: vec![LightOptions::default()],
            ..PhongOptions::default()
        };
        let shadowed = PhongOptions {
            lights: vec![LightOptions {
                shadow: Some(ShadowMode::Depth),
                ..LightOptions::default()
            }],
            ..PhongOptions::default()
        };
        let mapped = PhongOptions {
            diffuse_map: Some(MapOptions::default()),
            ..one.clone()
        };

        assert_ne!(key(&one), key(&shadowed));
        assert_ne!(key(&one), key(&mapped));
        assert_ne!(key(&one), key(&PhongOptions::default()));
    }

    #[test]
    fn unread_map_fields_do_not_split_the_key() {
        let map = |channel, encoding| {
            Some(MapOptions {
                channel,
                encoding,
                ..MapOptions::default()
            })
        };
        let diffuse = |channel, encoding| PhongOptions {
            diffuse_map: map(channel, encoding),
            ..PhongOptions::default()
        };
        let opacity = |channel, encoding| PhongOptions {
            opacity_map: map(channel, encoding),
            ..PhongOptions::default()
        };

        assert_eq!(
            key(&diffuse(Channel::R, Encoding::Gamma)),
            key(&diffuse(Channel::A, Encoding::Gamma))
        );
        assert_ne!(
            key(&diffuse(Channel::R, Encoding::Gamma)),
            key(&diffuse(Channel::R, Encoding::Rgbm))
        );
        assert_eq!(
            key(&opacity(Channel::A, Encoding::Linear)),
            key(&opacity(Channel::A, Encoding::Gamma))
        );
        assert_ne!(
            key(&opacity(Channel::R, Encoding::Linear)),
            key(&opacity(Channel::A, Encoding::Linear))
        );
    }

    #[test]
    fn lights_declare_prefixed_uniforms() {
        let options = PhongOptions {
            lights: vec![
                LightOptions::default(),
                LightOptions {
                    kind: LightKind::Spot,
                    shadow: Some(ShadowMode::Packed),
                },
            ],
            ..PhongOptions::default()
        };
        let source = options
            .create_shader_definition(&Capabilities::default())
            .source;

        assert!(source.contains("light0_direction: vec3<f32>"));
        assert!(source.contains("light1_outerConeAngle: f32"));
        assert!(source.contains("var texture_light1_shadowMap: texture_2d<f32>"));
        assert!(!source.contains('$'));
    }
}
