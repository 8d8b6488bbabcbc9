use ignis_device::Capabilities;
use ignis_device::program::compile;
use ignis_shadergen::{
    BasicOptions, BlendType, Channel, DepthOptions, Encoding, FogMode, Gamma, LightKind,
    LightOptions, MapOptions, OutputOptions, ParticleOptions, PhongOptions, PickOptions,
    ProgramOptions, ShadowMode, SkinMode, SkyboxOptions, Tonemap, UvSet,
};

fn assert_valid(options: impl Into<ProgramOptions>, caps: &Capabilities) {
    let options = options.into();
    let definition = options.create_shader_definition(caps);
    if let Err(e) = compile(&definition) {
        panic!(
            "{} failed to validate: {e}\n{}",
            options.generate_key(),
            definition.source
        );
    }
}

fn outputs() -> Vec<OutputOptions> {
    vec![
        OutputOptions::default(),
        OutputOptions {
            fog: FogMode::Linear,
            tonemap: Tonemap::Filmic,
            gamma: Gamma::Srgb,
        },
        OutputOptions {
            fog: FogMode::Exp,
            ..OutputOptions::default()
        },
        OutputOptions {
            fog: FogMode::Exp2,
            gamma: Gamma::Srgb,
            ..OutputOptions::default()
        },
    ]
}

#[test]
fn basic_variants_validate() {
    let caps = Capabilities::default();
    for output in outputs() {
        for diffuse_map in [false, true] {
            for alpha_test in [false, true] {
                assert_valid(
                    BasicOptions {
                        diffuse_map,
                        vertex_colors: !diffuse_map,
                        alpha_test,
                        skin: None,
                        output,
                    },
                    &caps,
                );
            }
        }
    }
    assert_valid(
        BasicOptions {
            skin: Some(SkinMode::Texture),
            ..BasicOptions::default()
        },
        &caps,
    );
}

#[test]
fn depth_variants_validate() {
    let caps = Capabilities::default();
    for depth_textures in [false, true] {
        for skin in [SkinMode::Texture, SkinMode::Uniform { bones: 32 }] {
            for options in DepthOptions::shadow_variants(skin, depth_textures) {
                assert_valid(options, &caps);
            }
        }
    }
}

#[test]
fn phong_light_combinations_validate() {
    let caps = Capabilities::default();
    let lights = vec![
        LightOptions::default(),
        LightOptions {
            kind: LightKind::Directional,
            shadow: Some(ShadowMode::Depth),
        },
        LightOptions {
            kind: LightKind::Point,
            shadow: None,
        },
        LightOptions {
            kind: LightKind::Point,
            shadow: Some(ShadowMode::Packed),
        },
        LightOptions {
            kind: LightKind::Spot,
            shadow: Some(ShadowMode::Depth),
        },
        LightOptions {
            kind: LightKind::Spot,
            shadow: Some(ShadowMode::Packed),
        },
    ];

    assert_valid(PhongOptions::default(), &caps);
    for light in &lights {
        assert_valid(
            PhongOptions {
                lights: vec![*light],
                ..PhongOptions::default()
            },
            &caps,
        );
    }
    assert_valid(
        PhongOptions {
            lights,
            ..PhongOptions::default()
        },
        &caps,
    );
}

#[test]
fn phong_material_features_validate() {
    let caps = Capabilities::default();
    let gamma_map = MapOptions {
        encoding: Encoding::Gamma,
        ..MapOptions::default()
    };
    let second_uv = MapOptions {
        uv: UvSet::Uv1,
        channel: Channel::R,
        encoding: Encoding::Rgbm,
    };

    for output in outputs() {
        assert_valid(
            PhongOptions {
                lights: vec![LightOptions::default()],
                diffuse_map: Some(gamma_map),
                specular_map: Some(MapOptions::default()),
                emissive_map: Some(second_uv),
                opacity_map: Some(second_uv),
                vertex_colors: true,
                alpha_test: true,
                skin: Some(SkinMode::Uniform { bones: 48 }),
                output,
                blend_type: BlendType::Normal,
            },
            &caps,
        );
    }
}

#[test]
fn texture_skinning_falls_back_without_float_textures() {
    let caps = Capabilities {
        float_textures: false,
        ..Capabilities::default()
    };
    let options = PhongOptions {
        skin: Some(SkinMode::Texture),
        ..PhongOptions::default()
    };
    let definition = options.create_shader_definition(&caps);

    assert!(definition.source.contains("matrix_pose"));
    assert!(!definition.source.contains("texture_poseMap"));
    assert_valid(options, &caps);
}

#[test]
fn remaining_generators_validate() {
    let caps = Capabilities::default();
    for output in outputs() {
        assert_valid(
            ParticleOptions {
                color_map: true,
                alpha_test: true,
                output,
            },
            &caps,
        );
    }
    assert_valid(ParticleOptions::default(), &caps);
    assert_valid(PickOptions::default(), &caps);
    assert_valid(
        PickOptions {
            skin: Some(SkinMode::Texture),
        },
        &caps,
    );
    for encoding in [Encoding::Linear, Encoding::Gamma, Encoding::Rgbm] {
        assert_valid(
            SkyboxOptions {
                encoding,
                tonemap: Tonemap::Filmic,
                gamma: Gamma::Srgb,
            },
            &caps,
        );
    }
}

#[test]
fn reflected_attributes_follow_inputs() {
    let options = ProgramOptions::from(PhongOptions {
        diffuse_map: Some(MapOptions::default()),
        ..PhongOptions::default()
    });
    let definition = options.create_shader_definition(&Capabilities::default());
    let names: Vec<&str> = definition
        .attributes
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();

    assert_eq!(
        names,
        ["vertex_position", "vertex_normal", "vertex_texCoord0"]
    );
}
