mod basic;
mod depth;
mod particle;
mod phong;
mod pick;
mod skybox;

pub use basic::BasicOptions;
pub use depth::DepthOptions;
pub use particle::ParticleOptions;
pub use phong::PhongOptions;
pub use pick::PickOptions;
pub use skybox::SkyboxOptions;

use ignis_device::{Capabilities, ShaderDefinition};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Generator {
    Basic,
    Depth,
    Particle,
    Phong,
    Pick,
    Skybox,
}

impl Generator {
    pub const ALL: [Generator; 6] = [
        Generator::Basic,
        Generator::Depth,
        Generator::Particle,
        Generator::Phong,
        Generator::Pick,
        Generator::Skybox,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Generator::Basic => "basic",
            Generator::Depth => "depth",
            Generator::Particle => "particle",
            Generator::Phong => "phong",
            Generator::Pick => "pick",
            Generator::Skybox => "skybox",
        }
    }
}

impl Display for Generator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGenerator(pub String);

impl Display for UnknownGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "unknown program generator {:?}", self.0)
    }
}

impl std::error::Error for UnknownGenerator {}

impl FromStr for Generator {
    type Err = UnknownGenerator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Generator::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| UnknownGenerator(s.to_string()))
    }
}

/// The option set of one generator.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramOptions {
    Basic(BasicOptions),
    Depth(DepthOptions),
    Particle(ParticleOptions),
    Phong(PhongOptions),
    Pick(PickOptions),
    Skybox(SkyboxOptions),
}

impl ProgramOptions {
    pub fn generator(&self) -> Generator {
        match self {
            ProgramOptions::Basic(_) => Generator::Basic,
            ProgramOptions::Depth(_) => Generator::Depth,
            ProgramOptions::Particle(_) => Generator::Particle,
            ProgramOptions::Phong(_) => Generator::Phong,
            ProgramOptions::Pick(_) => Generator::Pick,
            ProgramOptions::Skybox(_) => Generator::Skybox,
        }
    }

    /// Deterministic cache key covering exactly the options that change the output.
    pub fn generate_key(&self) -> String {
        let mut key = self.generator().name().to_string();
        match self {
            ProgramOptions::Basic(o) => o.write_key(&mut key),
            ProgramOptions::Depth(o) => o.write_key(&mut key),
            ProgramOptions::Particle(o) => o.write_key(&mut key),
            ProgramOptions::Phong(o) => o.write_key(&mut key),
            ProgramOptions::Pick(o) => o.write_key(&mut key),
            ProgramOptions::Skybox(o) => o.write_key(&mut key),
        }
        key
    }

    pub fn create_shader_definition(&self, caps: &Capabilities) -> ShaderDefinition {
        match self {
            ProgramOptions::Basic(o) => o.create_shader_definition(caps),
            ProgramOptions::Depth(o) => o.create_shader_definition(caps),
            ProgramOptions::Particle(o) => o.create_shader_definition(caps),
            ProgramOptions::Phong(o) => o.create_shader_definition(caps),
            ProgramOptions::Pick(o) => o.create_shader_definition(caps),
            ProgramOptions::Skybox(o) => o.create_shader_definition(caps),
        }
    }
}

macro_rules! impl_from_options {
    ($($options:ident => $variant:ident),* $(,)?) => {
        $(impl From<$options> for ProgramOptions {
            fn from(options: $options) -> Self {
                ProgramOptions::$variant(options)
            }
        })*
    };
}

impl_from_options! {
    BasicOptions => Basic,
    DepthOptions => Depth,
    ParticleOptions => Particle,
    PhongOptions => Phong,
    PickOptions => Pick,
    SkyboxOptions => Skybox,
}

/// Picks the skinning mode the hardware can serve, falling back to a uniform array.
pub(crate) fn supported_skin(
    skin: Option<crate::SkinMode>,
    caps: &Capabilities,
    fallback_bones: u32,
) -> Option<crate::SkinMode> {
    match skin {
        Some(crate::SkinMode::Texture) if !caps.float_textures => {
            tracing::warn!("Float textures unavailable, skinning through a uniform palette");
            Some(crate::SkinMode::Uniform {
                bones: fallback_bones,
            })
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_names_round_trip() {
        for generator in Generator::ALL {
            assert_eq!(generator.name().parse::<Generator>(), Ok(generator));
        }
        assert!("lambert".parse::<Generator>().is_err());
    }

    #[test]
    fn keys_are_prefixed_by_generator() {
        let basic = ProgramOptions::from(BasicOptions::default()).generate_key();
        let pick = ProgramOptions::from(PickOptions::default()).generate_key();
        assert!(basic.starts_with("basic"));
        assert!(pick.starts_with("pick"));
        assert_ne!(basic, pick);
    }
}
